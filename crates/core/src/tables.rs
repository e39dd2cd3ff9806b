//! Canonical remote table names.

use serde::{Deserialize, Serialize};

/// Remote tables that participate in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    Properties,
    Listings,
    Tasks,
    Activities,
    TaskAssignees,
    ActivityAssignees,
    Notes,
    ListingTypes,
    ActivityTemplates,
}

/// All tables, in remote FK dependency order.
pub const CORE_TABLES: [Table; 10] = [
    Table::ListingTypes,
    Table::ActivityTemplates,
    Table::Users,
    Table::Properties,
    Table::Listings,
    Table::Tasks,
    Table::Activities,
    Table::TaskAssignees,
    Table::ActivityAssignees,
    Table::Notes,
];

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Properties => "properties",
            Table::Listings => "listings",
            Table::Tasks => "tasks",
            Table::Activities => "activities",
            Table::TaskAssignees => "task_assignees",
            Table::ActivityAssignees => "activity_assignees",
            Table::Notes => "notes",
            Table::ListingTypes => "listing_types",
            Table::ActivityTemplates => "activity_templates",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_serialization_matches_backend_contract() {
        for table in CORE_TABLES {
            let json = serde_json::to_string(&table).expect("serialize table");
            assert_eq!(json, format!("\"{}\"", table.as_str()));
        }
    }

    #[test]
    fn table_parses_from_wire_name() {
        let table: Table = serde_json::from_str("\"task_assignees\"").expect("parse");
        assert_eq!(table, Table::TaskAssignees);
    }
}
