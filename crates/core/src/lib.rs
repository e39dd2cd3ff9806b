//! Domain model, graph store, and collaborator contracts for the hearth
//! sync engine.
//!
//! This crate is runtime-agnostic: it owns the entity graph, the per-row sync
//! metadata, the pure retry/backoff policy, and the traits the engine uses to
//! talk to the outside world (remote tables, realtime streams, object storage,
//! settings, clock). The engine itself lives in `hearth-sync`; the HTTP
//! adapters live in `hearth-remote`.

pub mod clock;
pub mod dto;
pub mod errors;
pub mod meta;
pub mod model;
pub mod remote;
pub mod retry;
pub mod store;
pub mod tables;

pub use errors::{Error, Result};
