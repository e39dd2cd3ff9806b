//! Version compatibility RPC.

use async_trait::async_trait;
use serde_json::json;

use hearth_core::errors::Result;
use hearth_core::remote::{CompatRpc, VersionCompatResponse};

use crate::client::RestClient;

#[async_trait]
impl CompatRpc for RestClient {
    async fn check_version_compat(
        &self,
        platform: &str,
        client_version: &str,
    ) -> Result<VersionCompatResponse> {
        let url = format!("{}/rest/v1/rpc/check_version_compat", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&json!({
                "platform": platform,
                "client_version": client_version,
            }))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::parse_json(response).await
    }
}
