// OpenDota API client.
// Thin consumer of the shared getter used by rank verification.

use std::sync::Arc;

use crate::error::Result;
use crate::http::{ErrorOverrides, GetRequest, HttpGetter};

use super::types::PlayerInfo;

/// OpenDota API client sharing the process-wide getter.
#[derive(Clone)]
pub struct OpenDotaClient {
    getter: Arc<HttpGetter>,
    base_url: String,
}

impl OpenDotaClient {
    pub fn new(getter: Arc<HttpGetter>, base_url: impl Into<String>) -> Self {
        Self {
            getter,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL for an API path like `/players/123`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Get a player's summary by 32-bit Steam account id.
    pub async fn player(&self, steam32: u64) -> Result<PlayerInfo> {
        let request = GetRequest::new(self.url(&format!("/players/{}", steam32))).errors(
            ErrorOverrides::new()
                .status(404, "Couldn't find a Dota 2 player with that Steam id")
                .default_message("OpenDota had a problem ({status} error). Try again later."),
        );

        self.getter.get(&request).await?.deserialize()
    }
}
