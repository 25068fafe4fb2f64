use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct HubServer {
    pub url: Url,
    pub token: Option<String>,
    pub token_env: Option<String>,
    pub disable_tls_verify: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ListenerConfig {
    pub reconnect_delay_secs: NonZeroU32,
    pub discovery: bool,
    pub area_sync_on_start: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub hub: HubServer,
    pub listener: ListenerConfig,
}

impl HubServer {
    pub const DEFAULT_TOKEN_ENV: &'static str = "HUB_TOKEN";

    #[must_use]
    pub fn token_env_name(&self) -> &str {
        self.token_env.as_deref().unwrap_or(Self::DEFAULT_TOKEN_ENV)
    }

    #[must_use]
    pub fn verify_tls(&self) -> bool {
        !self.disable_tls_verify.unwrap_or(false)
    }

    #[must_use]
    pub fn get_url(&self) -> Url {
        let mut url = self.url.clone();
        // The hub serves its event stream below the versioned api root. A
        // bare host url is completed to that root, anything else is kept.
        if url.path().is_empty() || url.path() == "/" {
            url.set_path("/v1");
        }
        url
    }
}
