use secrecy::SecretString;
use serde::{Deserialize, Serialize};

const DEFAULT_SOURCE_API_BASE_URL: &str = "https://api.hubapi.com";

const DEFAULT_DESTINATION_API_BASE_URL: &str = "https://sheets.googleapis.com";

const fn default_timeout_secs() -> u64 {
    30
}

fn default_source_api_base_url() -> String {
    DEFAULT_SOURCE_API_BASE_URL.to_owned()
}

fn default_destination_api_base_url() -> String {
    DEFAULT_DESTINATION_API_BASE_URL.to_owned()
}

/// Connection settings for the CRM API.
///
/// Access tokens are per client and live on [`crate::shared::ClientConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceApiConfig {
    #[serde(default = "default_source_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_source_api_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Connection settings for the spreadsheet API.
///
/// The access token is refreshed outside of this service and injected through configuration.
///
/// This intentionally does not implement [`Serialize`] to avoid leaking the token.
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationApiConfig {
    #[serde(default = "default_destination_api_base_url")]
    pub api_base_url: String,
    pub access_token: SecretString,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Same as [`DestinationApiConfig`] but without the access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationApiConfigWithoutSecrets {
    pub api_base_url: String,
    pub timeout_secs: u64,
}

impl From<DestinationApiConfig> for DestinationApiConfigWithoutSecrets {
    fn from(value: DestinationApiConfig) -> Self {
        Self {
            api_base_url: value.api_base_url,
            timeout_secs: value.timeout_secs,
        }
    }
}
