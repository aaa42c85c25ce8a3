use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    ClientConfig, ClientConfigWithoutSecrets, ClientFieldSettings, ClientKey,
    DestinationApiConfig, DestinationApiConfigWithoutSecrets, FieldSettings, LogFormat,
    SourceApiConfig, SyncSettings, TransformRules, ValidationError,
};

/// Complete configuration for the deal sync service.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub clients: Vec<ClientConfig>,
    /// Per-client mapping from logical field to candidate properties.
    #[serde(default)]
    pub field_settings: FieldSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub rules: TransformRules,
    #[serde(default)]
    pub source: SourceApiConfig,
    pub destination: DestinationApiConfig,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl ServiceConfig {
    /// Validates the complete service configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.sync.validate()?;

        if self.rules.key_column.trim().is_empty() {
            return Err(ValidationError::EmptyKeyColumn);
        }

        if self.clients.is_empty() {
            return Err(ValidationError::NoClients);
        }

        let mut seen: HashMap<ClientKey, &str> = HashMap::with_capacity(self.clients.len());
        for client in &self.clients {
            client.validate()?;

            if let Some(first) = seen.insert(client.client_key(), &client.client_name) {
                return Err(ValidationError::DuplicateClientKey {
                    key: client.client_key().to_string(),
                    first: first.to_owned(),
                    second: client.client_name.clone(),
                });
            }
        }

        // Sorted so the reported key does not depend on hash order.
        let mut unknown: Vec<&ClientKey> = self
            .field_settings
            .keys()
            .filter(|key| !seen.contains_key(*key))
            .collect();
        unknown.sort();
        if let Some(key) = unknown.first() {
            return Err(ValidationError::UnknownClientKey(key.to_string()));
        }

        Ok(())
    }

    /// Returns the field settings of `client`, or an empty mapping when none are configured.
    pub fn field_settings_for(&self, client: &ClientConfig) -> ClientFieldSettings {
        self.field_settings
            .get(&client.client_key())
            .cloned()
            .unwrap_or_default()
    }
}

impl Config for ServiceConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[
        "rules.denied_property_groups",
        "rules.contact_fallback_properties",
        "rules.required_headers",
    ];
}

/// Same as [`ServiceConfig`] but without secrets.
///
/// This type implements [`Serialize`] because it does not contain secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfigWithoutSecrets {
    pub clients: Vec<ClientConfigWithoutSecrets>,
    pub field_settings: FieldSettings,
    pub sync: SyncSettings,
    pub rules: TransformRules,
    pub source: SourceApiConfig,
    pub destination: DestinationApiConfigWithoutSecrets,
    pub log_format: LogFormat,
}

impl From<ServiceConfig> for ServiceConfigWithoutSecrets {
    fn from(value: ServiceConfig) -> Self {
        Self {
            clients: value.clients.into_iter().map(Into::into).collect(),
            field_settings: value.field_settings,
            sync: value.sync,
            rules: value.rules,
            source: value.source,
            destination: value.destination.into(),
            log_format: value.log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(value: serde_json::Value) -> ServiceConfig {
        serde_json::from_value(value).unwrap()
    }

    fn base() -> serde_json::Value {
        serde_json::json!({
            "clients": [
                {
                    "client_name": "Acme Corp",
                    "spreadsheet_id": "sheet-1",
                    "worksheet_name": "Clean",
                    "source_access_token": "pat-1"
                },
                {
                    "client_name": "Globex",
                    "spreadsheet_id": "sheet-2",
                    "worksheet_name": "Deals",
                    "source_access_token": "pat-2"
                }
            ],
            "field_settings": {
                "acme_corp": { "amount": ["amount"] }
            },
            "destination": { "access_token": "ya29" }
        })
    }

    #[test]
    fn minimal_config_is_valid_with_defaults() {
        let config = config(base());

        assert!(config.validate().is_ok());
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.source.api_base_url, "https://api.hubapi.com");
    }

    #[test]
    fn field_settings_are_looked_up_by_client_key() {
        let config = config(base());

        let acme = config.field_settings_for(&config.clients[0]);
        assert_eq!(acme.len(), 1);
        assert!(config.field_settings_for(&config.clients[1]).is_empty());
    }

    #[test]
    fn rejects_duplicate_client_keys() {
        let mut value = base();
        value["clients"][1]["client_name"] = serde_json::json!("acme   corp");

        assert_eq!(
            config(value).validate(),
            Err(ValidationError::DuplicateClientKey {
                key: "acme_corp".to_owned(),
                first: "Acme Corp".to_owned(),
                second: "acme   corp".to_owned(),
            })
        );
    }

    #[test]
    fn rejects_field_settings_for_unknown_client() {
        let mut value = base();
        value["field_settings"]["initech"] = serde_json::json!({ "amount": ["amount"] });

        assert_eq!(
            config(value).validate(),
            Err(ValidationError::UnknownClientKey("initech".to_owned()))
        );
    }

    #[test]
    fn rejects_missing_coordinates_and_empty_clients() {
        let mut value = base();
        value["clients"][1]["worksheet_name"] = serde_json::json!("");
        assert!(matches!(
            config(value).validate(),
            Err(ValidationError::MissingClientCoordinate { client_name, .. }) if client_name == "Globex"
        ));

        let mut value = base();
        value["clients"] = serde_json::json!([]);
        value["field_settings"] = serde_json::json!({});
        assert_eq!(config(value).validate(), Err(ValidationError::NoClients));
    }

    #[test]
    fn without_secrets_drops_tokens() {
        let without: ServiceConfigWithoutSecrets = config(base()).into();
        let rendered = serde_json::to_string(&without).unwrap();

        assert!(!rendered.contains("pat-1"));
        assert!(!rendered.contains("ya29"));
        assert!(rendered.contains("sheet-1"));
    }
}
