use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Normalized identifier of a client, used to look up its field settings.
///
/// Built from the client name by collapsing every whitespace run into `_` and lowercasing,
/// so `"Acme  Corp"` and `"acme corp"` share the key `acme_corp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn from_client_name(client_name: &str) -> Self {
        let mut key = String::with_capacity(client_name.len());
        let mut in_whitespace = false;

        for c in client_name.chars() {
            if c.is_whitespace() {
                if !in_whitespace {
                    key.push('_');
                }
                in_whitespace = true;
            } else {
                key.extend(c.to_lowercase());
                in_whitespace = false;
            }
        }

        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One independently synchronized client: a CRM account and the worksheet it feeds.
///
/// This intentionally does not implement [`Serialize`] to avoid leaking the CRM token.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_name: String,
    /// Identifier of the destination spreadsheet.
    #[serde(alias = "destination_id")]
    pub spreadsheet_id: String,
    /// Title of the worksheet (tab) whose first row holds the headers.
    #[serde(alias = "worksheet_tab_name", alias = "destination_sheet_name")]
    pub worksheet_name: String,
    /// Private app token for the client's CRM account.
    #[serde(alias = "hubspot_private_app_token")]
    pub source_access_token: SecretString,
    /// Numeric id of the worksheet, resolved from its title when absent.
    #[serde(default)]
    pub sheet_id: Option<i64>,
}

impl ClientConfig {
    pub fn client_key(&self) -> ClientKey {
        ClientKey::from_client_name(&self.client_name)
    }

    /// Checks that the destination coordinates needed by every write are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(ValidationError::MissingClientCoordinate {
                client_name: self.client_name.clone(),
                field: "spreadsheet_id",
            });
        }

        if self.worksheet_name.trim().is_empty() {
            return Err(ValidationError::MissingClientCoordinate {
                client_name: self.client_name.clone(),
                field: "worksheet_name",
            });
        }

        Ok(())
    }
}

/// Same as [`ClientConfig`] but without the CRM token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfigWithoutSecrets {
    pub client_name: String,
    pub spreadsheet_id: String,
    pub worksheet_name: String,
    pub sheet_id: Option<i64>,
}

impl From<ClientConfig> for ClientConfigWithoutSecrets {
    fn from(value: ClientConfig) -> Self {
        Self {
            client_name: value.client_name,
            spreadsheet_id: value.spreadsheet_id,
            worksheet_name: value.worksheet_name,
            sheet_id: value.sheet_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(spreadsheet_id: &str, worksheet_name: &str) -> ClientConfig {
        ClientConfig {
            client_name: "Acme Corp".to_owned(),
            spreadsheet_id: spreadsheet_id.to_owned(),
            worksheet_name: worksheet_name.to_owned(),
            source_access_token: SecretString::new("token".to_owned()),
            sheet_id: None,
        }
    }

    #[test]
    fn client_key_collapses_whitespace_and_lowercases() {
        assert_eq!(ClientKey::from_client_name("Acme Corp").as_str(), "acme_corp");
        assert_eq!(ClientKey::from_client_name("Acme \t Corp").as_str(), "acme_corp");
        assert_eq!(ClientKey::from_client_name("ACME").as_str(), "acme");
    }

    #[test]
    fn client_key_keeps_edge_whitespace_as_separator() {
        assert_eq!(ClientKey::from_client_name(" Acme ").as_str(), "_acme_");
    }

    #[test]
    fn validate_requires_spreadsheet_and_worksheet() {
        assert!(client("sheet", "Clean").validate().is_ok());
        assert_eq!(
            client(" ", "Clean").validate(),
            Err(ValidationError::MissingClientCoordinate {
                client_name: "Acme Corp".to_owned(),
                field: "spreadsheet_id",
            })
        );
        assert!(matches!(
            client("sheet", "").validate(),
            Err(ValidationError::MissingClientCoordinate {
                field: "worksheet_name",
                ..
            })
        ));
    }

    #[test]
    fn deserializes_legacy_field_names() {
        let client: ClientConfig = serde_json::from_value(serde_json::json!({
            "client_name": "Acme",
            "destination_id": "abc",
            "worksheet_tab_name": "Clean",
            "hubspot_private_app_token": "pat"
        }))
        .unwrap();

        assert_eq!(client.spreadsheet_id, "abc");
        assert_eq!(client.worksheet_name, "Clean");
        assert_eq!(client.sheet_id, None);
    }
}
