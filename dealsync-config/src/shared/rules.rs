use serde::{Deserialize, Serialize};

fn default_denied_property_groups() -> Vec<String> {
    vec!["analytics_history".to_owned()]
}

fn default_contact_fallback_properties() -> Vec<String> {
    ["firstname", "lastname", "email", "phone"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_key_column() -> String {
    "Deal Id".to_owned()
}

fn default_required_headers() -> Vec<String> {
    [
        "Amount",
        "Contract Type",
        "Deal Owner",
        "Won Date",
        "Estimate Date",
        "Create Date",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

/// Gating for the won date column.
///
/// The won date is filled from `source_property` only when the deal's stage label equals
/// `won_stage_label` and its pipeline label equals `pipeline_label`; otherwise it is
/// written as an explicit empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WonDateRule {
    pub source_property: String,
    pub won_stage_label: String,
    pub pipeline_label: String,
}

impl Default for WonDateRule {
    fn default() -> Self {
        Self {
            source_property: "closedate".to_owned(),
            won_stage_label: "Won".to_owned(),
            pipeline_label: "Sales Pipeline".to_owned(),
        }
    }
}

/// Blanks logical fields when another logical field contains a keyword.
///
/// `suppressed_fields` are name fragments: every logical field whose lowercased name
/// contains one of them is blanked. The trigger value is read from the deal's own properties through the trigger field's
/// mapping candidates and compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionRule {
    pub trigger_field: String,
    pub contains: String,
    pub suppressed_fields: Vec<String>,
}

impl SuppressionRule {
    /// Change orders carry no create or estimate date of their own.
    pub fn change_order() -> Self {
        Self {
            trigger_field: "contract_type".to_owned(),
            contains: "change order".to_owned(),
            suppressed_fields: vec![
                "create_date".to_owned(),
                "createdate".to_owned(),
                "estimate_date".to_owned(),
            ],
        }
    }
}

fn default_suppression_rules() -> Vec<SuppressionRule> {
    vec![SuppressionRule::change_order()]
}

/// Business rules applied while projecting records into rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRules {
    /// Property groups never requested from the CRM nor offered for mapping.
    #[serde(default = "default_denied_property_groups")]
    pub denied_property_groups: Vec<String>,
    /// Contact properties requested when the contact property listing is unavailable.
    #[serde(default = "default_contact_fallback_properties")]
    pub contact_fallback_properties: Vec<String>,
    #[serde(default)]
    pub won_date: WonDateRule,
    #[serde(default = "default_suppression_rules")]
    pub suppression: Vec<SuppressionRule>,
    /// Header label of the column holding the deal id.
    #[serde(default = "default_key_column")]
    pub key_column: String,
    /// Headers that must resolve before a cycle writes anything.
    #[serde(default = "default_required_headers")]
    pub required_headers: Vec<String>,
}

impl Default for TransformRules {
    fn default() -> Self {
        Self {
            denied_property_groups: default_denied_property_groups(),
            contact_fallback_properties: default_contact_fallback_properties(),
            won_date: WonDateRule::default(),
            suppression: default_suppression_rules(),
            key_column: default_key_column(),
            required_headers: default_required_headers(),
        }
    }
}
