//! Records and catalogs exchanged with the source CRM.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Property values keyed by property name, as returned by the CRM.
pub type Properties = HashMap<String, Value>;

/// Renders a property value as text, treating `null` and empty strings as absent.
pub fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

fn non_empty_property(properties: &Properties, name: &str) -> Option<String> {
    properties.get(name).and_then(render_value)
}

/// A deal fetched in the current cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceRecord {
    pub id: String,
    pub properties: Properties,
    /// Ids of associated contacts, filled in by the fetcher.
    pub associations: Vec<String>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, properties: Properties) -> Self {
        Self {
            id: id.into(),
            properties,
            associations: Vec::new(),
        }
    }

    /// Returns the property rendered as text, or [`None`] when it is absent, null or empty.
    pub fn property(&self, name: &str) -> Option<String> {
        non_empty_property(&self.properties, name)
    }
}

/// A contact associated with a deal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssociatedRecord {
    pub id: String,
    pub properties: Properties,
}

impl AssociatedRecord {
    pub fn new(id: impl Into<String>, properties: Properties) -> Self {
        Self {
            id: id.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<String> {
        non_empty_property(&self.properties, name)
    }
}

/// A property exposed by the CRM for one object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub label: String,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, group_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            group_name: group_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub id: String,
    pub label: String,
}

/// A deal pipeline with its stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub stages: Vec<PipelineStage>,
}

/// A CRM user that can own deals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Owner {
    /// `"{first} {last}"` with surrounding whitespace removed.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_owned()
    }
}
