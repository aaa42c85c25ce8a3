use std::collections::{BTreeMap, HashMap};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::shared::ClientKey;

/// CRM object types that can supply a mapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// The synchronized record itself.
    Deal,
    /// A contact associated with the deal.
    Contact,
}

impl ObjectKind {
    /// Plural name used in CRM API paths.
    pub fn api_name(&self) -> &'static str {
        match self {
            ObjectKind::Deal => "deals",
            ObjectKind::Contact => "contacts",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Deal => f.write_str("deal"),
            ObjectKind::Contact => f.write_str("contact"),
        }
    }
}

/// One candidate source for a logical field.
///
/// Without an `object`, the property is looked up on the deal first and then on each
/// associated contact. Accepted forms:
///
/// - `"amount"`
/// - `{ "property": "email", "object": "contact" }`
/// - `{ "amount": "amount" }`, the single-entry shape produced by the mapping form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldCandidate")]
pub struct FieldCandidate {
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectKind>,
}

impl FieldCandidate {
    pub fn any(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            object: None,
        }
    }

    pub fn on(object: ObjectKind, property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            object: Some(object),
        }
    }

    /// Whether this candidate may read from objects of `kind`.
    pub fn targets(&self, kind: ObjectKind) -> bool {
        self.object.is_none_or(|object| object == kind)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldCandidate {
    Property(String),
    Scoped {
        property: String,
        #[serde(default)]
        object: Option<ObjectKind>,
    },
    SingleEntry(BTreeMap<String, String>),
}

impl TryFrom<RawFieldCandidate> for FieldCandidate {
    type Error = String;

    fn try_from(value: RawFieldCandidate) -> Result<Self, Self::Error> {
        match value {
            RawFieldCandidate::Property(property) => Ok(FieldCandidate::any(property)),
            RawFieldCandidate::Scoped { property, object } => Ok(FieldCandidate { property, object }),
            RawFieldCandidate::SingleEntry(entries) => {
                if entries.len() != 1 {
                    return Err(format!(
                        "a field candidate object must have exactly one entry, found {}",
                        entries.len()
                    ));
                }

                let property = entries.into_values().next().unwrap_or_default();
                Ok(FieldCandidate::any(property))
            }
        }
    }
}

/// Ordered mapping from logical field to its candidate sources for one client.
pub type ClientFieldSettings = IndexMap<String, Vec<FieldCandidate>>;

/// Field settings for every client, keyed by normalized client key.
pub type FieldSettings = HashMap<ClientKey, ClientFieldSettings>;
