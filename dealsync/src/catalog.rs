//! Field catalogs and mapping pruning.
//!
//! A [`FieldCatalog`] holds the property names a client's CRM exposes for one object type,
//! minus denied property groups. Mappings are checked against the catalogs at the start of a
//! cycle so retired properties are dropped instead of being requested.

use std::collections::{BTreeSet, HashSet};

use dealsync_config::shared::{ClientFieldSettings, FieldCandidate, ObjectKind, TransformRules};
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::source::Source;
use crate::types::PropertyDefinition;

/// Deal properties requested on every fetch regardless of the mapping.
pub const CONTROL_PROPERTIES: &[&str] = &["dealstage", "pipeline", "closedate", MERGED_IDS_PROPERTY];

/// Deal property listing the ids merged into the deal, separated by `;`.
pub const MERGED_IDS_PROPERTY: &str = "hs_merged_object_ids";

/// Valid property names for one object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCatalog {
    object: ObjectKind,
    properties: HashSet<String>,
}

impl FieldCatalog {
    /// Builds a catalog from property definitions, skipping those in a denied group.
    pub fn from_definitions<I>(object: ObjectKind, definitions: I, denied_groups: &[String]) -> Self
    where
        I: IntoIterator<Item = PropertyDefinition>,
    {
        let properties = definitions
            .into_iter()
            .filter(|definition| !denied_groups.contains(&definition.group_name))
            .map(|definition| definition.name)
            .collect();

        Self { object, properties }
    }

    pub fn from_names<I, S>(object: ObjectKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            object,
            properties: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn object(&self) -> ObjectKind {
        self.object
    }

    pub fn contains(&self, property: &str) -> bool {
        self.properties.contains(property)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Lists the deal properties. A failure aborts the client's cycle.
pub async fn load_deal_catalog<S: Source>(
    source: &S,
    rules: &TransformRules,
) -> SyncResult<FieldCatalog> {
    let definitions = source.list_properties(ObjectKind::Deal).await?;
    let catalog =
        FieldCatalog::from_definitions(ObjectKind::Deal, definitions, &rules.denied_property_groups);

    info!(properties = catalog.len(), "loaded deal field catalog");

    Ok(catalog)
}

/// Lists the contact properties, falling back to the configured fallback set on failure.
pub async fn load_contact_catalog<S: Source>(source: &S, rules: &TransformRules) -> FieldCatalog {
    match source.list_properties(ObjectKind::Contact).await {
        Ok(definitions) => FieldCatalog::from_definitions(
            ObjectKind::Contact,
            definitions,
            &rules.denied_property_groups,
        ),
        Err(err) => {
            warn!(error = %err, "contact property listing failed, using fallback properties");
            FieldCatalog::from_names(
                ObjectKind::Contact,
                rules.contact_fallback_properties.iter().cloned(),
            )
        }
    }
}

/// A client mapping restricted to properties the catalogs know about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunedMapping {
    fields: IndexMap<String, Vec<FieldCandidate>>,
    deal_properties: BTreeSet<String>,
    contact_properties: BTreeSet<String>,
}

impl PrunedMapping {
    /// Logical fields in configured order with their surviving candidates.
    pub fn fields(&self) -> &IndexMap<String, Vec<FieldCandidate>> {
        &self.fields
    }

    pub fn candidates(&self, logical_field: &str) -> Option<&[FieldCandidate]> {
        self.fields.get(logical_field).map(Vec::as_slice)
    }

    /// Deal properties to request: mapped properties plus [`CONTROL_PROPERTIES`] and
    /// `extra`, sorted and deduplicated.
    pub fn deal_properties(&self, extra: &[&str]) -> Vec<String> {
        let mut properties = self.deal_properties.clone();
        properties.extend(CONTROL_PROPERTIES.iter().map(|name| (*name).to_owned()));
        properties.extend(extra.iter().map(|name| (*name).to_owned()));
        properties.into_iter().collect()
    }

    /// Contact properties to request. Empty when no candidate reads from contacts.
    pub fn contact_properties(&self) -> Vec<String> {
        self.contact_properties.iter().cloned().collect()
    }
}

/// Drops candidates whose property is unknown to both catalogs.
///
/// A candidate without an object that only exists on one object type is narrowed to it.
/// Logical fields left without candidates are removed.
pub fn prune_mapping(
    mapping: &ClientFieldSettings,
    deals: &FieldCatalog,
    contacts: &FieldCatalog,
) -> PrunedMapping {
    let mut pruned = PrunedMapping::default();

    for (logical_field, candidates) in mapping {
        let mut kept = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let on_deal = candidate.targets(ObjectKind::Deal) && deals.contains(&candidate.property);
            let on_contact =
                candidate.targets(ObjectKind::Contact) && contacts.contains(&candidate.property);

            let narrowed = match (on_deal, on_contact) {
                (true, true) => candidate.clone(),
                (true, false) => FieldCandidate::on(ObjectKind::Deal, candidate.property.clone()),
                (false, true) => {
                    FieldCandidate::on(ObjectKind::Contact, candidate.property.clone())
                }
                (false, false) => {
                    warn!(
                        logical_field,
                        property = candidate.property,
                        "dropping mapping candidate unknown to the crm"
                    );
                    continue;
                }
            };

            if on_deal {
                pruned.deal_properties.insert(candidate.property.clone());
            }
            if on_contact {
                pruned.contact_properties.insert(candidate.property.clone());
            }
            kept.push(narrowed);
        }

        if kept.is_empty() {
            warn!(logical_field, "logical field has no valid candidates, skipping it");
            continue;
        }

        pruned.fields.insert(logical_field.clone(), kept);
    }

    pruned
}
