//! Projection of deals into destination rows.

use std::collections::HashMap;

use dealsync_config::shared::{FieldCandidate, ObjectKind, TransformRules};
use indexmap::IndexMap;

use crate::catalog::PrunedMapping;
use crate::header::{HeaderResolver, normalize};
use crate::transform::{
    FieldCategory, LabelCatalog, display_label, gate_won_date, is_suppressed_field,
    normalize_date_value, suppression_applies,
};
use crate::types::{AssociatedRecord, SourceRecord};

/// Deal property holding the stage id.
const STAGE_PROPERTY: &str = "dealstage";

/// Deal property holding the pipeline id.
const PIPELINE_PROPERTY: &str = "pipeline";

/// A projected value. [`Cell::Null`] is an explicit blank, distinct from a field that was
/// never projected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Null,
}

impl Cell {
    pub fn as_text(&self) -> &str {
        match self {
            Cell::Text(text) => text,
            Cell::Null => "",
        }
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(text) => Cell::Text(text),
            None => Cell::Null,
        }
    }
}

/// A deal flattened into display values keyed by header label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedRow {
    key: String,
    cells: IndexMap<String, Cell>,
}

impl ProjectedRow {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cells: IndexMap::new(),
        }
    }

    /// Adds a cell under a header label, replacing any previous value.
    pub fn with_cell(mut self, label: impl Into<String>, cell: Cell) -> Self {
        self.cells.insert(label.into(), cell);
        self
    }

    /// The source record id, written to the key column.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self, label: &str) -> Option<&Cell> {
        self.cells.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Lays the row out in header order.
    ///
    /// The column matching `key_column` gets the record id. Every other column gets the cell
    /// its header resolves to, or an empty string when it resolves to nothing.
    pub fn assemble<H: AsRef<str>>(
        &self,
        headers: &[H],
        resolver: &HeaderResolver,
        key_column: &str,
    ) -> Vec<String> {
        let labels: Vec<&str> = self.labels().collect();
        let plan = resolver.plan(headers, &labels);
        let key_column = normalize(key_column);

        headers
            .iter()
            .zip(plan)
            .map(|(header, resolved)| {
                if normalize(header.as_ref()) == key_column {
                    return self.key.clone();
                }

                resolved
                    .map(|index| self.cells[index].as_text().to_owned())
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// Returns the first non-empty value among `candidates`, checking the deal before each
/// associated contact for every candidate.
pub fn resolve_candidates(
    candidates: &[FieldCandidate],
    record: &SourceRecord,
    contacts: &HashMap<String, AssociatedRecord>,
) -> Option<String> {
    candidates.iter().find_map(|candidate| {
        let from_deal = candidate
            .targets(ObjectKind::Deal)
            .then(|| record.property(&candidate.property))
            .flatten();
        if from_deal.is_some() {
            return from_deal;
        }

        if candidate.targets(ObjectKind::Contact) {
            return record
                .associations
                .iter()
                .filter_map(|contact_id| contacts.get(contact_id))
                .find_map(|contact| contact.property(&candidate.property));
        }

        None
    })
}

/// Projects deals using one client's pruned mapping and the cycle's label catalog.
#[derive(Debug, Clone, Copy)]
pub struct Projector<'a> {
    mapping: &'a PrunedMapping,
    labels: &'a LabelCatalog,
    rules: &'a TransformRules,
}

impl<'a> Projector<'a> {
    pub fn new(
        mapping: &'a PrunedMapping,
        labels: &'a LabelCatalog,
        rules: &'a TransformRules,
    ) -> Self {
        Self {
            mapping,
            labels,
            rules,
        }
    }

    pub fn project(
        &self,
        record: &SourceRecord,
        contacts: &HashMap<String, AssociatedRecord>,
    ) -> ProjectedRow {
        let stage_label = record
            .property(STAGE_PROPERTY)
            .map(|stage| self.labels.resolve(FieldCategory::DealStage, stage));
        let pipeline_label = record
            .property(PIPELINE_PROPERTY)
            .map(|pipeline| self.labels.resolve(FieldCategory::Pipeline, pipeline));
        let active_suppressions: Vec<_> = self
            .rules
            .suppression
            .iter()
            .filter(|rule| {
                let trigger = self.trigger_value(&rule.trigger_field, record);
                suppression_applies(rule, trigger.as_deref())
            })
            .collect();

        let mut row = ProjectedRow::new(record.id.clone())
            .with_cell(self.rules.key_column.clone(), Cell::Text(record.id.clone()));

        for (logical_field, candidates) in self.mapping.fields() {
            let label = display_label(logical_field);

            if active_suppressions
                .iter()
                .any(|rule| is_suppressed_field(rule, logical_field))
            {
                row = row.with_cell(label, Cell::Null);
                continue;
            }

            let category = FieldCategory::infer(logical_field);
            let value = match category {
                FieldCategory::WonDate => {
                    let value = resolve_candidates(candidates, record, contacts)
                        .or_else(|| record.property(&self.rules.won_date.source_property));
                    gate_won_date(
                        &self.rules.won_date,
                        stage_label.as_deref(),
                        pipeline_label.as_deref(),
                        value,
                    )
                }
                _ => resolve_candidates(candidates, record, contacts)
                    .map(|value| self.labels.resolve(category, value)),
            };

            row = row.with_cell(label, value.map(normalize_date_value).into());
        }

        row
    }

    /// Reads a trigger field from the deal only, through its mapping candidates when mapped
    /// and by property name otherwise.
    fn trigger_value(&self, trigger_field: &str, record: &SourceRecord) -> Option<String> {
        match self.mapping.candidates(trigger_field) {
            Some(candidates) => candidates
                .iter()
                .filter(|candidate| candidate.targets(ObjectKind::Deal))
                .find_map(|candidate| record.property(&candidate.property)),
            None => record.property(trigger_field),
        }
    }
}
