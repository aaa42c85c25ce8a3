//! Value transforms applied while projecting a deal into a row.
//!
//! Every function here is pure: label catalogs are loaded once per cycle and passed in.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use dealsync_config::shared::{SuppressionRule, WonDateRule};
use regex::Regex;

use crate::types::{Owner, Pipeline};

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z$").expect("valid timestamp pattern")
});

static DELIMITED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,4}[-/]\d{1,2}[-/]\d{1,4}|\d{1,2}[-/]\d{1,2}[-/]\d{2,4})$")
        .expect("valid date pattern")
});

static PURE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid digits pattern"));

/// Parses a date-like string into a calendar date.
///
/// Accepts ISO-8601 UTC timestamps and `-` or `/` delimited numeric dates. Delimited dates
/// starting with a four digit year are read as year, month, day; all others as month, day,
/// year. Two digit years map `00..=49` to `20xx` and `50..=99` to `19xx`; three and four
/// digit years are taken as written. Pure digit strings are never dates.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if PURE_DIGITS.is_match(value) {
        return None;
    }

    if ISO_TIMESTAMP.is_match(value) {
        return DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|timestamp| timestamp.with_timezone(&Utc).date_naive());
    }

    if !DELIMITED_DATE.is_match(value) {
        return None;
    }

    let parts: Vec<&str> = value.split(['-', '/']).collect();
    let [first, second, third] = parts.as_slice() else {
        return None;
    };

    let (year, month, day) = if first.len() == 4 {
        if third.len() > 2 {
            return None;
        }
        (first.parse().ok()?, second.parse().ok()?, third.parse().ok()?)
    } else {
        let year = match third.len() {
            2 => {
                let short: i32 = third.parse().ok()?;
                if short < 50 { 2000 + short } else { 1900 + short }
            }
            3 | 4 => third.parse().ok()?,
            _ => return None,
        };
        (year, first.parse().ok()?, second.parse().ok()?)
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn is_likely_date(value: &str) -> bool {
    parse_date(value).is_some()
}

/// Formats a date as `M/D/YYYY` without zero padding.
pub fn format_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Reformats date-like values as `M/D/YYYY` and returns everything else unchanged.
pub fn normalize_date_value(value: String) -> String {
    match parse_date(&value) {
        Some(date) => format_date(date),
        None => value,
    }
}

/// Turns a logical field name into a header label: `deal_owner` becomes `Deal Owner`.
pub fn display_label(logical_field: &str) -> String {
    let mut label = String::with_capacity(logical_field.len());
    let mut at_word_start = true;

    for c in logical_field.chars() {
        let c = if c == '_' { ' ' } else { c };
        let is_word = c.is_alphanumeric();

        if is_word && at_word_start {
            label.extend(c.to_uppercase());
        } else {
            label.push(c);
        }
        at_word_start = !is_word;
    }

    label
}

/// Semantic category of a logical field, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    DealStage,
    DealOwner,
    Pipeline,
    WonDate,
    Other,
}

impl FieldCategory {
    /// Checks the lowercased name for known fragments, first match wins.
    pub fn infer(logical_field: &str) -> Self {
        let name = logical_field.to_lowercase();

        if name.contains("deal_stage") {
            FieldCategory::DealStage
        } else if name.contains("deal_owner") {
            FieldCategory::DealOwner
        } else if name.contains("pipeline") {
            FieldCategory::Pipeline
        } else if name.contains("won_date") {
            FieldCategory::WonDate
        } else {
            FieldCategory::Other
        }
    }
}

/// Display labels for stage, pipeline and owner ids, loaded once per cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCatalog {
    stages: HashMap<String, String>,
    pipelines: HashMap<String, String>,
    owners: HashMap<String, String>,
}

impl LabelCatalog {
    pub fn new(pipelines: &[Pipeline], owners: &[Owner]) -> Self {
        let mut catalog = Self::default();

        for pipeline in pipelines {
            catalog
                .pipelines
                .insert(pipeline.id.clone(), pipeline.label.clone());
            for stage in &pipeline.stages {
                catalog.stages.insert(stage.id.clone(), stage.label.clone());
            }
        }

        for owner in owners {
            catalog.owners.insert(owner.id.clone(), owner.display_name());
        }

        catalog
    }

    pub fn stage_label(&self, stage_id: &str) -> Option<&str> {
        self.stages.get(stage_id).map(String::as_str)
    }

    pub fn pipeline_label(&self, pipeline_id: &str) -> Option<&str> {
        self.pipelines.get(pipeline_id).map(String::as_str)
    }

    pub fn owner_name(&self, owner_id: &str) -> Option<&str> {
        self.owners.get(owner_id).map(String::as_str)
    }

    /// Replaces an id with its label for label-backed categories; unknown ids pass through.
    pub fn resolve(&self, category: FieldCategory, value: String) -> String {
        let label = match category {
            FieldCategory::DealStage => self.stage_label(&value),
            FieldCategory::DealOwner => self.owner_name(&value),
            FieldCategory::Pipeline => self.pipeline_label(&value),
            _ => None,
        };

        label.map(str::to_owned).unwrap_or(value)
    }
}

/// Whether `rule` blanks its suppressed fields given the trigger field's value.
pub fn suppression_applies(rule: &SuppressionRule, trigger_value: Option<&str>) -> bool {
    trigger_value.is_some_and(|value| {
        value
            .to_lowercase()
            .contains(&rule.contains.to_lowercase())
    })
}

/// Whether `rule` suppresses `logical_field`: the lowercased name contains one of the
/// rule's fragments, so `deal_create_date` falls under `create_date`.
pub fn is_suppressed_field(rule: &SuppressionRule, logical_field: &str) -> bool {
    let name = logical_field.to_lowercase();

    rule.suppressed_fields
        .iter()
        .any(|fragment| name.contains(&fragment.to_lowercase()))
}

/// Gates the won date on the deal's stage and pipeline labels.
///
/// Returns `value` only when the stage label is exactly the won label and the pipeline label
/// is the configured pipeline; [`None`] means the cell is written empty.
pub fn gate_won_date(
    rule: &WonDateRule,
    stage_label: Option<&str>,
    pipeline_label: Option<&str>,
    value: Option<String>,
) -> Option<String> {
    if stage_label == Some(rule.won_stage_label.as_str())
        && pipeline_label == Some(rule.pipeline_label.as_str())
    {
        value
    } else {
        None
    }
}
