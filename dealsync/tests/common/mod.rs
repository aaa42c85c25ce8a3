#![allow(dead_code)]

use std::ops::Deref;
use std::sync::Once;

use chrono::{DateTime, TimeZone, Utc};
use dealsync::source::memory::MemorySource;
use dealsync::types::{Owner, Pipeline, PipelineStage, Properties, PropertyDefinition};
use dealsync_config::shared::{ClientConfig, ClientFieldSettings, ObjectKind};
use secrecy::SecretString;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

/// Token every mocked API expects as bearer auth.
pub const TEST_TOKEN: &str = "test-token";

static INIT_TRACING: Once = Once::new();

/// Installs a test subscriber when `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    if std::env::var("ENABLE_TRACING").is_err() {
        return;
    }

    INIT_TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| "dealsync=debug".into()),
            )
            .with_test_writer()
            .init();
    });
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

pub fn properties(value: Value) -> Properties {
    serde_json::from_value(value).unwrap()
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

pub fn client(name: &str, spreadsheet_id: &str, worksheet_name: &str) -> ClientConfig {
    ClientConfig {
        client_name: name.to_owned(),
        spreadsheet_id: spreadsheet_id.to_owned(),
        worksheet_name: worksheet_name.to_owned(),
        source_access_token: SecretString::new(TEST_TOKEN.to_owned()),
        sheet_id: None,
    }
}

pub fn mapping(value: Value) -> ClientFieldSettings {
    serde_json::from_value(value).unwrap()
}

/// Header row with every required column.
pub fn full_headers() -> Vec<String> {
    strings(&[
        "Deal Id",
        "Amount",
        "Contract Type",
        "Deal Owner",
        "Won Date",
        "Estimate Date",
        "Create Date",
    ])
}

/// A CRM with a small deal and contact catalog, one pipeline and one owner.
pub async fn seeded_source() -> MemorySource {
    let source = MemorySource::new();

    source
        .set_properties(
            ObjectKind::Deal,
            [
                "amount",
                "contract_type",
                "hubspot_owner_id",
                "closedate",
                "createdate",
                "estimate_date",
                "dealstage",
                "pipeline",
                "hs_merged_object_ids",
            ]
            .into_iter()
            .map(|name| PropertyDefinition::new(name, "dealinformation"))
            .chain([PropertyDefinition::new(
                "hs_analytics_source",
                "analytics_history",
            )])
            .collect(),
        )
        .await;
    source
        .set_properties(
            ObjectKind::Contact,
            ["email", "firstname", "lastname"]
                .into_iter()
                .map(|name| PropertyDefinition::new(name, "contactinformation"))
                .collect(),
        )
        .await;
    source
        .set_pipelines(vec![Pipeline {
            id: "default".to_owned(),
            label: "Sales Pipeline".to_owned(),
            stages: vec![
                PipelineStage {
                    id: "closedwon".to_owned(),
                    label: "Won".to_owned(),
                },
                PipelineStage {
                    id: "qualified".to_owned(),
                    label: "Qualified".to_owned(),
                },
            ],
        }])
        .await;
    source
        .set_owners(vec![Owner {
            id: "7".to_owned(),
            first_name: Some("Jane".to_owned()),
            last_name: Some("Doe".to_owned()),
            email: Some("jane@example.com".to_owned()),
        }])
        .await;

    source
}

/// Mock of the CRM REST API.
pub struct CrmMock {
    server: MockServer,
}

impl CrmMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Mocks a JSON response for `verb` on `endpoint`, expected `n_times`.
    pub async fn mock_json<T: Into<Times>>(
        &self,
        verb: &str,
        endpoint: &str,
        body: Value,
        n_times: T,
    ) {
        Mock::given(method(verb))
            .and(path(endpoint))
            .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .named(format!("{verb} {endpoint}"))
            .expect(n_times)
            .mount(self)
            .await;
    }

    /// Mocks an error status for `verb` on `endpoint`.
    pub async fn mock_status(&self, verb: &str, endpoint: &str, status: u16) {
        Mock::given(method(verb))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status))
            .named(format!("{verb} {endpoint} -> {status}"))
            .mount(self)
            .await;
    }
}

impl Deref for CrmMock {
    type Target = MockServer;

    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

/// Mock of the spreadsheet REST API.
pub struct SheetsMock {
    server: MockServer,
}

impl SheetsMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Mocks a values read of `range` returning `rows`.
    pub async fn mock_values(&self, spreadsheet_id: &str, range: &str, rows: Value) {
        let response = ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        }));

        Mock::given(method("GET"))
            .and(path(format!("/v4/spreadsheets/{spreadsheet_id}/values/{range}")))
            .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .respond_with(response)
            .named(format!("read {range}"))
            .mount(self)
            .await;
    }
}

impl Deref for SheetsMock {
    type Target = MockServer;

    fn deref(&self) -> &Self::Target {
        &self.server
    }
}
