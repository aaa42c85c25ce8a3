use dealsync::cycle::{CycleContext, CycleReport, SyncMode, run_cycle};
use dealsync::destination::memory::MemoryDestination;
use dealsync::error::{ErrorKind, SyncResult};
use dealsync::header::HeaderResolver;
use dealsync::reconcile::DeletionReport;
use dealsync::source::memory::MemorySource;
use dealsync::types::{AssociatedRecord, SourceRecord};
use dealsync_config::shared::{ClientConfig, ClientFieldSettings, ObjectKind, SyncSettings, TransformRules};
use serde_json::json;

mod common;

use common::{at, client, full_headers, init_test_tracing, mapping, properties, seeded_source, strings};

const SPREADSHEET: &str = "spreadsheet-1";
const WORKSHEET: &str = "Clean";

struct Harness {
    client: ClientConfig,
    mapping: ClientFieldSettings,
    settings: SyncSettings,
    rules: TransformRules,
    resolver: HeaderResolver,
    source: MemorySource,
    destination: MemoryDestination,
}

impl Harness {
    async fn new(headers: Vec<String>, mapping: ClientFieldSettings) -> Self {
        init_test_tracing();

        let destination = MemoryDestination::new();
        destination
            .insert_sheet(SPREADSHEET, WORKSHEET, 11, vec![headers])
            .await;

        Self {
            client: client("Acme Corp", SPREADSHEET, WORKSHEET),
            mapping,
            settings: SyncSettings::default(),
            rules: TransformRules::default(),
            resolver: HeaderResolver::default(),
            source: seeded_source().await,
            destination,
        }
    }

    /// Header `Deal Id, Amount, Deal Owner` with only those two columns required.
    async fn minimal() -> Self {
        let mut harness = Self::new(
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            mapping(json!({
                "amount": ["amount"],
                "deal_owner": ["hubspot_owner_id"]
            })),
        )
        .await;
        harness.rules.required_headers = strings(&["Amount", "Deal Owner"]);
        harness
    }

    async fn run(&self, mode: SyncMode) -> SyncResult<CycleReport> {
        let ctx = CycleContext {
            client: &self.client,
            mapping: &self.mapping,
            settings: &self.settings,
            rules: &self.rules,
            resolver: &self.resolver,
            source: &self.source,
            destination: &self.destination,
        };

        run_cycle(&ctx, mode, at(12, 2)).await
    }

    async fn rows(&self) -> Vec<Vec<String>> {
        self.destination.rows(SPREADSHEET, WORKSHEET).await
    }

    async fn set_rows(&self, rows: Vec<Vec<String>>) {
        self.destination
            .insert_sheet(SPREADSHEET, WORKSHEET, 11, rows)
            .await;
    }

    async fn deal(&self, id: &str, value: serde_json::Value) {
        self.source
            .upsert_deal(SourceRecord::new(id, properties(value)), at(12, 0))
            .await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn new_deal_is_appended_in_header_order() {
    let harness = Harness::minimal().await;
    harness
        .deal("42", json!({"amount": 500, "hubspot_owner_id": "7"}))
        .await;

    let report = harness.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.client, "Acme Corp");
    assert_eq!(report.fetched, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.deletion, DeletionReport::deleted(0));
    assert_eq!(
        harness.rows().await,
        vec![
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            strings(&["42", "500", "Jane Doe"]),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn existing_deal_is_updated_in_place() {
    let harness = Harness::minimal().await;
    harness
        .set_rows(vec![
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            strings(&["1", "10", "Ann"]),
            strings(&["2", "20", "Bo"]),
            strings(&["42", "1", "Someone Else"]),
            strings(&["3", "30", "Cy"]),
        ])
        .await;
    harness
        .deal("42", json!({"amount": "500", "hubspot_owner_id": "7"}))
        .await;

    let report = harness.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.inserted, 0);
    let rows = harness.rows().await;
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[3], strings(&["42", "500", "Jane Doe"]));
    assert_eq!(rows[4], strings(&["3", "30", "Cy"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_cycles_leave_one_row_per_deal() {
    let harness = Harness::minimal().await;
    harness
        .deal("42", json!({"amount": "500", "hubspot_owner_id": "7"}))
        .await;

    let first = harness.run(SyncMode::Incremental).await.unwrap();
    let rows_after_first = harness.rows().await;
    let writes_after_first = harness.destination.writes().await;
    let second = harness.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(first.inserted, 1);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(harness.rows().await, rows_after_first);
    assert_eq!(harness.destination.writes().await, writes_after_first);
}

#[tokio::test(flavor = "multi_thread")]
async fn merged_deals_are_removed_in_descending_order() {
    let harness = Harness::minimal().await;
    harness
        .set_rows(vec![
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            strings(&["101", "1", ""]),
            strings(&["5", "5", ""]),
            strings(&["102", "2", ""]),
        ])
        .await;
    harness
        .deal(
            "42",
            json!({"amount": "3", "hs_merged_object_ids": "101;102"}),
        )
        .await;

    let report = harness.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.deletion, DeletionReport::deleted(2));
    assert_eq!(harness.destination.deleted_batches().await, vec![vec![3, 1]]);
    assert_eq!(
        harness.rows().await,
        vec![
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            strings(&["5", "5", ""]),
            strings(&["42", "3", ""]),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn archived_deals_are_removed_even_when_unchanged() {
    let harness = Harness::minimal().await;
    harness
        .set_rows(vec![
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            strings(&["9", "1", ""]),
            strings(&["10", "2", ""]),
        ])
        .await;
    harness.source.archive_deal("9").await;

    let report = harness.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.fetched, 0);
    assert_eq!(report.deletion, DeletionReport::deleted(1));
    assert_eq!(
        harness.rows().await,
        vec![
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            strings(&["10", "2", ""]),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_required_header_aborts_before_fetching() {
    let harness = Harness::new(
        strings(&[
            "Deal Id",
            "Amount",
            "Contract Type",
            "Deal Owner",
            "Estimate Date",
            "Create Date",
        ]),
        mapping(json!({ "amount": ["amount"] })),
    )
    .await;
    harness.deal("42", json!({"amount": "500"})).await;
    // Would fail the cycle with a different error if the catalog were loaded first.
    harness.source.fail_property_listing(ObjectKind::Deal).await;

    let err = harness.run(SyncMode::Incremental).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingRequiredHeaders);
    let detail = err.detail().unwrap();
    assert!(detail.contains("Won Date"), "{detail}");
    assert!(detail.contains("Acme Corp"), "{detail}");
    assert_eq!(harness.destination.writes().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_key_column_aborts() {
    let mut harness = Harness::new(
        strings(&["Amount", "Deal Owner"]),
        mapping(json!({ "amount": ["amount"] })),
    )
    .await;
    harness.rules.required_headers = strings(&["Amount"]);

    let err = harness.run(SyncMode::Incremental).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingKeyColumn);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_coordinates_abort() {
    let mut harness = Harness::minimal().await;
    harness.client.worksheet_name = String::new();

    let err = harness.run(SyncMode::Incremental).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingDestinationCoordinates);
}

#[tokio::test(flavor = "multi_thread")]
async fn deal_property_listing_failure_is_fatal() {
    let harness = Harness::minimal().await;
    harness.source.fail_property_listing(ObjectKind::Deal).await;

    let err = harness.run(SyncMode::Incremental).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceRequestFailed);
    assert_eq!(harness.destination.writes().await, 0);
}

/// Rows with an archived deal `9`, so a deletion pass would remove row 1.
fn rows_with_archived_deal() -> Vec<Vec<String>> {
    vec![
        strings(&["Deal Id", "Amount", "Deal Owner"]),
        strings(&["9", "1", ""]),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn deal_search_failure_is_fatal_in_both_modes() {
    let harness = Harness::minimal().await;
    harness.set_rows(rows_with_archived_deal()).await;
    harness.source.archive_deal("9").await;
    harness
        .deal("42", json!({"amount": "500", "hubspot_owner_id": "7"}))
        .await;
    harness.source.fail_deal_search().await;

    for mode in [SyncMode::Incremental, SyncMode::Full] {
        let err = harness.run(mode).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceRequestFailed, "{mode}");
    }

    assert_eq!(harness.rows().await, rows_with_archived_deal());
    assert_eq!(harness.destination.writes().await, 0);
    assert!(harness.destination.deleted_batches().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn label_listing_failures_are_fatal() {
    let pipelines = Harness::minimal().await;
    pipelines.deal("42", json!({"amount": "500"})).await;
    pipelines.source.fail_pipeline_listing().await;

    let err = pipelines.run(SyncMode::Incremental).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceRequestFailed);
    assert_eq!(pipelines.destination.writes().await, 0);

    let owners = Harness::minimal().await;
    owners.deal("42", json!({"amount": "500"})).await;
    owners.source.fail_owner_listing().await;

    let err = owners.run(SyncMode::Incremental).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceRequestFailed);
    assert_eq!(owners.destination.writes().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_write_ends_the_cycle_without_rollback() {
    let harness = Harness::minimal().await;
    harness.set_rows(rows_with_archived_deal()).await;
    harness.source.archive_deal("9").await;
    harness
        .deal("1", json!({"amount": "10", "hubspot_owner_id": "7"}))
        .await;
    harness
        .deal("2", json!({"amount": "20", "hubspot_owner_id": "7"}))
        .await;
    harness.destination.fail_writes_after(1).await;

    let err = harness.run(SyncMode::Incremental).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DestinationRequestFailed);
    assert_eq!(
        harness.rows().await,
        vec![
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            strings(&["9", "1", ""]),
            strings(&["1", "10", "Jane Doe"]),
        ]
    );
    assert!(harness.destination.deleted_batches().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn contact_values_fill_gaps_and_degrade_on_failure() {
    let mut harness = Harness::new(
        strings(&["Deal Id", "Amount", "Deal Owner", "Email"]),
        mapping(json!({
            "amount": ["amount"],
            "email": [{ "property": "email", "object": "contact" }]
        })),
    )
    .await;
    harness.rules.required_headers = strings(&["Amount"]);
    harness.deal("1", json!({"amount": "10"})).await;
    harness.deal("2", json!({"amount": "20"})).await;
    harness
        .source
        .upsert_contact(AssociatedRecord::new(
            "500",
            properties(json!({"email": "ann@example.com"})),
        ))
        .await;
    harness.source.associate("1", "500").await;
    harness.source.associate("2", "500").await;
    harness.source.fail_associations_for("2").await;

    harness.run(SyncMode::Incremental).await.unwrap();

    let mut rows = harness.rows().await;
    rows[1..].sort();
    assert_eq!(rows[1], strings(&["1", "10", "", "ann@example.com"]));
    assert_eq!(rows[2], strings(&["2", "20", "", ""]));

    harness.source.fail_contact_reads().await;
    harness.deal("1", json!({"amount": "11"})).await;
    harness.run(SyncMode::Incremental).await.unwrap();

    let rows = harness.rows().await;
    let deal_1 = rows.iter().find(|row| row[0] == "1").unwrap();
    assert_eq!(deal_1, &strings(&["1", "11", "", ""]));
}

#[tokio::test(flavor = "multi_thread")]
async fn transforms_apply_to_full_header() {
    let harness = Harness::new(
        full_headers(),
        mapping(json!({
            "amount": ["amount"],
            "contract_type": ["contract_type"],
            "deal_owner": ["hubspot_owner_id"],
            "won_date": ["closedate"],
            "estimate_date": ["estimate_date"],
            "create_date": ["createdate"]
        })),
    )
    .await;
    harness
        .deal(
            "1",
            json!({
                "amount": "100",
                "contract_type": "New",
                "hubspot_owner_id": "7",
                "dealstage": "closedwon",
                "pipeline": "default",
                "closedate": "2024-04-03T00:00:00Z",
                "estimate_date": "2024-03-09",
                "createdate": "2024-01-15T10:00:00.000Z"
            }),
        )
        .await;
    harness
        .deal(
            "2",
            json!({
                "amount": "5",
                "contract_type": "Change Order #2",
                "hubspot_owner_id": "99",
                "dealstage": "qualified",
                "pipeline": "default",
                "closedate": "2024-04-03T00:00:00Z",
                "estimate_date": "2024-03-09",
                "createdate": "2024-01-15T10:00:00.000Z"
            }),
        )
        .await;

    harness.run(SyncMode::Incremental).await.unwrap();

    let mut rows = harness.rows().await;
    rows[1..].sort();
    assert_eq!(
        rows[1],
        strings(&["1", "100", "New", "Jane Doe", "4/3/2024", "3/9/2024", "1/15/2024"])
    );
    assert_eq!(
        rows[2],
        strings(&["2", "5", "Change Order #2", "99", "", "", ""])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn full_sync_writes_empty_worksheet_in_one_batch() {
    let harness = Harness::minimal().await;
    harness.deal("1", json!({"amount": "10"})).await;
    harness.deal("2", json!({"amount": "20"})).await;
    harness
        .source
        .upsert_deal(
            SourceRecord::new("3", properties(json!({"amount": "30"}))),
            at(1, 0),
        )
        .await;

    let report = harness.run(SyncMode::Full).await.unwrap();

    assert_eq!(report.mode, SyncMode::Full);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.inserted, 3);
    assert_eq!(harness.destination.writes().await, 1);

    let mut rows = harness.rows().await;
    rows[1..].sort();
    assert_eq!(
        rows,
        vec![
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            strings(&["1", "10", ""]),
            strings(&["2", "20", ""]),
            strings(&["3", "30", ""]),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn full_sync_upserts_into_populated_worksheet() {
    let harness = Harness::minimal().await;
    harness
        .set_rows(vec![
            strings(&["Deal Id", "Amount", "Deal Owner"]),
            strings(&["1", "old", ""]),
        ])
        .await;
    harness.deal("1", json!({"amount": "10"})).await;
    harness.deal("2", json!({"amount": "20"})).await;

    let report = harness.run(SyncMode::Full).await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(harness.rows().await.len(), 3);
}
