//! One client's sync cycle.

use std::fmt;

use chrono::{DateTime, Utc};
use dealsync_config::shared::{ClientConfig, ClientFieldSettings, SyncSettings, TransformRules};
use tracing::{info, warn};

use crate::bail;
use crate::catalog::{load_contact_catalog, load_deal_catalog, prune_mapping};
use crate::destination::{Destination, SheetCoordinates};
use crate::error::{ErrorKind, SyncResult};
use crate::fetch::{FetchWindow, fetch_records};
use crate::header::{HeaderResolver, find_column};
use crate::project::{ProjectedRow, Projector};
use crate::reconcile::{DeletionReport, reconcile_deletions};
use crate::source::Source;
use crate::transform::LabelCatalog;
use crate::upsert::{UpsertOutcome, upsert_row};

/// Whether a cycle reads recently modified deals or every deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Full => write!(f, "full"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Everything one client's cycle reads from, passed explicitly into every step.
pub struct CycleContext<'a, S, D> {
    pub client: &'a ClientConfig,
    pub mapping: &'a ClientFieldSettings,
    pub settings: &'a SyncSettings,
    pub rules: &'a TransformRules,
    pub resolver: &'a HeaderResolver,
    pub source: &'a S,
    pub destination: &'a D,
}

/// Counts produced by a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub client: String,
    pub mode: SyncMode,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deletion: DeletionReport,
}

/// Runs fetch, projection, upsert and deletion for one client.
///
/// Coordinates and headers are validated before anything is fetched, so a misconfigured
/// worksheet fails without touching the destination. Writes are not rolled back when a later
/// write fails.
#[tracing::instrument(skip_all, fields(client = %ctx.client.client_name, %mode))]
pub async fn run_cycle<S, D>(
    ctx: &CycleContext<'_, S, D>,
    mode: SyncMode,
    now: DateTime<Utc>,
) -> SyncResult<CycleReport>
where
    S: Source,
    D: Destination,
{
    let client_name = ctx.client.client_name.as_str();
    let coordinates = SheetCoordinates::from_client(ctx.client);
    coordinates.ensure_complete(client_name)?;

    let headers = ctx.destination.read_header(&coordinates).await?;
    validate_headers(ctx, &headers)?;

    let deals = load_deal_catalog(ctx.source, ctx.rules).await?;
    let contacts = load_contact_catalog(ctx.source, ctx.rules).await;
    let mapping = prune_mapping(ctx.mapping, &deals, &contacts);
    if mapping.fields().is_empty() {
        warn!("no mapped field survived catalog validation, only deal ids will be written");
    }

    let labels = LabelCatalog::new(
        &ctx.source.list_pipelines().await?,
        &ctx.source.list_owners().await?,
    );

    let mut extra_properties = vec![ctx.rules.won_date.source_property.as_str()];
    extra_properties.extend(
        ctx.rules
            .suppression
            .iter()
            .map(|rule| rule.trigger_field.as_str())
            .filter(|field| deals.contains(field)),
    );

    let window = match mode {
        SyncMode::Full => FetchWindow::All,
        SyncMode::Incremental => FetchWindow::trailing(now, ctx.settings.lookback_minutes),
    };
    let fetched = fetch_records(
        ctx.source,
        window,
        &mapping.deal_properties(&extra_properties),
        &mapping.contact_properties(),
        ctx.settings,
    )
    .await?;

    let projector = Projector::new(&mapping, &labels, ctx.rules);
    let rows: Vec<ProjectedRow> = fetched
        .records
        .iter()
        .map(|record| projector.project(record, &fetched.contacts))
        .collect();

    let mut report = CycleReport {
        client: client_name.to_owned(),
        mode,
        fetched: fetched.records.len(),
        inserted: 0,
        updated: 0,
        unchanged: 0,
        deletion: DeletionReport::deleted(0),
    };

    if mode == SyncMode::Full && is_table_empty(ctx.destination, &coordinates).await? {
        report.inserted = write_all(ctx, &coordinates, &headers, &rows).await?;
    } else {
        for row in &rows {
            let outcome = upsert_row(
                ctx.destination,
                &coordinates,
                &headers,
                ctx.resolver,
                &ctx.rules.key_column,
                row,
            )
            .await?;

            match outcome {
                UpsertOutcome::Inserted => report.inserted += 1,
                UpsertOutcome::Updated { .. } => report.updated += 1,
                UpsertOutcome::Unchanged { .. } => report.unchanged += 1,
            }
        }
    }

    report.deletion = reconcile_deletions(
        ctx.source,
        ctx.destination,
        &coordinates,
        client_name,
        &ctx.rules.key_column,
        &fetched.records,
    )
    .await?;

    info!(
        fetched = report.fetched,
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        deleted = report.deletion.deleted_count,
        deletion_succeeded = report.deletion.success,
        "sync cycle completed"
    );

    Ok(report)
}

fn validate_headers<S, D>(ctx: &CycleContext<'_, S, D>, headers: &[String]) -> SyncResult<()> {
    let client_name = &ctx.client.client_name;

    let missing = ctx
        .resolver
        .missing_headers(headers, &ctx.rules.required_headers);
    if !missing.is_empty() {
        bail!(
            ErrorKind::MissingRequiredHeaders,
            "Destination is missing required headers",
            format!("client `{client_name}` is missing {}", missing.join(", "))
        );
    }

    if find_column(headers, &ctx.rules.key_column).is_none() {
        bail!(
            ErrorKind::MissingKeyColumn,
            "Key column is missing from the header row",
            format!("client `{client_name}` has no `{}` column", ctx.rules.key_column)
        );
    }

    Ok(())
}

async fn is_table_empty<D: Destination>(
    destination: &D,
    coordinates: &SheetCoordinates,
) -> SyncResult<bool> {
    let rows = destination.read_rows(coordinates).await?;

    Ok(rows
        .iter()
        .skip(1)
        .all(|row| row.iter().all(|cell| cell.trim().is_empty())))
}

/// Writes every row in one request directly below the header.
async fn write_all<S, D: Destination>(
    ctx: &CycleContext<'_, S, D>,
    coordinates: &SheetCoordinates,
    headers: &[String],
    rows: &[ProjectedRow],
) -> SyncResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    let assembled: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.assemble(headers, ctx.resolver, &ctx.rules.key_column))
        .collect();

    ctx.destination
        .write_rows(coordinates, 1, assembled)
        .await?;

    info!(rows = rows.len(), "wrote rows to empty worksheet");

    Ok(rows.len())
}
