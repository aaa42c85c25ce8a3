//! Removal of rows for deals that were archived or merged away.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::catalog::MERGED_IDS_PROPERTY;
use crate::destination::{Destination, SheetCoordinates};
use crate::error::{SyncError, SyncResult};
use crate::source::Source;
use crate::types::SourceRecord;
use crate::upsert::key_column_index;

/// Outcome of a deletion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub success: bool,
    pub deleted_count: usize,
    pub error: Option<String>,
}

impl DeletionReport {
    pub fn deleted(deleted_count: usize) -> Self {
        Self {
            success: true,
            deleted_count,
            error: None,
        }
    }

    pub fn failed(err: &SyncError) -> Self {
        Self {
            success: false,
            deleted_count: 0,
            error: Some(err.to_string()),
        }
    }
}

/// Collects the ids listed in the merged-ids property of `records`, deduplicated in first-seen
/// order.
pub fn merged_away_ids(records: &[SourceRecord]) -> Vec<String> {
    let mut seen = HashSet::new();

    records
        .iter()
        .filter_map(|record| record.property(MERGED_IDS_PROPERTY))
        .flat_map(|merged| {
            merged
                .split(';')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Returns the indices of data rows whose key cell is in `ids`, in descending order.
pub fn rows_to_delete(rows: &[Vec<String>], key_index: usize, ids: &HashSet<String>) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| {
            row.get(key_index)
                .is_some_and(|cell| ids.contains(cell.trim()))
        })
        .map(|(index, _)| index)
        .rev()
        .collect()
}

/// Deletes the rows of deals merged away in `records` or archived in the source.
///
/// Missing destination coordinates are returned as an error. Every later failure is captured
/// in the returned report so the cycle can still report its upserts.
pub async fn reconcile_deletions<S, D>(
    source: &S,
    destination: &D,
    coordinates: &SheetCoordinates,
    client_name: &str,
    key_column: &str,
    records: &[SourceRecord],
) -> SyncResult<DeletionReport>
where
    S: Source,
    D: Destination,
{
    coordinates.ensure_complete(client_name)?;

    let report = match delete_stale_rows(source, destination, coordinates, key_column, records).await {
        Ok(deleted_count) => {
            info!(deleted_count, "deleted stale rows");
            DeletionReport::deleted(deleted_count)
        }
        Err(err) => {
            warn!(error = %err, "row deletion failed");
            DeletionReport::failed(&err)
        }
    };

    Ok(report)
}

async fn delete_stale_rows<S, D>(
    source: &S,
    destination: &D,
    coordinates: &SheetCoordinates,
    key_column: &str,
    records: &[SourceRecord],
) -> SyncResult<usize>
where
    S: Source,
    D: Destination,
{
    let mut ids: HashSet<String> = merged_away_ids(records).into_iter().collect();
    let merged_count = ids.len();
    ids.extend(source.list_archived().await?);

    info!(merged = merged_count, total = ids.len(), "collected deal ids to remove");

    if ids.is_empty() {
        return Ok(0);
    }

    let rows = destination.read_rows(coordinates).await?;
    let headers = rows.first().map(Vec::as_slice).unwrap_or_default();
    let key_index = key_column_index(headers, key_column)?;

    let row_indices = rows_to_delete(&rows, key_index, &ids);
    if row_indices.is_empty() {
        return Ok(0);
    }

    let sheet_id = match coordinates.sheet_id {
        Some(sheet_id) => sheet_id,
        None => destination.resolve_sheet_id(coordinates).await?,
    };

    destination
        .delete_rows(coordinates, sheet_id, &row_indices)
        .await?;

    Ok(row_indices.len())
}
