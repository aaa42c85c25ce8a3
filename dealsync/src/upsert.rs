//! Keyed upsert of projected rows.

use tracing::debug;

use crate::bail;
use crate::destination::{Destination, SheetCoordinates};
use crate::error::{ErrorKind, SyncResult};
use crate::header::{HeaderResolver, find_column};
use crate::project::ProjectedRow;

/// What an upsert did to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated { row_index: usize },
    /// The existing row already held the projected values, nothing was written.
    Unchanged { row_index: usize },
}

/// Returns the index of the key column, failing when the header row has none.
pub fn key_column_index<H: AsRef<str>>(headers: &[H], key_column: &str) -> SyncResult<usize> {
    match find_column(headers, key_column) {
        Some(index) => Ok(index),
        None => bail!(
            ErrorKind::MissingKeyColumn,
            "Key column is missing from the header row",
            key_column.to_owned()
        ),
    }
}

/// Returns the index of the first data row whose key cell equals `key`.
pub fn find_row(rows: &[Vec<String>], key_index: usize, key: &str) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| row.get(key_index).is_some_and(|cell| cell.trim() == key))
        .map(|(index, _)| index)
}

fn matches_existing(existing: &[String], assembled: &[String]) -> bool {
    assembled.iter().enumerate().all(|(index, value)| {
        existing.get(index).map(String::as_str).unwrap_or_default() == value
    })
}

/// Writes `row` to the destination, overwriting the row with the same key or appending a new
/// one.
///
/// The table is read before deciding, and the row is laid out in `headers` order.
pub async fn upsert_row<D: Destination>(
    destination: &D,
    coordinates: &SheetCoordinates,
    headers: &[String],
    resolver: &HeaderResolver,
    key_column: &str,
    row: &ProjectedRow,
) -> SyncResult<UpsertOutcome> {
    let key_index = key_column_index(headers, key_column)?;
    let assembled = row.assemble(headers, resolver, key_column);
    let rows = destination.read_rows(coordinates).await?;

    match find_row(&rows, key_index, row.key()) {
        Some(row_index) if matches_existing(&rows[row_index], &assembled) => {
            debug!(deal_id = row.key(), row_index, "row already up to date");
            Ok(UpsertOutcome::Unchanged { row_index })
        }
        Some(row_index) => {
            destination
                .update_row(coordinates, row_index, assembled)
                .await?;
            debug!(deal_id = row.key(), row_index, "updated row");
            Ok(UpsertOutcome::Updated { row_index })
        }
        None => {
            destination.append_row(coordinates, assembled).await?;
            debug!(deal_id = row.key(), "appended row");
            Ok(UpsertOutcome::Inserted)
        }
    }
}
