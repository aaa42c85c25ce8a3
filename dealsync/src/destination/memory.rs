use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::destination::{Destination, SheetCoordinates};
use crate::error::{ErrorKind, SyncResult};

#[derive(Debug, Clone)]
struct MemorySheet {
    sheet_id: i64,
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct Inner {
    sheets: HashMap<(String, String), MemorySheet>,
    failing_writes_after: Option<usize>,
    writes: usize,
    deleted_batches: Vec<Vec<usize>>,
}

impl Inner {
    fn sheet(&self, coordinates: &SheetCoordinates) -> SyncResult<&MemorySheet> {
        match self.sheets.get(&key(coordinates)) {
            Some(sheet) => Ok(sheet),
            None => bail!(
                ErrorKind::WorksheetNotFound,
                "Worksheet not found",
                coordinates.worksheet_name.clone()
            ),
        }
    }

    fn sheet_for_write(&mut self, coordinates: &SheetCoordinates) -> SyncResult<&mut MemorySheet> {
        if let Some(allowed) = self.failing_writes_after
            && self.writes >= allowed
        {
            bail!(ErrorKind::DestinationRequestFailed, "Injected write failure");
        }
        self.writes += 1;

        match self.sheets.get_mut(&key(coordinates)) {
            Some(sheet) => Ok(sheet),
            None => bail!(
                ErrorKind::WorksheetNotFound,
                "Worksheet not found",
                coordinates.worksheet_name.clone()
            ),
        }
    }
}

fn key(coordinates: &SheetCoordinates) -> (String, String) {
    (
        coordinates.spreadsheet_id.clone(),
        coordinates.worksheet_name.clone(),
    )
}

fn place_row(rows: &mut Vec<Vec<String>>, index: usize, row: Vec<String>) {
    if rows.len() <= index {
        rows.resize(index + 1, Vec::new());
    }
    rows[index] = row;
}

/// In-memory spreadsheet for tests and local runs.
///
/// Holds any number of worksheets keyed by spreadsheet id and worksheet name. Rows are
/// stored as plain text, header row included.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a worksheet with the given rows.
    pub async fn insert_sheet(
        &self,
        spreadsheet_id: &str,
        worksheet_name: &str,
        sheet_id: i64,
        rows: Vec<Vec<String>>,
    ) {
        let mut inner = self.inner.lock().await;
        inner.sheets.insert(
            (spreadsheet_id.to_owned(), worksheet_name.to_owned()),
            MemorySheet { sheet_id, rows },
        );
    }

    /// Returns a copy of the worksheet rows, header included.
    pub async fn rows(&self, spreadsheet_id: &str, worksheet_name: &str) -> Vec<Vec<String>> {
        let inner = self.inner.lock().await;
        inner
            .sheets
            .get(&(spreadsheet_id.to_owned(), worksheet_name.to_owned()))
            .map(|sheet| sheet.rows.clone())
            .unwrap_or_default()
    }

    /// Serves `allowed` more writes, then fails every write after them.
    pub async fn fail_writes_after(&self, allowed: usize) {
        let mut inner = self.inner.lock().await;
        inner.failing_writes_after = Some(inner.writes + allowed);
    }

    /// Number of write requests served, deletions included.
    pub async fn writes(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.writes
    }

    /// Row indices of every deletion batch, in the order they were applied.
    pub async fn deleted_batches(&self) -> Vec<Vec<usize>> {
        let inner = self.inner.lock().await;
        inner.deleted_batches.clone()
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn read_header(&self, coordinates: &SheetCoordinates) -> SyncResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let sheet = inner.sheet(coordinates)?;
        Ok(sheet.rows.first().cloned().unwrap_or_default())
    }

    async fn read_rows(&self, coordinates: &SheetCoordinates) -> SyncResult<Vec<Vec<String>>> {
        let inner = self.inner.lock().await;
        let sheet = inner.sheet(coordinates)?;
        Ok(sheet.rows.clone())
    }

    async fn append_row(&self, coordinates: &SheetCoordinates, row: Vec<String>) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let sheet = inner.sheet_for_write(coordinates)?;

        // Appends land after the last non-empty row.
        while sheet.rows.last().is_some_and(|last| last.iter().all(String::is_empty)) {
            sheet.rows.pop();
        }
        sheet.rows.push(row);

        Ok(())
    }

    async fn update_row(
        &self,
        coordinates: &SheetCoordinates,
        row_index: usize,
        row: Vec<String>,
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let sheet = inner.sheet_for_write(coordinates)?;
        place_row(&mut sheet.rows, row_index, row);

        Ok(())
    }

    async fn write_rows(
        &self,
        coordinates: &SheetCoordinates,
        start_index: usize,
        rows: Vec<Vec<String>>,
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let sheet = inner.sheet_for_write(coordinates)?;

        info!("writing a batch of {} rows", rows.len());

        for (offset, row) in rows.into_iter().enumerate() {
            place_row(&mut sheet.rows, start_index + offset, row);
        }

        Ok(())
    }

    async fn resolve_sheet_id(&self, coordinates: &SheetCoordinates) -> SyncResult<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.sheet(coordinates)?.sheet_id)
    }

    async fn delete_rows(
        &self,
        coordinates: &SheetCoordinates,
        sheet_id: i64,
        row_indices: &[usize],
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let sheet = inner.sheet_for_write(coordinates)?;

        if sheet.sheet_id != sheet_id {
            bail!(
                ErrorKind::WorksheetNotFound,
                "Worksheet id does not match",
                format!("expected {}, got {sheet_id}", sheet.sheet_id)
            );
        }

        for &index in row_indices {
            if index < sheet.rows.len() {
                sheet.rows.remove(index);
            }
        }
        inner.deleted_batches.push(row_indices.to_vec());

        Ok(())
    }
}
