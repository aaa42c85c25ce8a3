use std::future::Future;

use dealsync_config::shared::ClientConfig;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};

/// Location of one client's worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetCoordinates {
    pub spreadsheet_id: String,
    pub worksheet_name: String,
    /// Numeric worksheet id, needed for row deletion.
    pub sheet_id: Option<i64>,
}

impl SheetCoordinates {
    pub fn new(spreadsheet_id: impl Into<String>, worksheet_name: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            worksheet_name: worksheet_name.into(),
            sheet_id: None,
        }
    }

    pub fn from_client(client: &ClientConfig) -> Self {
        Self {
            spreadsheet_id: client.spreadsheet_id.clone(),
            worksheet_name: client.worksheet_name.clone(),
            sheet_id: client.sheet_id,
        }
    }

    /// Fails when the spreadsheet id or worksheet name is blank.
    pub fn ensure_complete(&self, client_name: &str) -> SyncResult<()> {
        let mut missing = Vec::new();
        if self.spreadsheet_id.trim().is_empty() {
            missing.push("spreadsheet id");
        }
        if self.worksheet_name.trim().is_empty() {
            missing.push("worksheet name");
        }

        if !missing.is_empty() {
            bail!(
                ErrorKind::MissingDestinationCoordinates,
                "Destination coordinates are missing",
                format!("client `{client_name}` has no {}", missing.join(" or "))
            );
        }

        Ok(())
    }
}

/// Trait for row-oriented tables that projected rows are written to.
///
/// Row indices are zero-based positions in the table as returned by
/// [`Destination::read_rows`], so index 0 is the header row and index `n` is sheet row `n + 1`.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Reads the first row of the worksheet. An empty worksheet yields no headers.
    fn read_header(
        &self,
        coordinates: &SheetCoordinates,
    ) -> impl Future<Output = SyncResult<Vec<String>>> + Send;

    /// Reads the whole worksheet, header row included. Rows may be ragged.
    fn read_rows(
        &self,
        coordinates: &SheetCoordinates,
    ) -> impl Future<Output = SyncResult<Vec<Vec<String>>>> + Send;

    /// Appends a row after the last non-empty row.
    fn append_row(
        &self,
        coordinates: &SheetCoordinates,
        row: Vec<String>,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Overwrites the row at `row_index`, starting at the first column.
    fn update_row(
        &self,
        coordinates: &SheetCoordinates,
        row_index: usize,
        row: Vec<String>,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Writes consecutive rows starting at `start_index` in a single request.
    fn write_rows(
        &self,
        coordinates: &SheetCoordinates,
        start_index: usize,
        rows: Vec<Vec<String>>,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Resolves the numeric id of the worksheet from its name.
    fn resolve_sheet_id(
        &self,
        coordinates: &SheetCoordinates,
    ) -> impl Future<Output = SyncResult<i64>> + Send;

    /// Deletes rows in one batch, processing `row_indices` in the given order.
    ///
    /// Callers pass indices in descending order so that each deletion leaves the indices
    /// still pending untouched.
    fn delete_rows(
        &self,
        coordinates: &SheetCoordinates,
        sheet_id: i64,
        row_indices: &[usize],
    ) -> impl Future<Output = SyncResult<()>> + Send;
}
