use std::time::Duration;

use dealsync_config::shared::DestinationApiConfig;
use reqwest::{RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::bail;
use crate::destination::{Destination, SheetCoordinates};
use crate::error::{Endpoint, ErrorKind, SyncResult, http_error};

/// Value input mode for every write, so dates and numbers are parsed as if typed by a user.
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

/// Returns the A1 column letters for a zero-based column index (`0` is `A`, `26` is `AA`).
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index + 1;

    while remaining > 0 {
        let offset = (remaining - 1) % 26;
        letters.push(b'A' + offset as u8);
        remaining = (remaining - 1) / 26;
    }

    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Quotes a worksheet name for use in an A1 range, doubling embedded quotes.
pub fn quote_sheet_name(worksheet_name: &str) -> String {
    format!("'{}'", worksheet_name.replace('\'', "''"))
}

/// Builds the A1 range covering one row from column `A` up to `width` columns.
pub fn row_range(worksheet_name: &str, row_index: usize, width: usize) -> String {
    let row_number = row_index + 1;
    format!(
        "{}!A{row_number}:{}{row_number}",
        quote_sheet_name(worksheet_name),
        column_letter(width.max(1) - 1)
    )
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateValuesBody<'a> {
    value_input_option: &'static str,
    data: Vec<ValueRangeBody<'a>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DimensionRange {
    sheet_id: i64,
    dimension: &'static str,
    start_index: usize,
    end_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteDimensionRequest {
    delete_dimension: DeleteDimension,
}

#[derive(Debug, Serialize)]
struct DeleteDimension {
    range: DimensionRange,
}

#[derive(Debug, Serialize)]
struct BatchUpdateBody {
    requests: Vec<DeleteDimensionRequest>,
}

/// Renders a cell the way the sheet displays it when read back as a formatted value.
fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Google Sheets v4 client.
#[derive(Debug, Clone)]
pub struct GoogleSheetsDestination {
    client: reqwest::Client,
    base_url: Url,
    access_token: SecretString,
}

impl GoogleSheetsDestination {
    pub fn new(config: &DestinationApiConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| {
                http_error(Endpoint::Destination, "Failed to build spreadsheet client", err)
            })?;

        Self::with_client(client, &config.api_base_url, config.access_token.clone())
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        access_token: SecretString,
    ) -> SyncResult<Self> {
        let Ok(base_url) = Url::parse(base_url) else {
            bail!(
                ErrorKind::ConfigError,
                "Invalid spreadsheet API base url",
                base_url.to_owned()
            );
        };

        Ok(Self {
            client,
            base_url,
            access_token,
        })
    }

    /// Builds `{base}/v4/spreadsheets/{spreadsheet_id}/...`, percent-encoding each segment.
    fn url(&self, spreadsheet_id: &str, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty()
                    .extend(["v4", "spreadsheets", spreadsheet_id])
                    .extend(segments);
            }
            Err(()) => bail!(
                ErrorKind::ConfigError,
                "Spreadsheet API base url cannot carry a path",
                self.base_url.to_string()
            ),
        }
        Ok(url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        description: &'static str,
    ) -> SyncResult<reqwest::Response> {
        request
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| http_error(Endpoint::Destination, description, err))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        description: &'static str,
    ) -> SyncResult<T> {
        self.send(request, description)
            .await?
            .json::<T>()
            .await
            .map_err(|err| http_error(Endpoint::Destination, description, err))
    }

    async fn get_values(
        &self,
        coordinates: &SheetCoordinates,
        range: &str,
        description: &'static str,
    ) -> SyncResult<Vec<Vec<String>>> {
        let url = self.url(&coordinates.spreadsheet_id, &["values", range])?;
        let value_range: ValueRange = self.send_json(self.client.get(url), description).await?;

        Ok(value_range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

impl Destination for GoogleSheetsDestination {
    fn name() -> &'static str {
        "google_sheets"
    }

    async fn read_header(&self, coordinates: &SheetCoordinates) -> SyncResult<Vec<String>> {
        let range = format!("{}!1:1", quote_sheet_name(&coordinates.worksheet_name));
        let rows = self
            .get_values(coordinates, &range, "Header read failed")
            .await?;

        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn read_rows(&self, coordinates: &SheetCoordinates) -> SyncResult<Vec<Vec<String>>> {
        let range = quote_sheet_name(&coordinates.worksheet_name);
        let rows = self.get_values(coordinates, &range, "Table read failed").await?;

        debug!(rows = rows.len(), worksheet = %coordinates.worksheet_name, "read worksheet");

        Ok(rows)
    }

    async fn append_row(&self, coordinates: &SheetCoordinates, row: Vec<String>) -> SyncResult<()> {
        let range = format!("{}!A1", quote_sheet_name(&coordinates.worksheet_name));
        let append_segment = format!("{range}:append");
        let url = self.url(
            &coordinates.spreadsheet_id,
            &["values", append_segment.as_str()],
        )?;
        let body = ValueRangeBody {
            range: &range,
            major_dimension: "ROWS",
            values: vec![row],
        };

        let request = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", VALUE_INPUT_OPTION),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&body);
        self.send(request, "Row append failed").await?;

        Ok(())
    }

    async fn update_row(
        &self,
        coordinates: &SheetCoordinates,
        row_index: usize,
        row: Vec<String>,
    ) -> SyncResult<()> {
        let range = row_range(&coordinates.worksheet_name, row_index, row.len());
        let url = self.url(&coordinates.spreadsheet_id, &["values", range.as_str()])?;
        let body = ValueRangeBody {
            range: &range,
            major_dimension: "ROWS",
            values: vec![row],
        };

        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .json(&body);
        self.send(request, "Row update failed").await?;

        Ok(())
    }

    async fn write_rows(
        &self,
        coordinates: &SheetCoordinates,
        start_index: usize,
        rows: Vec<Vec<String>>,
    ) -> SyncResult<()> {
        let range = format!(
            "{}!A{}",
            quote_sheet_name(&coordinates.worksheet_name),
            start_index + 1
        );
        let url = self.url(&coordinates.spreadsheet_id, &[])?;
        let url = with_method_suffix(url, "values:batchUpdate")?;
        let body = BatchUpdateValuesBody {
            value_input_option: VALUE_INPUT_OPTION,
            data: vec![ValueRangeBody {
                range: &range,
                major_dimension: "ROWS",
                values: rows,
            }],
        };

        self.send(self.client.post(url).json(&body), "Batch write failed")
            .await?;

        Ok(())
    }

    async fn resolve_sheet_id(&self, coordinates: &SheetCoordinates) -> SyncResult<i64> {
        let url = self.url(&coordinates.spreadsheet_id, &[])?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "sheets(properties(sheetId,title))")]);
        let metadata: SpreadsheetMetadata = self
            .send_json(request, "Spreadsheet metadata read failed")
            .await?;

        match metadata
            .sheets
            .into_iter()
            .find(|sheet| sheet.properties.title == coordinates.worksheet_name)
        {
            Some(sheet) => Ok(sheet.properties.sheet_id),
            None => bail!(
                ErrorKind::WorksheetNotFound,
                "Worksheet not found",
                coordinates.worksheet_name.clone()
            ),
        }
    }

    async fn delete_rows(
        &self,
        coordinates: &SheetCoordinates,
        sheet_id: i64,
        row_indices: &[usize],
    ) -> SyncResult<()> {
        let url = with_method_suffix(self.url(&coordinates.spreadsheet_id, &[])?, ":batchUpdate")?;
        let body = BatchUpdateBody {
            requests: row_indices
                .iter()
                .map(|&index| DeleteDimensionRequest {
                    delete_dimension: DeleteDimension {
                        range: DimensionRange {
                            sheet_id,
                            dimension: "ROWS",
                            start_index: index,
                            end_index: index + 1,
                        },
                    },
                })
                .collect(),
        };

        self.send(self.client.post(url).json(&body), "Row deletion failed")
            .await?;

        Ok(())
    }
}

/// Appends a custom method to the last path segment (`.../{id}:batchUpdate`) or adds it as a
/// new segment when it does not start with `:`.
fn with_method_suffix(mut url: Url, suffix: &str) -> SyncResult<Url> {
    let Some(last) = url
        .path_segments()
        .and_then(|segments| segments.last())
        .map(str::to_owned)
    else {
        bail!(ErrorKind::ConfigError, "Spreadsheet url has no path", url.to_string());
    };

    match url.path_segments_mut() {
        Ok(mut path) => {
            if let Some(method) = suffix.strip_prefix(':') {
                path.pop().push(&format!("{last}:{method}"));
            } else {
                path.push(suffix);
            }
        }
        Err(()) => bail!(ErrorKind::ConfigError, "Spreadsheet url has no path"),
    }

    Ok(url)
}
