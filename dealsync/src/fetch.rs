//! Incremental deal fetching with association fan-out.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use dealsync_config::shared::{ObjectKind, SyncSettings};
use futures::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::source::Source;
use crate::types::{AssociatedRecord, SourceRecord};

/// Which deals a fetch covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    /// Deals last modified at or after the instant.
    Since(DateTime<Utc>),
    /// Every live deal.
    All,
}

impl FetchWindow {
    /// The trailing window for a cycle starting at `now`.
    pub fn trailing(now: DateTime<Utc>, lookback_minutes: u64) -> Self {
        let lookback = i64::try_from(lookback_minutes).unwrap_or(i64::MAX);
        let start = Duration::try_minutes(lookback)
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        FetchWindow::Since(start)
    }
}

/// Deals fetched for one cycle, with associations attached, and the contacts they reference.
#[derive(Debug, Clone, Default)]
pub struct FetchedRecords {
    pub records: Vec<SourceRecord>,
    pub contacts: HashMap<String, AssociatedRecord>,
}

/// Fetches deals in `window` together with their associated contacts.
///
/// The deal query is fatal on failure. Association lookups run concurrently, bounded by
/// `association_concurrency`, and a failed lookup leaves that deal without associations.
/// Contacts are read in batches of `batch_read_size` ids and a failed batch is skipped.
/// Associations are not looked up at all when `contact_properties` is empty.
pub async fn fetch_records<S: Source>(
    source: &S,
    window: FetchWindow,
    deal_properties: &[String],
    contact_properties: &[String],
    settings: &SyncSettings,
) -> SyncResult<FetchedRecords> {
    let mut records = match window {
        FetchWindow::Since(since) => source.search_modified_since(since, deal_properties).await?,
        FetchWindow::All => source.list_all(deal_properties).await?,
    };

    info!(count = records.len(), ?window, "fetched deals");

    if records.is_empty() || contact_properties.is_empty() {
        return Ok(FetchedRecords {
            records,
            contacts: HashMap::new(),
        });
    }

    let mut associations = fetch_associations(source, &records, settings).await;
    for record in &mut records {
        record.associations = associations.remove(&record.id).unwrap_or_default();
    }

    let contacts = fetch_contacts(source, &records, contact_properties, settings).await;

    Ok(FetchedRecords { records, contacts })
}

async fn fetch_associations<S: Source>(
    source: &S,
    records: &[SourceRecord],
    settings: &SyncSettings,
) -> HashMap<String, Vec<String>> {
    stream::iter(records)
        .map(|record| async move {
            let associations = match source.list_associations(&record.id).await {
                Ok(associations) => associations,
                Err(err) => {
                    warn!(deal_id = %record.id, error = %err, "association lookup failed, continuing without associations");
                    Vec::new()
                }
            };

            (record.id.clone(), associations)
        })
        .buffer_unordered(settings.association_concurrency.max(1))
        .collect()
        .await
}

async fn fetch_contacts<S: Source>(
    source: &S,
    records: &[SourceRecord],
    contact_properties: &[String],
    settings: &SyncSettings,
) -> HashMap<String, AssociatedRecord> {
    let mut seen = HashSet::new();
    let contact_ids: Vec<String> = records
        .iter()
        .flat_map(|record| record.associations.iter())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    let mut contacts = HashMap::with_capacity(contact_ids.len());

    for batch in contact_ids.chunks(settings.batch_read_size.max(1)) {
        match source
            .batch_read(ObjectKind::Contact, batch, contact_properties)
            .await
        {
            Ok(batch_contacts) => {
                debug!(requested = batch.len(), returned = batch_contacts.len(), "read contact batch");
                contacts.extend(
                    batch_contacts
                        .into_iter()
                        .map(|contact| (contact.id.clone(), contact)),
                );
            }
            Err(err) => {
                warn!(ids = batch.len(), error = %err, "contact batch read failed, skipping batch");
            }
        }
    }

    contacts
}
