use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dealsync_config::shared::ObjectKind;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::source::Source;
use crate::types::{
    AssociatedRecord, Owner, Pipeline, Properties, PropertyDefinition, SourceRecord,
};

#[derive(Debug, Clone)]
struct StoredDeal {
    record: SourceRecord,
    modified_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    deals: Vec<StoredDeal>,
    contacts: HashMap<String, AssociatedRecord>,
    associations: HashMap<String, Vec<String>>,
    archived: Vec<String>,
    properties: HashMap<ObjectKind, Vec<PropertyDefinition>>,
    pipelines: Vec<Pipeline>,
    owners: Vec<Owner>,
    failing_property_listings: HashSet<ObjectKind>,
    failing_deal_search: bool,
    failing_pipeline_listing: bool,
    failing_owner_listing: bool,
    failing_associations: HashSet<String>,
    failing_contact_reads: bool,
    failing_archived_listing: bool,
    batch_reads: Vec<Vec<String>>,
}

/// In-memory CRM for tests and local runs.
///
/// Reads behave like the real API: only requested properties are returned, searches filter
/// on the modification timestamp and failures can be injected per operation.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_properties(&self, object: ObjectKind, properties: Vec<PropertyDefinition>) {
        let mut inner = self.inner.lock().await;
        inner.properties.insert(object, properties);
    }

    pub async fn set_pipelines(&self, pipelines: Vec<Pipeline>) {
        let mut inner = self.inner.lock().await;
        inner.pipelines = pipelines;
    }

    pub async fn set_owners(&self, owners: Vec<Owner>) {
        let mut inner = self.inner.lock().await;
        inner.owners = owners;
    }

    /// Stores a deal, replacing any deal with the same id.
    pub async fn upsert_deal(&self, record: SourceRecord, modified_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        inner.deals.retain(|deal| deal.record.id != record.id);
        inner.deals.push(StoredDeal {
            record,
            modified_at,
        });
    }

    /// Moves a deal to the archive.
    pub async fn archive_deal(&self, deal_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.deals.retain(|deal| deal.record.id != deal_id);
        inner.archived.push(deal_id.to_owned());
    }

    pub async fn upsert_contact(&self, contact: AssociatedRecord) {
        let mut inner = self.inner.lock().await;
        inner.contacts.insert(contact.id.clone(), contact);
    }

    pub async fn associate(&self, deal_id: &str, contact_id: &str) {
        let mut inner = self.inner.lock().await;
        inner
            .associations
            .entry(deal_id.to_owned())
            .or_default()
            .push(contact_id.to_owned());
    }

    pub async fn fail_property_listing(&self, object: ObjectKind) {
        let mut inner = self.inner.lock().await;
        inner.failing_property_listings.insert(object);
    }

    /// Makes both the modified-since search and the full deal listing fail.
    pub async fn fail_deal_search(&self) {
        let mut inner = self.inner.lock().await;
        inner.failing_deal_search = true;
    }

    pub async fn fail_pipeline_listing(&self) {
        let mut inner = self.inner.lock().await;
        inner.failing_pipeline_listing = true;
    }

    pub async fn fail_owner_listing(&self) {
        let mut inner = self.inner.lock().await;
        inner.failing_owner_listing = true;
    }

    pub async fn fail_associations_for(&self, deal_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.failing_associations.insert(deal_id.to_owned());
    }

    pub async fn fail_contact_reads(&self) {
        let mut inner = self.inner.lock().await;
        inner.failing_contact_reads = true;
    }

    pub async fn fail_archived_listing(&self) {
        let mut inner = self.inner.lock().await;
        inner.failing_archived_listing = true;
    }

    /// Returns the id batches passed to [`Source::batch_read`], in call order.
    pub async fn batch_reads(&self) -> Vec<Vec<String>> {
        let inner = self.inner.lock().await;
        inner.batch_reads.clone()
    }
}

fn select_properties(properties: &Properties, requested: &[String]) -> Properties {
    requested
        .iter()
        .filter_map(|name| {
            properties
                .get(name)
                .map(|value| (name.clone(), value.clone()))
        })
        .collect()
}

fn project_deal(deal: &StoredDeal, requested: &[String]) -> SourceRecord {
    SourceRecord::new(
        deal.record.id.clone(),
        select_properties(&deal.record.properties, requested),
    )
}

impl Source for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn list_properties(&self, object: ObjectKind) -> SyncResult<Vec<PropertyDefinition>> {
        let inner = self.inner.lock().await;

        if inner.failing_property_listings.contains(&object) {
            bail!(
                ErrorKind::SourceRequestFailed,
                "Property listing failed",
                format!("injected failure for {object} properties")
            );
        }

        Ok(inner.properties.get(&object).cloned().unwrap_or_default())
    }

    async fn list_pipelines(&self) -> SyncResult<Vec<Pipeline>> {
        let inner = self.inner.lock().await;

        if inner.failing_pipeline_listing {
            bail!(ErrorKind::SourceRequestFailed, "Pipeline listing failed");
        }

        Ok(inner.pipelines.clone())
    }

    async fn list_owners(&self) -> SyncResult<Vec<Owner>> {
        let inner = self.inner.lock().await;

        if inner.failing_owner_listing {
            bail!(ErrorKind::SourceRequestFailed, "Owner listing failed");
        }

        Ok(inner.owners.clone())
    }

    async fn search_modified_since(
        &self,
        since: DateTime<Utc>,
        properties: &[String],
    ) -> SyncResult<Vec<SourceRecord>> {
        let inner = self.inner.lock().await;

        if inner.failing_deal_search {
            bail!(ErrorKind::SourceRequestFailed, "Deal search failed");
        }

        let records: Vec<_> = inner
            .deals
            .iter()
            .filter(|deal| deal.modified_at >= since)
            .map(|deal| project_deal(deal, properties))
            .collect();

        debug!(count = records.len(), %since, "memory search returned deals");

        Ok(records)
    }

    async fn list_all(&self, properties: &[String]) -> SyncResult<Vec<SourceRecord>> {
        let inner = self.inner.lock().await;

        if inner.failing_deal_search {
            bail!(ErrorKind::SourceRequestFailed, "Deal listing failed");
        }

        Ok(inner
            .deals
            .iter()
            .map(|deal| project_deal(deal, properties))
            .collect())
    }

    async fn list_associations(&self, deal_id: &str) -> SyncResult<Vec<String>> {
        let inner = self.inner.lock().await;

        if inner.failing_associations.contains(deal_id) {
            bail!(
                ErrorKind::SourceRequestFailed,
                "Association listing failed",
                format!("injected failure for deal {deal_id}")
            );
        }

        Ok(inner
            .associations
            .get(deal_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn batch_read(
        &self,
        object: ObjectKind,
        ids: &[String],
        properties: &[String],
    ) -> SyncResult<Vec<AssociatedRecord>> {
        let mut inner = self.inner.lock().await;
        inner.batch_reads.push(ids.to_vec());

        if object != ObjectKind::Contact || inner.failing_contact_reads {
            bail!(
                ErrorKind::SourceRequestFailed,
                "Batch read failed",
                format!("cannot read {object} records")
            );
        }

        Ok(ids
            .iter()
            .filter_map(|id| inner.contacts.get(id))
            .map(|contact| {
                AssociatedRecord::new(
                    contact.id.clone(),
                    select_properties(&contact.properties, properties),
                )
            })
            .collect())
    }

    async fn list_archived(&self) -> SyncResult<Vec<String>> {
        let inner = self.inner.lock().await;

        if inner.failing_archived_listing {
            bail!(ErrorKind::SourceRequestFailed, "Archived deal listing failed");
        }

        Ok(inner.archived.clone())
    }
}
