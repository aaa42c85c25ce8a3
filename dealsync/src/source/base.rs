use std::future::Future;

use chrono::{DateTime, Utc};
use dealsync_config::shared::ObjectKind;

use crate::error::SyncResult;
use crate::types::{AssociatedRecord, Owner, Pipeline, PropertyDefinition, SourceRecord};

/// Trait for CRM systems that deals are read from.
///
/// Listing operations return every page: implementations follow the paging cursor until
/// none is returned. Records come back without associations; those are looked up separately
/// with [`Source::list_associations`].
pub trait Source {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Lists the properties defined for `object`.
    fn list_properties(
        &self,
        object: ObjectKind,
    ) -> impl Future<Output = SyncResult<Vec<PropertyDefinition>>> + Send;

    /// Lists deal pipelines together with their stages.
    fn list_pipelines(&self) -> impl Future<Output = SyncResult<Vec<Pipeline>>> + Send;

    fn list_owners(&self) -> impl Future<Output = SyncResult<Vec<Owner>>> + Send;

    /// Returns every deal whose last modification is at or after `since`.
    fn search_modified_since(
        &self,
        since: DateTime<Utc>,
        properties: &[String],
    ) -> impl Future<Output = SyncResult<Vec<SourceRecord>>> + Send;

    /// Returns every live deal.
    fn list_all(
        &self,
        properties: &[String],
    ) -> impl Future<Output = SyncResult<Vec<SourceRecord>>> + Send;

    /// Returns the ids of the contacts associated with a deal.
    fn list_associations(
        &self,
        deal_id: &str,
    ) -> impl Future<Output = SyncResult<Vec<String>>> + Send;

    /// Reads up to one batch of `object` records by id.
    fn batch_read(
        &self,
        object: ObjectKind,
        ids: &[String],
        properties: &[String],
    ) -> impl Future<Output = SyncResult<Vec<AssociatedRecord>>> + Send;

    /// Returns the ids of every archived deal.
    fn list_archived(&self) -> impl Future<Output = SyncResult<Vec<String>>> + Send;
}
