use std::time::Duration;

use chrono::{DateTime, Utc};
use dealsync_config::shared::{ObjectKind, SourceApiConfig};
use reqwest::{RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bail;
use crate::error::{Endpoint, ErrorKind, SyncResult, http_error};
use crate::source::Source;
use crate::types::{AssociatedRecord, Owner, Pipeline, Properties, PropertyDefinition, SourceRecord};

/// Property the change window filters on.
pub const LAST_MODIFIED_PROPERTY: &str = "hs_lastmodifieddate";

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    paging: Option<Paging>,
}

impl<T> Page<T> {
    fn next_after(&self) -> Option<String> {
        self.paging
            .as_ref()
            .and_then(|paging| paging.next.as_ref())
            .map(|next| next.after.clone())
    }
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    after: String,
}

#[derive(Debug, Deserialize)]
struct ObjectResult {
    id: String,
    #[serde(default)]
    properties: Properties,
}

/// Ids come back as numbers from the v4 associations API and as strings elsewhere.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ObjectId {
    Number(u64),
    Text(String),
}

impl ObjectId {
    fn into_string(self) -> String {
        match self {
            ObjectId::Number(id) => id.to_string(),
            ObjectId::Text(id) => id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssociationResult {
    to_object_id: ObjectId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchFilter<'a> {
    property_name: &'a str,
    operator: &'a str,
    value: String,
}

#[derive(Debug, Serialize)]
struct SearchFilterGroup<'a> {
    filters: Vec<SearchFilter<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    filter_groups: Vec<SearchFilterGroup<'a>>,
    properties: &'a [String],
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchReadInput<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchReadRequest<'a> {
    inputs: Vec<BatchReadInput<'a>>,
    properties: &'a [String],
}

/// HubSpot CRM client authenticated with one client's private app token.
#[derive(Debug, Clone)]
pub struct HubSpotSource {
    client: reqwest::Client,
    base_url: Url,
    access_token: SecretString,
    page_size: usize,
}

impl HubSpotSource {
    /// Builds a client with its own connection pool.
    pub fn new(
        config: &SourceApiConfig,
        access_token: SecretString,
        page_size: usize,
    ) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| http_error(Endpoint::Source, "Failed to build CRM client", err))?;

        Self::with_client(client, &config.api_base_url, access_token, page_size)
    }

    /// Builds a client sharing an existing connection pool.
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        access_token: SecretString,
        page_size: usize,
    ) -> SyncResult<Self> {
        let Ok(base_url) = Url::parse(base_url) else {
            bail!(
                ErrorKind::ConfigError,
                "Invalid CRM API base url",
                base_url.to_owned()
            );
        };

        Ok(Self {
            client,
            base_url,
            access_token,
            page_size,
        })
    }

    fn url(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            }
            Err(()) => bail!(
                ErrorKind::ConfigError,
                "CRM API base url cannot carry a path",
                self.base_url.to_string()
            ),
        }
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        description: &'static str,
    ) -> SyncResult<T> {
        let response = request
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| http_error(Endpoint::Source, description, err))?;

        response
            .json::<T>()
            .await
            .map_err(|err| http_error(Endpoint::Source, description, err))
    }

    /// Follows the `after` cursor of a GET listing until no further page is returned.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: Url,
        extra_query: &[(&str, String)],
        description: &'static str,
    ) -> SyncResult<Vec<T>> {
        let mut results = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(url.clone())
                .query(&[("limit", self.page_size.to_string())])
                .query(extra_query);
            if let Some(cursor) = &after {
                request = request.query(&[("after", cursor)]);
            }

            let page: Page<T> = self.send(request, description).await?;
            after = page.next_after();
            results.extend(page.results);

            if after.is_none() {
                break;
            }
        }

        Ok(results)
    }
}

fn into_record(result: ObjectResult) -> SourceRecord {
    SourceRecord::new(result.id, result.properties)
}

impl Source for HubSpotSource {
    fn name() -> &'static str {
        "hubspot"
    }

    async fn list_properties(&self, object: ObjectKind) -> SyncResult<Vec<PropertyDefinition>> {
        let url = self.url(&["crm", "v3", "properties", object.api_name()])?;
        let page: Page<PropertyDefinition> = self
            .send(self.client.get(url), "Property listing failed")
            .await?;

        debug!(object = %object, count = page.results.len(), "listed crm properties");

        Ok(page.results)
    }

    async fn list_pipelines(&self) -> SyncResult<Vec<Pipeline>> {
        let url = self.url(&["crm", "v3", "pipelines", "deals"])?;
        let page: Page<Pipeline> = self
            .send(self.client.get(url), "Pipeline listing failed")
            .await?;

        Ok(page.results)
    }

    async fn list_owners(&self) -> SyncResult<Vec<Owner>> {
        let url = self.url(&["crm", "v3", "owners"])?;
        self.get_all_pages(url, &[], "Owner listing failed").await
    }

    async fn search_modified_since(
        &self,
        since: DateTime<Utc>,
        properties: &[String],
    ) -> SyncResult<Vec<SourceRecord>> {
        let url = self.url(&["crm", "v3", "objects", "deals", "search"])?;
        let mut records = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let body = SearchRequest {
                filter_groups: vec![SearchFilterGroup {
                    filters: vec![SearchFilter {
                        property_name: LAST_MODIFIED_PROPERTY,
                        operator: "GTE",
                        value: since.timestamp_millis().to_string(),
                    }],
                }],
                properties,
                limit: self.page_size,
                after: after.take(),
            };

            let page: Page<ObjectResult> = self
                .send(self.client.post(url.clone()).json(&body), "Deal search failed")
                .await?;

            after = page.next_after();
            records.extend(page.results.into_iter().map(into_record));

            if after.is_none() {
                break;
            }
        }

        debug!(count = records.len(), %since, "searched modified deals");

        Ok(records)
    }

    async fn list_all(&self, properties: &[String]) -> SyncResult<Vec<SourceRecord>> {
        let url = self.url(&["crm", "v3", "objects", "deals"])?;
        let results: Vec<ObjectResult> = self
            .get_all_pages(
                url,
                &[("properties", properties.join(","))],
                "Deal listing failed",
            )
            .await?;

        Ok(results.into_iter().map(into_record).collect())
    }

    async fn list_associations(&self, deal_id: &str) -> SyncResult<Vec<String>> {
        let url = self.url(&["crm", "v4", "objects", "deals", deal_id, "associations", "contacts"])?;
        let results: Vec<AssociationResult> = self
            .get_all_pages(url, &[], "Association listing failed")
            .await?;

        Ok(results
            .into_iter()
            .map(|association| association.to_object_id.into_string())
            .collect())
    }

    async fn batch_read(
        &self,
        object: ObjectKind,
        ids: &[String],
        properties: &[String],
    ) -> SyncResult<Vec<AssociatedRecord>> {
        let url = self.url(&["crm", "v3", "objects", object.api_name(), "batch", "read"])?;
        let body = BatchReadRequest {
            inputs: ids.iter().map(|id| BatchReadInput { id }).collect(),
            properties,
        };

        let page: Page<ObjectResult> = self
            .send(self.client.post(url).json(&body), "Batch read failed")
            .await?;

        Ok(page
            .results
            .into_iter()
            .map(|result| AssociatedRecord::new(result.id, result.properties))
            .collect())
    }

    async fn list_archived(&self) -> SyncResult<Vec<String>> {
        let url = self.url(&["crm", "v3", "objects", "deals"])?;
        let results: Vec<ObjectResult> = self
            .get_all_pages(
                url,
                &[("archived", "true".to_owned())],
                "Archived deal listing failed",
            )
            .await?;

        Ok(results.into_iter().map(|result| result.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base_url: &str) -> HubSpotSource {
        HubSpotSource::with_client(
            reqwest::Client::new(),
            base_url,
            SecretString::new("pat".to_owned()),
            100,
        )
        .unwrap()
    }

    #[test]
    fn urls_append_to_the_base_path() {
        let url = source("https://api.hubapi.com")
            .url(&["crm", "v3", "properties", "deals"])
            .unwrap();
        assert_eq!(url.as_str(), "https://api.hubapi.com/crm/v3/properties/deals");

        let url = source("http://127.0.0.1:9000/proxy/")
            .url(&["crm", "v3", "owners"])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/crm/v3/owners");
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = HubSpotSource::with_client(
            reqwest::Client::new(),
            "not a url",
            SecretString::new("pat".to_owned()),
            100,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn search_request_uses_inclusive_window() {
        let properties = vec!["amount".to_owned()];
        let body = SearchRequest {
            filter_groups: vec![SearchFilterGroup {
                filters: vec![SearchFilter {
                    property_name: LAST_MODIFIED_PROPERTY,
                    operator: "GTE",
                    value: "1714521600000".to_owned(),
                }],
            }],
            properties: &properties,
            limit: 100,
            after: None,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "filterGroups": [{
                    "filters": [{
                        "propertyName": "hs_lastmodifieddate",
                        "operator": "GTE",
                        "value": "1714521600000"
                    }]
                }],
                "properties": ["amount"],
                "limit": 100
            })
        );
    }
}
