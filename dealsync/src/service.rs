//! Multi-client sync passes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dealsync_config::shared::{
    ClientConfig, ClientFieldSettings, ServiceConfig, SyncSettings, TransformRules,
};
use futures::future::join_all;
use tracing::{error, info};

use crate::cycle::{CycleContext, CycleReport, SyncMode, run_cycle};
use crate::destination::Destination;
use crate::destination::sheets::GoogleSheetsDestination;
use crate::error::{Endpoint, SyncResult, http_error};
use crate::header::HeaderResolver;
use crate::source::Source;
use crate::source::hubspot::HubSpotSource;

/// A client together with its mapping and the source authenticated for it.
#[derive(Debug, Clone)]
pub struct ClientSync<S> {
    pub client: ClientConfig,
    pub mapping: ClientFieldSettings,
    pub source: S,
}

/// Result of one client's cycle within a pass.
#[derive(Debug)]
pub struct ClientRun {
    pub client_name: String,
    pub result: SyncResult<CycleReport>,
}

/// Runs every client's cycle concurrently. A failing client never affects the others.
pub struct SyncService<S, D> {
    clients: Vec<ClientSync<S>>,
    destination: D,
    settings: SyncSettings,
    rules: TransformRules,
    resolver: HeaderResolver,
}

impl<S, D> SyncService<S, D>
where
    S: Source,
    D: Destination,
{
    pub fn new(
        clients: Vec<ClientSync<S>>,
        destination: D,
        settings: SyncSettings,
        rules: TransformRules,
    ) -> Self {
        Self {
            clients,
            destination,
            settings,
            rules,
            resolver: HeaderResolver::default(),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Runs one cycle per client and returns the results in client order.
    pub async fn run_pass(&self, mode: SyncMode, now: DateTime<Utc>) -> Vec<ClientRun> {
        info!(%mode, clients = self.clients.len(), "starting sync pass");

        let cycles = self.clients.iter().map(|client| async move {
            let ctx = CycleContext {
                client: &client.client,
                mapping: &client.mapping,
                settings: &self.settings,
                rules: &self.rules,
                resolver: &self.resolver,
                source: &client.source,
                destination: &self.destination,
            };

            let result = run_cycle(&ctx, mode, now).await;
            if let Err(err) = &result {
                error!(client = %client.client.client_name, error = %err, "sync cycle failed");
            }

            ClientRun {
                client_name: client.client.client_name.clone(),
                result,
            }
        });

        let runs = join_all(cycles).await;
        let failed = runs.iter().filter(|run| run.result.is_err()).count();

        info!(%mode, succeeded = runs.len() - failed, failed, "sync pass finished");

        runs
    }
}

impl SyncService<HubSpotSource, GoogleSheetsDestination> {
    /// Builds HTTP clients for every configured client, sharing one connection pool.
    pub fn from_config(config: &ServiceConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.source.timeout_secs))
            .build()
            .map_err(|err| http_error(Endpoint::Source, "Failed to build CRM client", err))?;

        let clients = config
            .clients
            .iter()
            .map(|client| {
                let source = HubSpotSource::with_client(
                    http.clone(),
                    &config.source.api_base_url,
                    client.source_access_token.clone(),
                    config.sync.page_size,
                )?;

                Ok(ClientSync {
                    client: client.clone(),
                    mapping: config.field_settings_for(client),
                    source,
                })
            })
            .collect::<SyncResult<Vec<_>>>()?;

        let destination = GoogleSheetsDestination::new(&config.destination)?;

        Ok(Self::new(
            clients,
            destination,
            config.sync.clone(),
            config.rules.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::memory::MemoryDestination;
    use crate::error::ErrorKind;
    use crate::source::memory::MemorySource;
    use dealsync_config::shared::ObjectKind;
    use secrecy::SecretString;

    use crate::types::PropertyDefinition;

    fn client(name: &str, spreadsheet_id: &str) -> ClientConfig {
        ClientConfig {
            client_name: name.to_owned(),
            spreadsheet_id: spreadsheet_id.to_owned(),
            worksheet_name: "Clean".to_owned(),
            source_access_token: SecretString::new("token".to_owned()),
            sheet_id: None,
        }
    }

    fn headers() -> Vec<String> {
        [
            "Deal Id",
            "Amount",
            "Contract Type",
            "Deal Owner",
            "Won Date",
            "Estimate Date",
            "Create Date",
        ]
        .iter()
        .map(|header| (*header).to_owned())
        .collect()
    }

    #[tokio::test]
    async fn failing_clients_do_not_affect_others() {
        let source = MemorySource::new();
        source
            .set_properties(
                ObjectKind::Deal,
                vec![PropertyDefinition::new("amount", "dealinformation")],
            )
            .await;
        let destination = MemoryDestination::new();
        destination
            .insert_sheet("good", "Clean", 0, vec![headers()])
            .await;

        let mapping: ClientFieldSettings =
            serde_json::from_value(serde_json::json!({ "amount": ["amount"] })).unwrap();
        let service = SyncService::new(
            vec![
                ClientSync {
                    client: client("Broken", ""),
                    mapping: mapping.clone(),
                    source: source.clone(),
                },
                ClientSync {
                    client: client("Good", "good"),
                    mapping,
                    source,
                },
            ],
            destination,
            SyncSettings::default(),
            TransformRules::default(),
        );

        let runs = service.run_pass(SyncMode::Incremental, Utc::now()).await;

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].client_name, "Broken");
        assert_eq!(
            runs[0].result.as_ref().unwrap_err().kind(),
            ErrorKind::MissingDestinationCoordinates
        );
        assert_eq!(runs[1].client_name, "Good");
        assert!(runs[1].result.is_ok());
    }
}
