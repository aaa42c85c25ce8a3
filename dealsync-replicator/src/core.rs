use std::time::Duration;

use chrono::Utc;
use dealsync::cycle::SyncMode;
use dealsync::destination::Destination;
use dealsync::error::SyncError;
use dealsync::service::{ClientRun, SyncService};
use dealsync::source::Source;
use dealsync_config::shared::{ClientConfig, ServiceConfig, SyncSettings};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::error::ReplicatorResult;

/// Starts the sync service with the provided configuration.
///
/// Builds the CRM and spreadsheet clients, then runs passes until SIGINT or SIGTERM is
/// received. A pass in flight when the signal arrives is completed first.
pub async fn start_service_with_config(service_config: ServiceConfig) -> ReplicatorResult<()> {
    info!("starting deal sync service");

    log_config(&service_config);

    let service = SyncService::from_config(&service_config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown_handle = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, stopping after the current pass");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, stopping after the current pass");
            }
        }

        if let Err(e) = shutdown_tx.send(()) {
            warn!(error = ?e, "failed to send shutdown signal");
        }
    });

    let result = run_passes(&service, shutdown_rx).await;

    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    result?;

    info!("deal sync service stopped");

    Ok(())
}

/// Runs an optional full pass, then an incremental pass every interval until shutdown.
///
/// Passes run inline in the loop, so two passes never overlap and a tick missed during a
/// slow pass is delayed rather than burst. Fails only when every client failed the full
/// pass; failures in incremental passes are logged and retried on the next tick.
pub async fn run_passes<S, D>(
    service: &SyncService<S, D>,
    mut shutdown_rx: watch::Receiver<()>,
) -> ReplicatorResult<()>
where
    S: Source,
    D: Destination,
{
    let settings = service.settings();
    let mut ticker = interval(Duration::from_secs(settings.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if settings.full_sync_on_start {
        let runs = service.run_pass(SyncMode::Full, Utc::now()).await;
        log_runs(&runs);
        if let Some(err) = all_failed(runs) {
            return Err(err.into());
        }
        ticker.reset();
    }

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!("shutdown requested, leaving the sync loop");
                break;
            }
            _ = ticker.tick() => {
                let runs = service.run_pass(SyncMode::Incremental, Utc::now()).await;
                log_runs(&runs);
            }
        }
    }

    Ok(())
}

/// Aggregates the errors of a pass in which no client succeeded.
fn all_failed(runs: Vec<ClientRun>) -> Option<SyncError> {
    if runs.is_empty() || runs.iter().any(|run| run.result.is_ok()) {
        return None;
    }

    let errors: Vec<SyncError> = runs.into_iter().filter_map(|run| run.result.err()).collect();

    Some(errors.into())
}

fn log_runs(runs: &[ClientRun]) {
    for run in runs {
        if let Ok(report) = &run.result {
            debug!(
                client = %run.client_name,
                fetched = report.fetched,
                inserted = report.inserted,
                updated = report.updated,
                unchanged = report.unchanged,
                deleted = report.deletion.deleted_count,
                "client pass result"
            );

            if let Some(error) = &report.deletion.error {
                warn!(client = %run.client_name, error, "row deletion did not complete");
            }
        }
    }
}

fn log_config(config: &ServiceConfig) {
    debug!(
        clients = config.clients.len(),
        log_format = ?config.log_format,
        source_api = config.source.api_base_url,
        destination_api = config.destination.api_base_url,
        "service config"
    );
    log_sync_settings(&config.sync);
    for client in &config.clients {
        log_client_config(client, config);
    }
}

fn log_sync_settings(settings: &SyncSettings) {
    debug!(
        interval_secs = settings.interval_secs,
        lookback_minutes = settings.lookback_minutes,
        association_concurrency = settings.association_concurrency,
        batch_read_size = settings.batch_read_size,
        page_size = settings.page_size,
        full_sync_on_start = settings.full_sync_on_start,
        "sync settings"
    );
}

fn log_client_config(client: &ClientConfig, config: &ServiceConfig) {
    debug!(
        client = client.client_name,
        key = %client.client_key(),
        spreadsheet_id = client.spreadsheet_id,
        worksheet_name = client.worksheet_name,
        sheet_id = ?client.sheet_id,
        mapped_fields = config.field_settings_for(client).len(),
        "client config"
    );
}
