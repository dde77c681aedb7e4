//! Trimstream purge runner.

#![forbid(unsafe_code)]

mod config;

use std::sync::Arc;

use trimstream_application::PurgeService;
use trimstream_core::{AppError, AppResult};
use trimstream_infrastructure::HttpClusterClient;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::PurgerConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = PurgerConfig::load()?;
    let purge_service = build_purge_service(&config)?;

    info!(
        coordinator_url = %config.coordinator_url,
        table = %config.invocation.table_name,
        stream = %config.invocation.stream_name,
        run_once = config.run_once,
        repeat_interval_ms = u64::try_from(config.repeat_interval.as_millis()).unwrap_or(u64::MAX),
        "trimstream-purger started"
    );

    loop {
        let outcome = run_purge(&purge_service, &config).await;

        if config.run_once {
            return outcome;
        }

        tokio::time::sleep(config.repeat_interval).await;
    }
}

fn build_purge_service(config: &PurgerConfig) -> AppResult<PurgeService> {
    // No request timeout: the round wait ceiling alone bounds a chunk call.
    let http_client = reqwest::Client::builder()
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let cluster_client = Arc::new(HttpClusterClient::new(
        http_client,
        config.coordinator_url.as_str(),
    ));

    Ok(
        PurgeService::new(cluster_client.clone(), cluster_client)
            .with_round_wait_ceiling(config.round_wait_ceiling),
    )
}

async fn run_purge(purge_service: &PurgeService, config: &PurgerConfig) -> AppResult<()> {
    match purge_service.purge(config.invocation.clone()).await {
        Ok(report) => {
            let encoded = serde_json::to_string(&report).map_err(|error| {
                AppError::Internal(format!("failed to encode purge report: {error}"))
            })?;
            if report.is_success() {
                info!(table = %config.invocation.table_name, report = %encoded, "purge report");
            } else {
                warn!(table = %config.invocation.table_name, report = %encoded, "purge report");
            }
            Ok(())
        }
        Err(error) => {
            warn!(
                table = %config.invocation.table_name,
                error = %error,
                "purge invocation failed"
            );
            Err(error)
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
