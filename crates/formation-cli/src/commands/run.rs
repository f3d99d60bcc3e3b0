//! Run command - start the controller against the current cluster

use prometheus::Registry;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use formation_kube::{PrometheusTransitionRecorder, metrics_router};

use super::{LocationArgs, load_settings};
use crate::error::{CliError, Result};

/// Overrides for the settings file
#[derive(Debug)]
pub struct RunOverrides<'a> {
    pub location: &'a LocationArgs,
    pub namespace: Option<&'a str>,
    pub concurrency: Option<u16>,
    pub requeue_seconds: Option<u64>,
    pub metrics_port: Option<u16>,
}

/// Run the run command
pub fn run(config: Option<&Path>, overrides: RunOverrides<'_>) -> Result<()> {
    let mut settings = load_settings(config)?;
    overrides.location.apply(&mut settings)?;
    if let Some(namespace) = overrides.namespace {
        settings.namespace = Some(namespace.to_string());
    }
    if let Some(concurrency) = overrides.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(requeue_seconds) = overrides.requeue_seconds {
        settings.requeue_seconds = requeue_seconds;
    }
    if let Some(port) = overrides.metrics_port {
        settings.metrics_port = Some(port);
    }
    settings.validate().map_err(|e| {
        CliError::config_with_help(
            e.to_string(),
            "set the location in the --config file or with --account and --region",
        )
    })?;

    let registry = Arc::new(Registry::new());
    let recorder = PrometheusTransitionRecorder::new(&registry).map_err(CliError::internal)?;

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::internal)?;
    runtime.block_on(async {
        if let Some(port) = settings.metrics_port {
            serve_metrics(port, registry).await?;
        }

        let client = kube::Client::try_default()
            .await
            .map_err(CliError::cluster)?;
        info!(namespace = ?settings.namespace, "connected to cluster");
        formation_kube::runtime::run(client, &settings, Arc::new(recorder))
            .await
            .map_err(CliError::cluster)
    })
}

/// Serve `/metrics` in the background
async fn serve_metrics(port: u16, registry: Arc<Registry>) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| CliError::config(format!("cannot listen on metrics port {port}: {e}")))?;
    info!(port, "serving metrics");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, metrics_router(registry)).await {
            error!(error = %e, "metrics listener stopped");
        }
    });
    Ok(())
}
