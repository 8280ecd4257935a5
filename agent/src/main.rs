mod config;
mod error;

use crate::config::AgentConfig;
use crate::error::Result;

use drainer::cluster::K8SClusterClient;
use drainer::drain::{drain_node_with_cancellation, uncordon_node};
use drainer::telemetry;

use snafu::ResultExt;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

use std::env;
use std::fs;
use std::future;

const TERMINATION_LOG: &str = "/dev/termination-log";

#[tokio::main]
async fn main() {
    let termination_log =
        env::var("TERMINATION_LOG").unwrap_or_else(|_| TERMINATION_LOG.to_string());

    if let Err(error) = run_agent().await {
        event!(Level::ERROR, %error, "Drain agent failed");
        if let Err(write_error) = fs::write(&termination_log, format!("{}", error)) {
            eprintln!(
                "Could not write k8s termination log '{}': {}",
                termination_log, write_error
            );
        }
        std::process::exit(1);
    }
}

async fn run_agent() -> Result<()> {
    telemetry::init_telemetry_from_env().context(error::TelemetryInitSnafu)?;

    let config = AgentConfig::from_env()?;

    let k8s_client = kube::client::Client::try_default()
        .await
        .context(error::ClientCreateSnafu)?;
    let cluster_client = K8SClusterClient::new(k8s_client);

    if config.uncordon {
        uncordon_node(&cluster_client, &config.request.node_name)
            .await
            .context(error::UncordonSnafu)?;
        event!(
            Level::INFO,
            "Node '{}' uncordoned",
            config.request.node_name
        );
        return Ok(());
    }

    // SIGINT or SIGTERM ends the drain early, as if its deadline had passed.
    let cancellation = CancellationToken::new();
    let signal_cancellation = cancellation.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancellation.cancel();
    });

    let report = drain_node_with_cancellation(&cluster_client, &config.request, cancellation)
        .await
        .context(error::DrainSnafu)?;

    let rendered = serde_json::to_string_pretty(&report).context(error::SerializeReportSnafu)?;
    println!("{}", rendered);

    if !report.is_drained() {
        event!(
            Level::WARN,
            remaining = report.remaining_pods().count(),
            "Node '{}' still has Pods which could not be removed",
            report.node()
        );
    }

    Ok(())
}

/// Resolves once the process receives SIGINT or SIGTERM. A handler which cannot be installed never resolves.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = signal::ctrl_c().await {
            event!(Level::ERROR, "Unable to listen for SIGINT: '{}'", err);
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                event!(Level::ERROR, "Unable to listen for SIGTERM: '{}'", err);
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = interrupt => {
            event!(Level::WARN, "Received SIGINT, cancelling drain");
        },
        _ = terminate => {
            event!(Level::WARN, "Received SIGTERM, cancelling drain");
        },
    }
}
