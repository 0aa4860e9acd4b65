use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::future::join_all;
use tokio::signal;
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use multilimiter::api::{ApiConnection, Endpoint};
use multilimiter::config::Settings;
use multilimiter::Context;

/// Drive concurrent requests through a rate-limited API connection.
#[derive(Parser, Debug)]
#[command(name = "multilimiter", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Concurrent requests per endpoint
    #[arg(short, long)]
    requests: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!("Starting multilimiter");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(requests) = args.requests {
        settings.demo.requests_per_endpoint = requests;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.demo.timeout_ms = Some(timeout_ms);
    }
    info!(
        requests_per_endpoint = settings.demo.requests_per_endpoint,
        timeout_ms = ?settings.demo.timeout_ms,
        "Configuration loaded"
    );

    let connection = Arc::new(ApiConnection::open(&settings.limits)?);

    // Abort in-flight waits on Ctrl+C or SIGTERM
    let (root, shutdown) = Context::background().with_cancel();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    let timeout = settings.demo.timeout_ms.map(Duration::from_millis);
    let start = Instant::now();

    let mut calls = Vec::new();
    for endpoint in Endpoint::ALL {
        for request in 0..settings.demo.requests_per_endpoint {
            let connection = connection.clone();
            let ctx = match timeout {
                Some(timeout) => root.with_timeout(timeout),
                None => root.clone(),
            };
            calls.push(tokio::spawn(async move {
                let result = connection.call(endpoint, &ctx).await;
                let elapsed_ms = start.elapsed().as_millis() as u64;
                match &result {
                    Ok(()) => info!(%endpoint, request, elapsed_ms, "Request completed"),
                    Err(e) if e.is_cancellation() => {
                        warn!(%endpoint, request, elapsed_ms, error = %e, "Request rejected")
                    }
                    Err(e) => error!(%endpoint, request, elapsed_ms, error = %e, "Request failed"),
                }
                result.is_ok()
            }));
        }
    }

    let mut completed = 0usize;
    let mut rejected = 0usize;
    for outcome in join_all(calls).await {
        if outcome? {
            completed += 1;
        } else {
            rejected += 1;
        }
    }

    info!(
        completed,
        rejected,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Done"
    );
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling pending requests");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling pending requests");
        }
    }
}
