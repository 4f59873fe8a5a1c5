//! GreenToken anchor node
//!
//! Runs both domains in one process: the mint API, the anchor registry and,
//! for deferred transports, the relayer between them.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use gt_anchor::domain::SystemClock;
use gt_anchor::{AnchorNode, HealthServer, HealthState, NodeConfig, RelayerService, RelayerStats};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gt_anchor=debug"));

    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "GreenToken anchor node starting");

    // Load configuration
    let config = NodeConfig::from_env()?;
    config.validate()?;

    info!(
        issuer = %config.issuer_address,
        admin = %config.admin_address,
        scheme = config.verifier_scheme.as_str(),
        relay_model = config.relay_model.as_str(),
        delivery_mode = ?config.delivery_mode,
        interval = config.relay_interval_secs,
        http_port = config.http_port,
        "Configuration loaded"
    );

    let clock = Arc::new(SystemClock);
    let node = Arc::new(AnchorNode::build(config.clone(), clock.clone())?);

    // Create shared stats and health state
    let stats = Arc::new(RwLock::new(RelayerStats::default()));
    let health_state = Arc::new(HealthState::new(Arc::clone(&node), Arc::clone(&stats)));
    let server = HealthServer::new(Arc::clone(&health_state), config.http_port);

    let relayer = node.deferred_relay().map(|relay| {
        RelayerService::with_health_state(config.clone(), relay, clock.clone(), Arc::clone(&health_state))
    });

    let relayer_task = async {
        match &relayer {
            Some(service) => service.run().await,
            None => {
                info!("Synchronous delivery, relayer disabled");
                health_state.set_ready(true).await;
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        result = relayer_task => {
            if let Err(e) = result {
                error!(error = %e, "Relayer failed");
                return Err(e);
            }
        }
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Anchor node stopped");
    Ok(())
}
