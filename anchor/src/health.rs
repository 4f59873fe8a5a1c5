//! Health check and metrics HTTP server
//!
//! Provides endpoints for Kubernetes probes and monitoring:
//! - GET /health - Liveness probe (always returns 200 if server is running)
//! - GET /ready - Readiness probe (checks the relayer is cycling)
//! - GET /metrics - Prometheus-compatible metrics
//! - GET /stats - JSON relayer and ledger statistics
//!
//! The mint API from [`crate::api`] is served on the same port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api;
use crate::node::AnchorNode;
use crate::types::RelayerStats;

/// Seconds without a relay cycle before the relayer counts as stalled
const MIN_STALE_AFTER_SECS: u64 = 60;

/// Health server state shared across handlers
pub struct HealthState {
    /// Service start time for uptime calculation
    pub start_time: Instant,

    /// Relayer statistics
    pub stats: Arc<RwLock<RelayerStats>>,

    /// Deployment being served
    pub node: Arc<AnchorNode>,

    /// Last completed relay cycle
    pub last_relay_check: RwLock<Option<Instant>>,

    /// Whether the node accepts mints
    pub is_ready: RwLock<bool>,
}

impl HealthState {
    pub fn new(node: Arc<AnchorNode>, stats: Arc<RwLock<RelayerStats>>) -> Self {
        Self {
            start_time: Instant::now(),
            stats,
            node,
            last_relay_check: RwLock::new(None),
            is_ready: RwLock::new(false),
        }
    }

    /// Update readiness status
    pub async fn set_ready(&self, ready: bool) {
        *self.is_ready.write().await = ready;
    }

    /// Update relay cycle timestamp
    pub async fn mark_relay_healthy(&self) {
        *self.last_relay_check.write().await = Some(Instant::now());
    }

    fn stale_after_secs(&self) -> u64 {
        (self.node.config().relay_interval_secs * 3).max(MIN_STALE_AFTER_SECS)
    }
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub relayer_required: bool,
    pub relayer_active: bool,
    pub last_relay_check_secs_ago: Option<u64>,
}

/// Stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_delivered: u64,
    pub total_duplicates: u64,
    pub total_rejected: u64,
    pub total_failed: u64,
    pub pending_messages: u64,
    pub success_rate: f64,
    pub avg_delivery_time_ms: u64,
    pub last_delivery_time: Option<String>,
    pub last_message_id: Option<String>,
    pub total_cycles: u64,
    pub anchored_count: usize,
    pub total_supply: String,
    pub uptime_secs: u64,
}

/// Health check handler - liveness probe
async fn health_handler(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check handler - readiness probe
async fn ready_handler(State(state): State<Arc<HealthState>>) -> Response {
    let is_ready = *state.is_ready.read().await;
    let last_relay = *state.last_relay_check.read().await;

    let relayer_required = state.node.deferred_relay().is_some();
    let relayer_active = last_relay
        .map(|t| t.elapsed().as_secs() < state.stale_after_secs())
        .unwrap_or(false);

    let response = ReadyResponse {
        ready: is_ready && (!relayer_required || relayer_active),
        relayer_required,
        relayer_active,
        last_relay_check_secs_ago: last_relay.map(|t| t.elapsed().as_secs()),
    };

    if response.ready {
        (StatusCode::OK, Json(response)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response)).into_response()
    }
}

/// Metrics handler - Prometheus format
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> String {
    let stats = state.stats.read().await;
    let uptime = state.start_time.elapsed().as_secs();
    let is_ready = if *state.is_ready.read().await { 1 } else { 0 };

    let ledger = state.node.ledger();
    let registry = state.node.registry();

    format!(
        r#"# HELP gt_relay_messages_total Relay messages settled, by outcome
# TYPE gt_relay_messages_total counter
gt_relay_messages_total{{outcome="delivered"}} {}
gt_relay_messages_total{{outcome="duplicate"}} {}
gt_relay_messages_total{{outcome="rejected"}} {}
gt_relay_messages_total{{outcome="failed"}} {}

# HELP gt_relay_pending_messages Relay messages waiting for delivery
# TYPE gt_relay_pending_messages gauge
gt_relay_pending_messages {}

# HELP gt_relay_success_rate Ratio of delivered relay messages
# TYPE gt_relay_success_rate gauge
gt_relay_success_rate {}

# HELP gt_anchored_total Content hashes anchored on the settlement domain
# TYPE gt_anchored_total gauge
gt_anchored_total {}

# HELP gt_total_supply Minted token supply in base units
# TYPE gt_total_supply gauge
gt_total_supply {}

# HELP gt_uptime_seconds Service uptime in seconds
# TYPE gt_uptime_seconds gauge
gt_uptime_seconds {}

# HELP gt_ready Whether the service is ready
# TYPE gt_ready gauge
gt_ready {}
"#,
        stats.total_delivered,
        stats.total_duplicates,
        stats.total_rejected,
        stats.total_failed,
        stats.pending_messages,
        stats.success_rate(),
        registry.anchored_count(),
        ledger.total_supply(),
        uptime,
        is_ready,
    )
}

/// Stats handler - JSON statistics
async fn stats_handler(State(state): State<Arc<HealthState>>) -> Json<StatsResponse> {
    let stats = state.stats.read().await;

    Json(StatsResponse {
        total_delivered: stats.total_delivered,
        total_duplicates: stats.total_duplicates,
        total_rejected: stats.total_rejected,
        total_failed: stats.total_failed,
        pending_messages: stats.pending_messages,
        success_rate: stats.success_rate(),
        avg_delivery_time_ms: stats.avg_delivery_time_ms,
        last_delivery_time: stats.last_delivery_time.map(|t| t.to_rfc3339()),
        last_message_id: stats.last_message_id.map(|id| id.to_string()),
        total_cycles: stats.total_cycles,
        anchored_count: state.node.registry().anchored_count(),
        total_supply: state.node.ledger().total_supply().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

/// HTTP server for probes, metrics and the mint API
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Get shared state for updates from the relayer
    pub fn state(&self) -> Arc<HealthState> {
        Arc::clone(&self.state)
    }

    /// Run the server
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = create_router(Arc::clone(&self.state))
            .merge(api::router(Arc::clone(&self.state.node)))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());

        info!(port = self.port, "HTTP server starting");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::domain::ManualClock;
    use crate::messenger::DeliveryMode;
    use alloy::primitives::Address;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_node(mode: DeliveryMode) -> Arc<AnchorNode> {
        let mut config = NodeConfig::new(Address::repeat_byte(0x11), Address::repeat_byte(0xad));
        config.delivery_mode = mode;
        Arc::new(AnchorNode::build(config, Arc::new(ManualClock::new(0))).unwrap())
    }

    fn test_state(mode: DeliveryMode) -> Arc<HealthState> {
        let stats = Arc::new(RwLock::new(RelayerStats::default()));
        Arc::new(HealthState::new(test_node(mode), stats))
    }

    async fn fetch(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = fetch(create_router(test_state(DeliveryMode::Deferred)), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_endpoint_not_ready() {
        let response = fetch(create_router(test_state(DeliveryMode::Deferred)), "/ready").await;

        // Should be 503 when not ready
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ready_requires_relayer_cycle() {
        let state = test_state(DeliveryMode::Deferred);
        state.set_ready(true).await;

        let response = fetch(create_router(Arc::clone(&state)), "/ready").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.mark_relay_healthy().await;
        let response = fetch(create_router(state), "/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_synchronous_without_relayer() {
        let state = test_state(DeliveryMode::Synchronous);
        state.set_ready(true).await;

        let response = fetch(create_router(state), "/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let stats = Arc::new(RwLock::new(RelayerStats {
            total_delivered: 10,
            total_duplicates: 1,
            total_failed: 2,
            ..Default::default()
        }));
        let state = Arc::new(HealthState::new(test_node(DeliveryMode::Deferred), stats));

        let response = fetch(create_router(state), "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();

        assert!(body_str.contains("gt_relay_messages_total{outcome=\"delivered\"} 10"));
        assert!(body_str.contains("gt_relay_messages_total{outcome=\"duplicate\"} 1"));
        assert!(body_str.contains("gt_relay_messages_total{outcome=\"failed\"} 2"));
        assert!(body_str.contains("gt_anchored_total 0"));
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let response = fetch(create_router(test_state(DeliveryMode::Deferred)), "/stats").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["total_supply"], "0");
        assert_eq!(json["success_rate"], 1.0);
    }
}
