//! Relayer service delivering deferred cross-domain messages

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;
use crate::domain::Clock;
use crate::error::{GtError, ReplayError};
use crate::health::HealthState;
use crate::relay::{DeferredRelay, RelayMessage};
use crate::types::{DeliveryOutcome, DeliveryResult, RelayerStats};

/// Relayer that drains a deferred transport into the settlement domain
pub struct RelayerService {
    config: NodeConfig,
    relay: Arc<dyn DeferredRelay>,
    clock: Arc<dyn Clock>,
    stats: Arc<RwLock<RelayerStats>>,
    health_state: Option<Arc<HealthState>>,
}

impl RelayerService {
    /// Create a new relayer service
    pub fn new(config: NodeConfig, relay: Arc<dyn DeferredRelay>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            relay,
            clock,
            stats: Arc::new(RwLock::new(RelayerStats::default())),
            health_state: None,
        }
    }

    /// Create a relayer that shares stats with the health server
    pub fn with_health_state(
        config: NodeConfig,
        relay: Arc<dyn DeferredRelay>,
        clock: Arc<dyn Clock>,
        health_state: Arc<HealthState>,
    ) -> Self {
        Self {
            config,
            relay,
            clock,
            stats: Arc::clone(&health_state.stats),
            health_state: Some(health_state),
        }
    }

    /// Run the relay loop
    pub async fn run(&self) -> Result<()> {
        info!(
            interval = self.config.relay_interval_secs,
            max_retries = self.config.max_retries,
            relay_model = self.config.relay_model.as_str(),
            "Starting relayer service"
        );

        self.stats.write().await.service_started = Some(Utc::now());
        if let Some(health) = &self.health_state {
            health.set_ready(true).await;
        }

        loop {
            let results = self.run_cycle().await;

            if !results.is_empty() {
                let count = |o: DeliveryOutcome| results.iter().filter(|r| r.outcome == o).count();
                info!(
                    delivered = count(DeliveryOutcome::Delivered),
                    duplicates = count(DeliveryOutcome::Duplicate),
                    rejected = count(DeliveryOutcome::Rejected),
                    failed = count(DeliveryOutcome::Failed),
                    "Relay cycle complete"
                );
            }

            tokio::time::sleep(Duration::from_secs(self.config.relay_interval_secs)).await;
        }
    }

    /// Deliver every message that is due now
    pub async fn run_cycle(&self) -> Vec<DeliveryResult> {
        let now = self.clock.now();
        let due = self.relay.due_messages(now);

        if due.is_empty() {
            debug!("No relay messages due");
        } else {
            info!(count = due.len(), "Found due relay messages");
        }

        let mut results = Vec::with_capacity(due.len());
        for message in &due {
            results.push(self.deliver_with_retry(message).await);
        }

        {
            let mut stats = self.stats.write().await;
            stats.total_cycles += 1;
            stats.pending_messages = self.relay.pending_count() as u64;
        }

        if let Some(health) = &self.health_state {
            health.mark_relay_healthy().await;
        }

        results
    }

    /// Deliver one message, retrying transient failures
    async fn deliver_with_retry(&self, message: &RelayMessage) -> DeliveryResult {
        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let started = Instant::now();
            match self.relay.deliver(message, self.clock.now()) {
                Ok(()) => {
                    self.relay.acknowledge(message.id);
                    self.stats
                        .write()
                        .await
                        .record_success(message.id, started.elapsed().as_millis() as u64);

                    info!(
                        message_id = %message.id,
                        nonce = message.nonce,
                        attempts = attempt,
                        "Relay message delivered"
                    );
                    return self.result(message, DeliveryOutcome::Delivered, attempt, None);
                }
                Err(e @ GtError::Replay(ReplayError::AlreadyAnchored(_))) => {
                    // Already settled on the other side; nothing left to deliver.
                    self.relay.acknowledge(message.id);
                    self.stats.write().await.record_outcome(DeliveryOutcome::Duplicate);
                    info!(message_id = %message.id, error = %e, "Relay message already anchored");
                    return self.result(message, DeliveryOutcome::Duplicate, attempt, Some(e.to_string()));
                }
                Err(e) if !e.is_retryable() => {
                    self.relay.acknowledge(message.id);
                    self.stats.write().await.record_outcome(DeliveryOutcome::Rejected);
                    error!(
                        message_id = %message.id,
                        nonce = message.nonce,
                        error_code = e.error_code(),
                        error = %e,
                        "Relay message rejected, dropping"
                    );
                    return self.result(message, DeliveryOutcome::Rejected, attempt, Some(e.to_string()));
                }
                Err(e) => {
                    warn!(
                        message_id = %message.id,
                        attempt = attempt,
                        max_retries = max_attempts,
                        error = %e,
                        "Relay attempt failed"
                    );
                    last_error = Some(e.to_string());

                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_secs(
                            self.config.retry_delay_secs * attempt as u64,
                        ))
                        .await;
                    }
                }
            }
        }

        // Left queued for the next cycle
        self.stats.write().await.record_outcome(DeliveryOutcome::Failed);
        self.result(message, DeliveryOutcome::Failed, max_attempts, last_error)
    }

    fn result(
        &self,
        message: &RelayMessage,
        outcome: DeliveryOutcome,
        attempts: u32,
        error: Option<String>,
    ) -> DeliveryResult {
        DeliveryResult {
            message_id: message.id,
            nonce: message.nonce,
            outcome,
            attempts,
            error,
        }
    }

    /// Get current statistics
    pub async fn stats(&self) -> RelayerStats {
        self.stats.read().await.clone()
    }
}
