//! Types shared by the issuing and settlement domains

use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canon;

/// Deterministic hash of the disclosed mint attributes (the `dtHash`)
pub type ContentHash = B256;

/// Publicly disclosed attributes of a mint request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisclosedFields {
    /// Issuance epoch (e.g. `202540` for week 40 of 2025)
    pub epoch_index: u64,

    /// Energy type code
    pub type_code: u16,

    /// Quantity credited, in token base units
    pub quantity: U256,

    /// Issuer policy nonce, lets the issuer re-issue identical quantities
    pub policy_nonce: u128,
}

impl DisclosedFields {
    pub fn new(epoch_index: u64, type_code: u16, quantity: U256, policy_nonce: u128) -> Self {
        Self {
            epoch_index,
            type_code,
            quantity,
            policy_nonce,
        }
    }

    /// Content hash of these fields
    pub fn content_hash(&self) -> ContentHash {
        canon::content_hash(self)
    }
}

/// A holder's request to mint against a credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRequest {
    pub fields: DisclosedFields,

    /// Commitment to the undisclosed attributes (owner, meter, site)
    pub hidden_commitment: B256,

    /// Unix time after which the credential is no longer accepted
    pub expiry: u64,

    /// Verifier-specific proof: a 65-byte issuer signature, or a packed
    /// `(bytes32 vcHash, bytes signature)` disclosure proof
    pub proof: Bytes,
}

/// Immutable record of a successful mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRecord {
    pub holder: Address,
    pub content_hash: ContentHash,
    pub amount: U256,
    pub fields: DisclosedFields,
    pub timestamp: u64,
    /// Relay message that carries the anchor call
    pub message_id: Uuid,
}

/// Write-once settlement-domain record for a content hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEntry {
    pub to: Address,
    pub amount: U256,
    pub epoch_index: u64,
    pub type_code: u16,
    pub quantity: U256,
    pub timestamp: u64,
}

/// Payload of a relayed `recordMint` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRequest {
    pub content_hash: ContentHash,
    pub to: Address,
    pub amount: U256,
    pub epoch_index: u64,
    pub type_code: u16,
    pub quantity: U256,
}

/// Which transport the anchor registry trusts and whom it trusts through it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfiguration {
    /// Messenger or bridge address that must be the immediate caller
    pub transport_endpoint: Address,

    /// Issuing-domain contract that must have sent the message
    pub authorized_origin_sender: Address,
}

/// Notifications emitted by the mint ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Minted {
        to: Address,
        content_hash: ContentHash,
        epoch_index: u64,
        type_code: u16,
        quantity: U256,
        amount: U256,
    },
    Transfer {
        from: Address,
        to: Address,
        amount: U256,
    },
    AllowedTypeSet {
        type_code: u16,
        allowed: bool,
    },
    VerifierUpdated {
        scheme: String,
        issuer: Address,
    },
}

/// Notifications emitted by the anchor registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    MintAnchored {
        content_hash: ContentHash,
        to: Address,
        amount: U256,
        epoch_index: u64,
        type_code: u16,
        quantity: U256,
    },
    ConfigUpdated(RelayConfiguration),
    ConfigLocked,
}

/// Relayer statistics
#[derive(Debug, Clone, Default)]
pub struct RelayerStats {
    pub total_delivered: u64,
    /// Deliveries the registry rejected as already anchored
    pub total_duplicates: u64,
    /// Deliveries rejected for a non-retryable reason (dropped)
    pub total_rejected: u64,
    /// Deliveries that exhausted retries (left queued)
    pub total_failed: u64,
    pub last_delivery_time: Option<DateTime<Utc>>,
    pub last_message_id: Option<Uuid>,
    /// Consecutive failures (resets on success)
    pub consecutive_failures: u64,
    /// Average delivery time in milliseconds
    pub avg_delivery_time_ms: u64,
    /// Service start time
    pub service_started: Option<DateTime<Utc>>,
    /// Total cycles completed
    pub total_cycles: u64,
    /// Messages waiting for delivery at the end of the last cycle
    pub pending_messages: u64,
}

impl RelayerStats {
    /// Record a successful delivery
    pub fn record_success(&mut self, message_id: Uuid, delivery_time_ms: u64) {
        self.total_delivered += 1;
        self.consecutive_failures = 0;
        self.last_delivery_time = Some(Utc::now());
        self.last_message_id = Some(message_id);

        if self.total_delivered == 1 {
            self.avg_delivery_time_ms = delivery_time_ms;
        } else {
            // Exponential moving average (weight new samples more)
            self.avg_delivery_time_ms = (self.avg_delivery_time_ms * 9 + delivery_time_ms) / 10;
        }
    }

    /// Record a delivery outcome other than success
    pub fn record_outcome(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => {}
            DeliveryOutcome::Duplicate => self.total_duplicates += 1,
            DeliveryOutcome::Rejected => {
                self.total_rejected += 1;
                self.consecutive_failures += 1;
            }
            DeliveryOutcome::Failed => {
                self.total_failed += 1;
                self.consecutive_failures += 1;
            }
        }
    }

    /// Ratio of delivered messages among all settled ones
    pub fn success_rate(&self) -> f64 {
        let total = self.total_delivered + self.total_rejected + self.total_failed;
        if total == 0 {
            return 1.0;
        }
        self.total_delivered as f64 / total as f64
    }
}

/// How a single relay attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Duplicate,
    Rejected,
    Failed,
}

impl DeliveryOutcome {
    /// String representation for logs and JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Duplicate => "duplicate",
            DeliveryOutcome::Rejected => "rejected",
            DeliveryOutcome::Failed => "failed",
        }
    }
}

/// Result of delivering one relayed message
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub message_id: Uuid,
    pub nonce: u64,
    pub outcome: DeliveryOutcome,
    pub attempts: u32,
    pub error: Option<String>,
}
