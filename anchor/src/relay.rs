//! Cross-domain message relay abstraction
//!
//! Two transport models implement the same capabilities:
//! - [`messenger`](crate::messenger): a cross-domain messenger that executes
//!   the call and exposes the origin sender while it runs
//! - [`outbox`](crate::outbox): exit messages executed later through an
//!   outbox and bridge by anyone holding a valid exit
//!
//! Targets only ever see [`CallContext`]: the immediate caller plus the
//! transport's [`OriginSender`] view.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::CallContext;
use crate::error::{GtResult, RelayError};

/// Issuing-domain side of a transport
pub trait MessageRelay: Send + Sync {
    /// Address the source contract talks to
    fn endpoint(&self) -> Address;

    /// Hand `data` to the transport for execution against `target` on the
    /// settlement domain. `ctx.caller` becomes the origin sender.
    fn send_message(
        &self,
        ctx: &CallContext<'_>,
        target: Address,
        data: Bytes,
        gas_limit: u64,
    ) -> GtResult<RelayReceipt>;
}

/// Settlement-domain view a transport exposes during a relayed call
pub trait OriginSender: Send + Sync {
    /// Sender on the origin domain, `None` outside a relayed call
    fn origin_sender(&self) -> Option<Address>;
}

/// Settlement-domain contract that accepts relayed calls
pub trait RelayTarget: Send + Sync {
    fn address(&self) -> Address;

    fn handle(&self, ctx: &CallContext<'_>, data: &[u8]) -> GtResult<()>;
}

/// Transport whose messages are delivered later by an independent relayer
pub trait DeferredRelay: Send + Sync {
    /// Messages that can be delivered at `now`
    fn due_messages(&self, now: u64) -> Vec<RelayMessage>;

    /// Execute one message against its target
    fn deliver(&self, message: &RelayMessage, now: u64) -> GtResult<()>;

    /// Stop tracking a message that was settled (delivered or dropped)
    fn acknowledge(&self, message_id: Uuid);

    /// Messages not yet settled
    fn pending_count(&self) -> usize;
}

/// A message in flight between the domains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub id: Uuid,
    /// Messenger nonce or exit position
    pub nonce: u64,
    pub sender: Address,
    pub target: Address,
    pub data: Bytes,
    pub gas_limit: u64,
    /// Source-domain time the message was sent
    pub sent_at: u64,
}

/// What the transport did with a sent message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Executed on the settlement domain within the send
    Delivered,
    /// Waiting for a relayer
    Queued,
}

/// Receipt returned by [`MessageRelay::send_message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReceipt {
    pub message_id: Uuid,
    pub nonce: u64,
    pub status: DeliveryStatus,
}

/// Settlement-domain contracts reachable through a transport
#[derive(Default)]
pub struct TargetSet {
    targets: RwLock<HashMap<Address, Arc<dyn RelayTarget>>>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, target: Arc<dyn RelayTarget>) {
        self.targets.write().insert(target.address(), target);
    }

    pub fn get(&self, address: Address) -> GtResult<Arc<dyn RelayTarget>> {
        self.targets
            .read()
            .get(&address)
            .cloned()
            .ok_or_else(|| RelayError::UnknownTarget(address).into())
    }
}

/// Refuse a relayed call with no gas budget at all. Transports do not meter
/// execution, so any positive limit is accepted.
pub(crate) fn check_gas(gas_limit: u64) -> GtResult<()> {
    if gas_limit == 0 {
        return Err(RelayError::InsufficientGas(gas_limit).into());
    }
    Ok(())
}
