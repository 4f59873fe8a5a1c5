//! Cross-domain messenger transport
//!
//! `send_message` on the issuing domain either executes the call right away
//! (synchronous delivery, for tests and simulation) or queues it for an
//! independent relayer. While a message executes, the messenger is the
//! immediate caller of the target and reports the source-domain sender
//! through [`OriginSender`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::CallContext;
use crate::error::{GtResult, RelayError};
use crate::relay::{
    check_gas, DeferredRelay, DeliveryStatus, MessageRelay, OriginSender, RelayMessage,
    RelayReceipt, RelayTarget, TargetSet,
};

/// When a sent message is executed on the settlement domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Inside `send_message`; target errors propagate to the sender
    Synchronous,
    /// Later, by a relayer calling [`CrossDomainMessenger::relay_message`]
    #[default]
    Deferred,
}

/// Messenger shared by both domains of one deployment
pub struct CrossDomainMessenger {
    address: Address,
    mode: DeliveryMode,
    /// Minimum seconds between send and delivery in deferred mode
    delivery_delay_secs: u64,
    targets: TargetSet,
    next_nonce: AtomicU64,
    pending: Mutex<VecDeque<RelayMessage>>,
    /// Source sender of the message currently executing
    x_domain_sender: RwLock<Option<Address>>,
    /// Serializes settlement-domain execution
    execution: Mutex<()>,
}

impl CrossDomainMessenger {
    pub fn new(address: Address, mode: DeliveryMode) -> Self {
        Self {
            address,
            mode,
            delivery_delay_secs: 0,
            targets: TargetSet::new(),
            next_nonce: AtomicU64::new(0),
            pending: Mutex::new(VecDeque::new()),
            x_domain_sender: RwLock::new(None),
            execution: Mutex::new(()),
        }
    }

    /// Set the deferred-mode delivery delay
    pub fn with_delivery_delay(mut self, secs: u64) -> Self {
        self.delivery_delay_secs = secs;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Make a settlement-domain contract reachable through this messenger
    pub fn register_target(&self, target: Arc<dyn RelayTarget>) {
        self.targets.register(target);
    }

    /// `xDomainMessageSender()`: the source sender while a message executes
    pub fn x_domain_message_sender(&self) -> Option<Address> {
        *self.x_domain_sender.read()
    }

    /// Execute a queued message against its target on the settlement domain.
    ///
    /// Only a message this messenger queued, unaltered, is executed; it leaves
    /// the queue once it succeeds.
    pub fn relay_message(&self, message: &RelayMessage, now: u64) -> GtResult<()> {
        let _execution = self.execution.lock();

        let queued = self.pending.lock().iter().find(|m| *m == message).cloned();
        let Some(queued) = queued else {
            warn!(
                message_id = %message.id,
                nonce = message.nonce,
                sender = %message.sender,
                "Relay refused: message was not sent through this messenger"
            );
            return Err(RelayError::UnknownMessage(message.id).into());
        };

        self.execute_locked(&queued, now)?;
        self.pending.lock().retain(|m| m.id != queued.id);
        Ok(())
    }

    fn execute_locked(&self, message: &RelayMessage, now: u64) -> GtResult<()> {
        let target = self.targets.get(message.target)?;

        *self.x_domain_sender.write() = Some(message.sender);

        let ctx = CallContext::relayed(self.address, now, self);
        let result = target.handle(&ctx, &message.data);

        *self.x_domain_sender.write() = None;

        match &result {
            Ok(()) => debug!(
                message_id = %message.id,
                nonce = message.nonce,
                target = %message.target,
                "Relayed message executed"
            ),
            Err(e) => warn!(
                message_id = %message.id,
                nonce = message.nonce,
                target = %message.target,
                error = %e,
                "Relayed message reverted"
            ),
        }

        result
    }

    /// Messages waiting for a relayer
    pub fn pending_messages(&self) -> Vec<RelayMessage> {
        self.pending.lock().iter().cloned().collect()
    }
}

impl MessageRelay for CrossDomainMessenger {
    fn endpoint(&self) -> Address {
        self.address
    }

    fn send_message(
        &self,
        ctx: &CallContext<'_>,
        target: Address,
        data: Bytes,
        gas_limit: u64,
    ) -> GtResult<RelayReceipt> {
        check_gas(gas_limit)?;

        let message = RelayMessage {
            id: Uuid::new_v4(),
            nonce: self.next_nonce.fetch_add(1, Ordering::SeqCst),
            sender: ctx.caller,
            target,
            data,
            gas_limit,
            sent_at: ctx.timestamp,
        };

        let status = match self.mode {
            DeliveryMode::Synchronous => {
                let _execution = self.execution.lock();
                self.execute_locked(&message, ctx.timestamp)?;
                DeliveryStatus::Delivered
            }
            DeliveryMode::Deferred => {
                self.pending.lock().push_back(message.clone());
                DeliveryStatus::Queued
            }
        };

        info!(
            message_id = %message.id,
            nonce = message.nonce,
            sender = %message.sender,
            target = %message.target,
            status = ?status,
            "Cross-domain message sent"
        );

        Ok(RelayReceipt {
            message_id: message.id,
            nonce: message.nonce,
            status,
        })
    }
}

impl OriginSender for CrossDomainMessenger {
    fn origin_sender(&self) -> Option<Address> {
        self.x_domain_message_sender()
    }
}

impl DeferredRelay for CrossDomainMessenger {
    fn due_messages(&self, now: u64) -> Vec<RelayMessage> {
        self.pending
            .lock()
            .iter()
            .filter(|m| m.sent_at.saturating_add(self.delivery_delay_secs) <= now)
            .cloned()
            .collect()
    }

    fn deliver(&self, message: &RelayMessage, now: u64) -> GtResult<()> {
        self.relay_message(message, now)
    }

    fn acknowledge(&self, message_id: Uuid) {
        self.pending.lock().retain(|m| m.id != message_id);
    }

    fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthorizationError, GtError};

    /// Records the origin sender it observed
    struct Probe {
        address: Address,
        seen: Mutex<Vec<(Address, Option<Address>)>>,
    }

    impl RelayTarget for Probe {
        fn address(&self) -> Address {
            self.address
        }

        fn handle(&self, ctx: &CallContext<'_>, data: &[u8]) -> GtResult<()> {
            if data == b"revert" {
                return Err(AuthorizationError::NotFromTransport { caller: ctx.caller }.into());
            }
            self.seen.lock().push((ctx.caller, ctx.origin_sender()));
            Ok(())
        }
    }

    fn setup(mode: DeliveryMode) -> (CrossDomainMessenger, Arc<Probe>) {
        let messenger = CrossDomainMessenger::new(Address::repeat_byte(0xaa), mode);
        let probe = Arc::new(Probe {
            address: Address::repeat_byte(0xbb),
            seen: Mutex::new(Vec::new()),
        });
        messenger.register_target(probe.clone());
        (messenger, probe)
    }

    #[test]
    fn test_synchronous_delivery_exposes_origin() {
        let (messenger, probe) = setup(DeliveryMode::Synchronous);
        let sender = Address::repeat_byte(0x01);

        let receipt = messenger
            .send_message(&CallContext::new(sender, 10), probe.address, Bytes::new(), 100)
            .unwrap();

        assert_eq!(receipt.status, DeliveryStatus::Delivered);
        assert_eq!(
            probe.seen.lock().as_slice(),
            &[(messenger.address(), Some(sender))]
        );
        // cleared once execution ends
        assert_eq!(messenger.x_domain_message_sender(), None);
    }

    #[test]
    fn test_synchronous_revert_propagates() {
        let (messenger, probe) = setup(DeliveryMode::Synchronous);
        let err = messenger
            .send_message(
                &CallContext::new(Address::repeat_byte(0x01), 10),
                probe.address,
                Bytes::from_static(b"revert"),
                100,
            )
            .unwrap_err();

        assert!(matches!(err, GtError::Authorization(_)));
        assert_eq!(messenger.x_domain_message_sender(), None);
    }

    #[test]
    fn test_deferred_delivery_waits_for_delay() {
        let messenger = CrossDomainMessenger::new(Address::repeat_byte(0xaa), DeliveryMode::Deferred)
            .with_delivery_delay(60);
        let probe = Arc::new(Probe {
            address: Address::repeat_byte(0xbb),
            seen: Mutex::new(Vec::new()),
        });
        messenger.register_target(probe.clone());

        let receipt = messenger
            .send_message(
                &CallContext::new(Address::repeat_byte(0x01), 100),
                probe.address,
                Bytes::new(),
                100,
            )
            .unwrap();
        assert_eq!(receipt.status, DeliveryStatus::Queued);
        assert!(probe.seen.lock().is_empty());

        assert!(messenger.due_messages(159).is_empty());
        let due = messenger.due_messages(160);
        assert_eq!(due.len(), 1);

        messenger.deliver(&due[0], 160).unwrap();
        messenger.acknowledge(due[0].id);
        assert_eq!(messenger.pending_count(), 0);
        assert_eq!(probe.seen.lock().len(), 1);
    }

    #[test]
    fn test_unsent_message_refused() {
        let (messenger, probe) = setup(DeliveryMode::Deferred);
        let forged = RelayMessage {
            id: Uuid::new_v4(),
            nonce: 999,
            sender: Address::repeat_byte(0x12),
            target: probe.address,
            data: Bytes::new(),
            gas_limit: 1_000_000,
            sent_at: 0,
        };

        let err = messenger.relay_message(&forged, 10).unwrap_err();
        assert!(matches!(err, GtError::Relay(RelayError::UnknownMessage(id)) if id == forged.id));
        assert!(probe.seen.lock().is_empty());
    }

    #[test]
    fn test_altered_message_refused() {
        let (messenger, probe) = setup(DeliveryMode::Deferred);
        messenger
            .send_message(
                &CallContext::new(Address::repeat_byte(0x66), 0),
                probe.address,
                Bytes::new(),
                100,
            )
            .unwrap();

        // Same id and nonce, different claimed sender
        let mut altered = messenger.pending_messages().remove(0);
        altered.sender = Address::repeat_byte(0x12);
        let err = messenger.relay_message(&altered, 10).unwrap_err();
        assert!(matches!(err, GtError::Relay(RelayError::UnknownMessage(_))));
        assert!(probe.seen.lock().is_empty());
        assert_eq!(messenger.pending_count(), 1);
    }

    #[test]
    fn test_delivered_message_leaves_queue() {
        let (messenger, probe) = setup(DeliveryMode::Deferred);
        messenger
            .send_message(
                &CallContext::new(Address::repeat_byte(0x01), 0),
                probe.address,
                Bytes::new(),
                100,
            )
            .unwrap();

        let message = messenger.pending_messages().remove(0);
        messenger.relay_message(&message, 10).unwrap();
        assert_eq!(messenger.pending_count(), 0);

        let err = messenger.relay_message(&message, 11).unwrap_err();
        assert!(matches!(err, GtError::Relay(RelayError::UnknownMessage(_))));
        assert_eq!(probe.seen.lock().len(), 1);
    }

    #[test]
    fn test_reverted_message_stays_queued() {
        let (messenger, probe) = setup(DeliveryMode::Deferred);
        messenger
            .send_message(
                &CallContext::new(Address::repeat_byte(0x01), 0),
                probe.address,
                Bytes::from_static(b"revert"),
                100,
            )
            .unwrap();

        let message = messenger.pending_messages().remove(0);
        assert!(messenger.relay_message(&message, 10).is_err());
        assert_eq!(messenger.pending_count(), 1);
    }

    #[test]
    fn test_unknown_target() {
        let (messenger, _) = setup(DeliveryMode::Synchronous);
        let result = messenger.send_message(
            &CallContext::new(Address::repeat_byte(0x01), 0),
            Address::repeat_byte(0xcc),
            Bytes::new(),
            100,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_nonces_increase() {
        let (messenger, probe) = setup(DeliveryMode::Deferred);
        let ctx = CallContext::new(Address::repeat_byte(0x01), 0);
        let first = messenger.send_message(&ctx, probe.address, Bytes::new(), 1).unwrap();
        let second = messenger.send_message(&ctx, probe.address, Bytes::new(), 1).unwrap();
        assert!(second.nonce > first.nonce);
        assert_eq!(messenger.pending_messages().len(), 2);
    }
}
