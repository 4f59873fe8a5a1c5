//! Outbox/bridge transport
//!
//! The issuing domain records exit messages through [`ArbSys`]. Once an exit
//! has passed the challenge period, anyone holding it can have the
//! [`Outbox`] execute it. The outbox calls the target through the
//! [`Bridge`], so the target sees the bridge as its immediate caller and the
//! outbox's `l2_to_l1_sender` as the origin sender.

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::{address, Address, Bytes};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::CallContext;
use crate::error::{GtResult, RelayError};
use crate::relay::{
    check_gas, DeferredRelay, DeliveryStatus, MessageRelay, OriginSender, RelayMessage,
    RelayReceipt, RelayTarget, TargetSet,
};

/// Address of the issuing-domain system precompile
pub const ARB_SYS_ADDRESS: Address = address!("0000000000000000000000000000000000000064");

/// Append-only log of exit messages, shared by the precompile and the outbox
#[derive(Default)]
pub struct ExitLog {
    entries: RwLock<Vec<RelayMessage>>,
}

impl ExitLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, mut message: RelayMessage) -> RelayMessage {
        let mut entries = self.entries.write();
        message.nonce = entries.len() as u64;
        entries.push(message.clone());
        message
    }

    /// Exit message at `position`
    pub fn get(&self, position: u64) -> Option<RelayMessage> {
        self.entries.read().get(position as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn all(&self) -> Vec<RelayMessage> {
        self.entries.read().clone()
    }
}

/// Issuing-domain precompile: `sendTxToL1(destination, data)`
pub struct ArbSys {
    log: Arc<ExitLog>,
}

impl ArbSys {
    pub fn new(log: Arc<ExitLog>) -> Self {
        Self { log }
    }

    pub fn exit_log(&self) -> Arc<ExitLog> {
        Arc::clone(&self.log)
    }
}

impl MessageRelay for ArbSys {
    fn endpoint(&self) -> Address {
        ARB_SYS_ADDRESS
    }

    fn send_message(
        &self,
        ctx: &CallContext<'_>,
        target: Address,
        data: Bytes,
        gas_limit: u64,
    ) -> GtResult<RelayReceipt> {
        check_gas(gas_limit)?;

        let message = self.log.append(RelayMessage {
            id: Uuid::new_v4(),
            nonce: 0,
            sender: ctx.caller,
            target,
            data,
            gas_limit,
            sent_at: ctx.timestamp,
        });

        info!(
            message_id = %message.id,
            position = message.nonce,
            sender = %message.sender,
            destination = %message.target,
            "L2ToL1Tx exit message recorded"
        );

        Ok(RelayReceipt {
            message_id: message.id,
            nonce: message.nonce,
            status: DeliveryStatus::Queued,
        })
    }
}

/// Settlement-domain bridge: the immediate caller of every executed exit
pub struct Bridge {
    address: Address,
    allowed_outboxes: RwLock<HashSet<Address>>,
    targets: TargetSet,
}

impl Bridge {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            allowed_outboxes: RwLock::new(HashSet::new()),
            targets: TargetSet::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn set_outbox(&self, outbox: Address, enabled: bool) {
        let mut allowed = self.allowed_outboxes.write();
        if enabled {
            allowed.insert(outbox);
        } else {
            allowed.remove(&outbox);
        }
    }

    pub fn register_target(&self, target: Arc<dyn RelayTarget>) {
        self.targets.register(target);
    }

    /// Call `target` on behalf of `outbox`, exposing it as the active outbox
    fn execute_call(&self, outbox: &Outbox, target: Address, data: &[u8], now: u64) -> GtResult<()> {
        if !self.allowed_outboxes.read().contains(&outbox.address) {
            return Err(RelayError::OutboxNotAllowed(outbox.address).into());
        }
        let target = self.targets.get(target)?;
        let ctx = CallContext::relayed(self.address, now, outbox);
        target.handle(&ctx, data)
    }
}

/// Settlement-domain outbox executing exit messages
pub struct Outbox {
    address: Address,
    bridge: Arc<Bridge>,
    log: Arc<ExitLog>,
    challenge_period_secs: u64,
    spent: Mutex<HashSet<u64>>,
    l2_to_l1_sender: RwLock<Option<Address>>,
    execution: Mutex<()>,
}

impl Outbox {
    pub fn new(
        address: Address,
        bridge: Arc<Bridge>,
        log: Arc<ExitLog>,
        challenge_period_secs: u64,
    ) -> Self {
        Self {
            address,
            bridge,
            log,
            challenge_period_secs,
            spent: Mutex::new(HashSet::new()),
            l2_to_l1_sender: RwLock::new(None),
            execution: Mutex::new(()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// `l2ToL1Sender()`: the exit's source sender while it executes
    pub fn l2_to_l1_sender(&self) -> Option<Address> {
        *self.l2_to_l1_sender.read()
    }

    /// Execute a payload as if proven to originate from `l2_sender`, bypassing
    /// the exit log.
    #[cfg(test)]
    pub(crate) fn execute(&self, target: Address, data: &[u8], l2_sender: Address, now: u64) -> GtResult<()> {
        let _execution = self.execution.lock();
        self.execute_locked(target, data, l2_sender, now)
    }

    /// Execute the recorded exit at `position` once its challenge period passed
    pub fn execute_transaction(&self, position: u64, now: u64) -> GtResult<()> {
        let message = self
            .log
            .get(position)
            .ok_or(RelayError::UnknownExit(position))?;

        let _execution = self.execution.lock();

        let executable_at = self.executable_at(&message);
        if now < executable_at {
            return Err(RelayError::NotExecutable {
                position,
                executable_at,
            }
            .into());
        }
        if self.spent.lock().contains(&position) {
            return Err(RelayError::AlreadySpent(position).into());
        }

        match self.execute_locked(message.target, &message.data, message.sender, now) {
            Ok(()) => {
                self.spent.lock().insert(position);
                debug!(position = position, message_id = %message.id, "Exit executed");
                Ok(())
            }
            Err(e) => {
                warn!(position = position, error = %e, "Exit execution reverted");
                Err(e)
            }
        }
    }

    pub fn is_spent(&self, position: u64) -> bool {
        self.spent.lock().contains(&position)
    }

    fn execute_locked(&self, target: Address, data: &[u8], l2_sender: Address, now: u64) -> GtResult<()> {
        *self.l2_to_l1_sender.write() = Some(l2_sender);
        let result = self.bridge.execute_call(self, target, data, now);
        *self.l2_to_l1_sender.write() = None;
        result
    }

    fn executable_at(&self, message: &RelayMessage) -> u64 {
        message.sent_at.saturating_add(self.challenge_period_secs)
    }
}

impl OriginSender for Outbox {
    fn origin_sender(&self) -> Option<Address> {
        self.l2_to_l1_sender()
    }
}

impl DeferredRelay for Outbox {
    fn due_messages(&self, now: u64) -> Vec<RelayMessage> {
        let spent = self.spent.lock().clone();
        self.log
            .all()
            .into_iter()
            .filter(|m| !spent.contains(&m.nonce) && self.executable_at(m) <= now)
            .collect()
    }

    fn deliver(&self, message: &RelayMessage, now: u64) -> GtResult<()> {
        self.execute_transaction(message.nonce, now)
    }

    fn acknowledge(&self, message_id: Uuid) {
        // A dropped exit is marked spent so the relayer stops retrying it.
        if let Some(message) = self.log.all().into_iter().find(|m| m.id == message_id) {
            self.spent.lock().insert(message.nonce);
        }
    }

    fn pending_count(&self) -> usize {
        let spent = self.spent.lock();
        self.log.all().iter().filter(|m| !spent.contains(&m.nonce)).count()
    }
}
