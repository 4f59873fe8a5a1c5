//! Execution context shared by both domains
//!
//! Each domain runs calls serially. A call sees the address of its
//! immediate caller, the domain time, and, when it arrives through a relay,
//! the transport's view of who sent it on the other domain.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{keccak256, Address};
use chrono::Utc;

use crate::relay::OriginSender;

/// Source of domain time (unix seconds)
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// Manually driven time for simulations and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Context of a single call executing on a domain
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    /// Immediate caller (`msg.sender`)
    pub caller: Address,

    /// Domain time at execution
    pub timestamp: u64,

    /// Transport the call arrived through, if any
    pub transport: Option<&'a dyn OriginSender>,
}

impl<'a> CallContext<'a> {
    /// A direct call from `caller`
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self {
            caller,
            timestamp,
            transport: None,
        }
    }

    /// A call executed by a transport on behalf of a sender on the other domain
    pub fn relayed(caller: Address, timestamp: u64, transport: &'a dyn OriginSender) -> Self {
        Self {
            caller,
            timestamp,
            transport: Some(transport),
        }
    }

    /// Origin-domain sender as reported by the transport for this call
    pub fn origin_sender(&self) -> Option<Address> {
        self.transport.and_then(|t| t.origin_sender())
    }
}

/// Stable address for a named component, derived from its label
pub fn component_address(label: &str) -> Address {
    Address::from_word(keccak256(label.as_bytes()))
}
