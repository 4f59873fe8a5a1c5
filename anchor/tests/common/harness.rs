//! Two-domain deployment driven by a manual clock

use std::sync::Arc;

use alloy::primitives::{address, Address, U256};
use axum::Router;
use tokio::sync::RwLock;

use gt_anchor::config::{NodeConfig, RelayModel, VerifierScheme};
use gt_anchor::domain::{CallContext, Clock, ManualClock};
use gt_anchor::error::GtResult;
use gt_anchor::messenger::DeliveryMode;
use gt_anchor::relay::RelayMessage;
use gt_anchor::types::{MintRequest, RelayerStats};
use gt_anchor::{api, health, AnchorNode, HealthState, RelayerService};

use super::fixtures::CredentialFixture;

/// Unix time every deployment starts at
pub const GENESIS: u64 = 1_760_000_000;

pub const ADMIN: Address = address!("adadadadadadadadadadadadadadadadadadadad");

pub struct Deployment {
    pub node: Arc<AnchorNode>,
    pub clock: Arc<ManualClock>,
    pub config: NodeConfig,
    pub credentials: CredentialFixture,
}

impl Deployment {
    pub fn new(model: RelayModel, mode: DeliveryMode, scheme: VerifierScheme) -> Self {
        Self::with_config(model, mode, scheme, |_| {})
    }

    pub fn with_config(
        model: RelayModel,
        mode: DeliveryMode,
        scheme: VerifierScheme,
        customize: impl FnOnce(&mut NodeConfig),
    ) -> Self {
        let credentials = CredentialFixture::issuer();
        let mut config = NodeConfig::new(credentials.address(), ADMIN);
        config.relay_model = model;
        config.delivery_mode = mode;
        config.verifier_scheme = scheme;
        config.retry_delay_secs = 0;
        customize(&mut config);

        let clock = Arc::new(ManualClock::new(GENESIS));
        let node = AnchorNode::build(config.clone(), clock.clone()).expect("deployment wires");

        Self {
            node: Arc::new(node),
            clock,
            config,
            credentials,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn admin(&self) -> CallContext<'static> {
        CallContext::new(ADMIN, self.now())
    }

    pub fn mint(&self, holder: Address, request: &MintRequest) -> GtResult<U256> {
        self.node.mint(holder, request)
    }

    /// Messages the deferred transport would deliver now
    pub fn due(&self) -> Vec<RelayMessage> {
        self.node
            .deferred_relay()
            .map(|relay| relay.due_messages(self.now()))
            .unwrap_or_default()
    }

    /// Deliver every due message once, settling the successful ones
    pub fn relay_due(&self) -> Vec<GtResult<()>> {
        let Some(relay) = self.node.deferred_relay() else {
            return Vec::new();
        };
        relay
            .due_messages(self.now())
            .iter()
            .map(|message| {
                let result = relay.deliver(message, self.now());
                if result.is_ok() {
                    relay.acknowledge(message.id);
                }
                result
            })
            .collect()
    }

    pub fn relayer(&self) -> RelayerService {
        let relay = self.node.deferred_relay().expect("deferred transport");
        RelayerService::new(self.config.clone(), relay, self.clock.clone())
    }

    /// Full HTTP surface: probes, metrics and the mint API
    pub fn router(&self) -> (Router, Arc<HealthState>) {
        let stats = Arc::new(RwLock::new(RelayerStats::default()));
        let state = Arc::new(HealthState::new(Arc::clone(&self.node), stats));
        let router = health::create_router(Arc::clone(&state)).merge(api::router(Arc::clone(&self.node)));
        (router, state)
    }
}
