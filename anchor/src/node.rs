//! Wiring of one deployment: verifier, ledger, transport and registry

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::info;

use crate::config::{NodeConfig, RelayModel, VerifierScheme};
use crate::domain::{component_address, CallContext, Clock};
use crate::error::GtResult;
use crate::ledger::{LedgerSettings, MintLedger};
use crate::messenger::{CrossDomainMessenger, DeliveryMode};
use crate::outbox::{ArbSys, Bridge, ExitLog, Outbox};
use crate::registry::AnchorRegistry;
use crate::relay::{DeferredRelay, MessageRelay};
use crate::types::MintRequest;
use crate::verifier::{CredentialVerifier, IssuerSignatureVerifier, SelectiveDisclosureVerifier};

/// Deterministic component addresses
pub mod labels {
    pub const LEDGER: &str = "gt.ledger";
    pub const VERIFIER: &str = "gt.verifier";
    pub const REGISTRY: &str = "gt.anchor-registry";
    pub const MESSENGER: &str = "gt.messenger";
    pub const BRIDGE: &str = "gt.bridge";
    pub const OUTBOX: &str = "gt.outbox";
}

/// Transport components of the configured relay model
#[derive(Clone)]
pub enum Transport {
    Messenger(Arc<CrossDomainMessenger>),
    Outbox {
        arb_sys: Arc<ArbSys>,
        bridge: Arc<Bridge>,
        outbox: Arc<Outbox>,
    },
}

impl Transport {
    /// Settlement-domain address the registry must see as immediate caller
    pub fn endpoint(&self) -> Address {
        match self {
            Transport::Messenger(messenger) => messenger.address(),
            Transport::Outbox { bridge, .. } => bridge.address(),
        }
    }

    fn source(&self) -> Arc<dyn MessageRelay> {
        match self {
            Transport::Messenger(messenger) => messenger.clone() as Arc<dyn MessageRelay>,
            Transport::Outbox { arb_sys, .. } => arb_sys.clone(),
        }
    }
}

/// A wired deployment across both domains
pub struct AnchorNode {
    config: NodeConfig,
    clock: Arc<dyn Clock>,
    verifier: Arc<dyn CredentialVerifier>,
    ledger: Arc<MintLedger>,
    registry: Arc<AnchorRegistry>,
    transport: Transport,
}

impl AnchorNode {
    pub fn build(config: NodeConfig, clock: Arc<dyn Clock>) -> GtResult<Self> {
        let admin = config.admin_address;
        let verifier_address = component_address(labels::VERIFIER);
        let ledger_address = component_address(labels::LEDGER);
        let registry_address = component_address(labels::REGISTRY);

        let verifier: Arc<dyn CredentialVerifier> = match config.verifier_scheme {
            VerifierScheme::IssuerSignature => {
                Arc::new(IssuerSignatureVerifier::new(admin, config.issuer_address))
            }
            VerifierScheme::SelectiveDisclosure => {
                Arc::new(SelectiveDisclosureVerifier::new(admin, config.issuer_address))
            }
        };

        let admin_ctx = CallContext::new(admin, clock.now());

        let (transport, registry) = match config.relay_model {
            RelayModel::Messenger => {
                let messenger = Arc::new(
                    CrossDomainMessenger::new(component_address(labels::MESSENGER), config.delivery_mode)
                        .with_delivery_delay(config.relay_delay_secs),
                );
                let registry = Arc::new(AnchorRegistry::new(registry_address, admin));
                registry.set_config(&admin_ctx, messenger.address(), ledger_address)?;
                messenger.register_target(registry.clone());
                (Transport::Messenger(messenger), registry)
            }
            RelayModel::Outbox => {
                let log = Arc::new(ExitLog::new());
                let bridge = Arc::new(Bridge::new(component_address(labels::BRIDGE)));
                let outbox = Arc::new(Outbox::new(
                    component_address(labels::OUTBOX),
                    Arc::clone(&bridge),
                    Arc::clone(&log),
                    config.challenge_period_secs,
                ));
                bridge.set_outbox(outbox.address(), true);

                let registry = Arc::new(AnchorRegistry::for_bridge(registry_address, admin, bridge.address()));
                registry.set_origin_sender(&admin_ctx, ledger_address)?;
                bridge.register_target(registry.clone());

                let transport = Transport::Outbox {
                    arb_sys: Arc::new(ArbSys::new(log)),
                    bridge,
                    outbox,
                };
                (transport, registry)
            }
        };

        if config.lock_registry_config {
            registry.lock_config(&admin_ctx)?;
        }

        let ledger = Arc::new(MintLedger::new(
            LedgerSettings {
                address: ledger_address,
                admin,
                name: config.token_name.clone(),
                symbol: config.token_symbol.clone(),
                anchor: registry_address,
                relay_gas_limit: config.relay_gas_limit,
            },
            Arc::clone(&verifier),
            transport.source(),
        ));

        if let Some(types) = &config.allowed_type_codes {
            for type_code in types {
                ledger.set_allowed_type(&admin_ctx, *type_code, true)?;
            }
        }

        info!(
            ledger = %ledger_address,
            registry = %registry_address,
            verifier = %verifier_address,
            endpoint = %transport.endpoint(),
            scheme = verifier.scheme(),
            relay_model = config.relay_model.as_str(),
            "Deployment wired"
        );

        Ok(Self {
            config,
            clock,
            verifier,
            ledger,
            registry,
            transport,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn verifier(&self) -> Arc<dyn CredentialVerifier> {
        Arc::clone(&self.verifier)
    }

    pub fn ledger(&self) -> Arc<MintLedger> {
        Arc::clone(&self.ledger)
    }

    pub fn registry(&self) -> Arc<AnchorRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Queue a relayer drains; `None` when the messenger delivers synchronously
    pub fn deferred_relay(&self) -> Option<Arc<dyn DeferredRelay>> {
        match &self.transport {
            Transport::Messenger(messenger) if messenger.mode() == DeliveryMode::Synchronous => None,
            Transport::Messenger(messenger) => Some(messenger.clone() as Arc<dyn DeferredRelay>),
            Transport::Outbox { outbox, .. } => Some(outbox.clone() as Arc<dyn DeferredRelay>),
        }
    }

    /// Mint as `holder` at the current domain time
    pub fn mint(&self, holder: Address, request: &MintRequest) -> GtResult<U256> {
        let ctx = CallContext::new(holder, self.now());
        self.ledger.mint(&ctx, request)
    }
}
