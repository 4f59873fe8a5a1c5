//! Settlement-domain anchor registry
//!
//! Write-once store of minted content hashes. Entries only come in through
//! the configured transport, and only when the transport reports the
//! authorized issuing-domain contract as the origin sender.
//!
//! Checks run in a fixed order:
//! 1. immediate caller is the transport endpoint (`NotFromTransport`)
//! 2. origin sender is the authorized ledger (`NotFromAuthorizedOriginSender`)
//! 3. content hash not yet anchored (`AlreadyAnchored`)

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::abi;
use crate::domain::CallContext;
use crate::error::{AuthorizationError, ConfigError, GtResult, ReplayError};
use crate::relay::RelayTarget;
use crate::types::{AnchorEntry, AnchorRequest, ContentHash, RegistryEvent, RelayConfiguration};

#[derive(Default)]
struct RegistryState {
    config: Option<RelayConfiguration>,
    locked: bool,
    anchors: HashMap<ContentHash, AnchorEntry>,
    events: Vec<RegistryEvent>,
}

/// Cross-domain anchor registry
pub struct AnchorRegistry {
    address: Address,
    admin: Address,
    /// Endpoint fixed at deployment (bridge model)
    fixed_endpoint: Option<Address>,
    state: RwLock<RegistryState>,
}

impl AnchorRegistry {
    /// Unconfigured registry; every relayed call fails until `set_config`
    pub fn new(address: Address, admin: Address) -> Self {
        Self {
            address,
            admin,
            fixed_endpoint: None,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Registry configured at deployment
    pub fn with_config(address: Address, admin: Address, endpoint: Address, origin: Address) -> Self {
        let registry = Self::new(address, admin);
        registry.state.write().config = Some(RelayConfiguration {
            transport_endpoint: endpoint,
            authorized_origin_sender: origin,
        });
        registry
    }

    /// Registry behind a bridge; only the origin sender is configurable
    pub fn for_bridge(address: Address, admin: Address, bridge: Address) -> Self {
        let mut registry = Self::new(address, admin);
        registry.fixed_endpoint = Some(bridge);
        registry.state.write().config = Some(RelayConfiguration {
            transport_endpoint: bridge,
            authorized_origin_sender: Address::ZERO,
        });
        registry
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Replace the transport endpoint and authorized origin sender
    pub fn set_config(&self, ctx: &CallContext<'_>, endpoint: Address, origin: Address) -> GtResult<()> {
        self.require_admin(ctx)?;

        if let Some(fixed) = self.fixed_endpoint {
            if fixed != endpoint {
                return Err(ConfigError::InvalidValue {
                    field: "transport_endpoint".to_string(),
                    message: format!("endpoint is fixed to bridge {}", fixed),
                }
                .into());
            }
        }

        self.write_config(RelayConfiguration {
            transport_endpoint: endpoint,
            authorized_origin_sender: origin,
        })
    }

    /// Replace only the authorized origin sender
    pub fn set_origin_sender(&self, ctx: &CallContext<'_>, origin: Address) -> GtResult<()> {
        self.require_admin(ctx)?;

        let endpoint = self
            .fixed_endpoint
            .or_else(|| self.config().map(|c| c.transport_endpoint))
            .ok_or(ConfigError::NotConfigured)?;

        self.write_config(RelayConfiguration {
            transport_endpoint: endpoint,
            authorized_origin_sender: origin,
        })
    }

    /// Freeze the relay configuration for good
    pub fn lock_config(&self, ctx: &CallContext<'_>) -> GtResult<()> {
        self.require_admin(ctx)?;

        let mut state = self.state.write();
        if state.config.is_none() {
            return Err(ConfigError::NotConfigured.into());
        }
        if !state.locked {
            state.locked = true;
            state.events.push(RegistryEvent::ConfigLocked);
            info!(registry = %self.address, "Relay configuration locked");
        }
        Ok(())
    }

    pub fn is_config_locked(&self) -> bool {
        self.state.read().locked
    }

    /// Anchor a mint relayed from the issuing domain
    pub fn record_mint(&self, ctx: &CallContext<'_>, request: &AnchorRequest) -> GtResult<()> {
        let mut state = self.state.write();

        let config = match state.config {
            Some(config) if !config.transport_endpoint.is_zero() && ctx.caller == config.transport_endpoint => {
                config
            }
            _ => {
                warn!(caller = %ctx.caller, content_hash = %request.content_hash, "Anchor rejected: not from transport");
                return Err(AuthorizationError::NotFromTransport { caller: ctx.caller }.into());
            }
        };

        let origin = ctx.origin_sender();
        let authorized = config.authorized_origin_sender;
        if authorized.is_zero() || origin != Some(authorized) {
            warn!(
                origin = ?origin,
                content_hash = %request.content_hash,
                "Anchor rejected: not from authorized origin sender"
            );
            return Err(AuthorizationError::NotFromAuthorizedOriginSender { origin }.into());
        }

        if state.anchors.contains_key(&request.content_hash) {
            warn!(content_hash = %request.content_hash, "Anchor rejected: already anchored");
            return Err(ReplayError::AlreadyAnchored(request.content_hash).into());
        }

        state.anchors.insert(
            request.content_hash,
            AnchorEntry {
                to: request.to,
                amount: request.amount,
                epoch_index: request.epoch_index,
                type_code: request.type_code,
                quantity: request.quantity,
                timestamp: ctx.timestamp,
            },
        );
        state.events.push(RegistryEvent::MintAnchored {
            content_hash: request.content_hash,
            to: request.to,
            amount: request.amount,
            epoch_index: request.epoch_index,
            type_code: request.type_code,
            quantity: request.quantity,
        });

        info!(
            content_hash = %request.content_hash,
            to = %request.to,
            amount = %request.amount,
            "Mint anchored"
        );
        Ok(())
    }

    pub fn is_anchored(&self, content_hash: ContentHash) -> bool {
        self.state.read().anchors.contains_key(&content_hash)
    }

    pub fn anchor_info(&self, content_hash: ContentHash) -> Option<AnchorEntry> {
        self.state.read().anchors.get(&content_hash).cloned()
    }

    pub fn anchored_count(&self) -> usize {
        self.state.read().anchors.len()
    }

    /// Sum of anchored amounts, saturating at `U256::MAX`
    pub fn anchored_supply(&self) -> U256 {
        self.state
            .read()
            .anchors
            .values()
            .fold(U256::ZERO, |acc, entry| acc.saturating_add(entry.amount))
    }

    pub fn config(&self) -> Option<RelayConfiguration> {
        self.state.read().config
    }

    pub fn events(&self) -> Vec<RegistryEvent> {
        self.state.read().events.clone()
    }

    fn write_config(&self, config: RelayConfiguration) -> GtResult<()> {
        let mut state = self.state.write();
        if state.locked {
            return Err(AuthorizationError::ConfigLocked.into());
        }
        state.config = Some(config);
        state.events.push(RegistryEvent::ConfigUpdated(config));

        info!(
            endpoint = %config.transport_endpoint,
            origin = %config.authorized_origin_sender,
            "Relay configuration updated"
        );
        Ok(())
    }

    fn require_admin(&self, ctx: &CallContext<'_>) -> GtResult<()> {
        if ctx.caller != self.admin {
            return Err(AuthorizationError::NotAdmin { caller: ctx.caller }.into());
        }
        Ok(())
    }
}

impl RelayTarget for AnchorRegistry {
    fn address(&self) -> Address {
        self.address
    }

    fn handle(&self, ctx: &CallContext<'_>, data: &[u8]) -> GtResult<()> {
        let request = abi::decode_record_mint(data)?;
        self.record_mint(ctx, &request)
    }
}
