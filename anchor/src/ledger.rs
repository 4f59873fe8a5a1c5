//! Issuing-domain mint ledger
//!
//! Credits GreenToken against a verified credential at most once per content
//! hash and hands a `recordMint` call for the anchor registry to the relay.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::abi;
use crate::domain::CallContext;
use crate::error::{AuthorizationError, CredentialError, GtResult, LedgerError, ReplayError};
use crate::relay::{MessageRelay, RelayReceipt};
use crate::types::{AnchorRequest, ContentHash, LedgerEvent, MintRecord, MintRequest};
use crate::verifier::{CredentialRequest, CredentialVerifier};

/// Token decimals
pub const DECIMALS: u8 = 18;

/// Static wiring of a ledger
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Address of the ledger contract itself (the relay's origin sender)
    pub address: Address,
    pub admin: Address,
    pub name: String,
    pub symbol: String,
    /// Anchor registry on the settlement domain
    pub anchor: Address,
    /// Gas budget attached to each relayed `recordMint`
    pub relay_gas_limit: u64,
}

#[derive(Default)]
struct LedgerState {
    /// Usage set, keyed by content hash
    records: HashMap<ContentHash, MintRecord>,
    balances: HashMap<Address, U256>,
    total_supply: U256,
    /// `None` allows every type code
    allowed_types: Option<HashSet<u16>>,
    events: Vec<LedgerEvent>,
}

/// Credential-gated mint ledger
pub struct MintLedger {
    settings: LedgerSettings,
    verifier: RwLock<Arc<dyn CredentialVerifier>>,
    relay: Arc<dyn MessageRelay>,
    state: Mutex<LedgerState>,
}

impl MintLedger {
    pub fn new(
        settings: LedgerSettings,
        verifier: Arc<dyn CredentialVerifier>,
        relay: Arc<dyn MessageRelay>,
    ) -> Self {
        Self {
            settings,
            verifier: RwLock::new(verifier),
            relay,
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.settings.address
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn symbol(&self) -> &str {
        &self.settings.symbol
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
    }

    /// Anchor registry the ledger relays to
    pub fn anchor(&self) -> Address {
        self.settings.anchor
    }

    pub fn relay_endpoint(&self) -> Address {
        self.relay.endpoint()
    }

    pub fn verifier(&self) -> Arc<dyn CredentialVerifier> {
        Arc::clone(&self.verifier.read())
    }

    /// Mint `request.fields.quantity` to the caller.
    ///
    /// Checks, in order: expiry, content-hash reuse, type allow-list,
    /// credential, supply overflow. All state changes happen only after the
    /// relay accepted the anchor message.
    pub fn mint(&self, ctx: &CallContext<'_>, request: &MintRequest) -> GtResult<U256> {
        let holder = ctx.caller;
        let fields = &request.fields;
        let content_hash = fields.content_hash();

        if request.expiry < ctx.timestamp {
            warn!(
                holder = %holder,
                content_hash = %content_hash,
                expiry = request.expiry,
                now = ctx.timestamp,
                "Mint rejected: credential expired"
            );
            return Err(CredentialError::Expired {
                expiry: request.expiry,
                now: ctx.timestamp,
            }
            .into());
        }

        let mut state = self.state.lock();

        if state.records.contains_key(&content_hash) {
            warn!(holder = %holder, content_hash = %content_hash, "Mint rejected: duplicate content hash");
            return Err(ReplayError::DuplicateContentHash(content_hash).into());
        }

        if let Some(allowed) = &state.allowed_types {
            if !allowed.contains(&fields.type_code) {
                warn!(type_code = fields.type_code, "Mint rejected: type not allowed");
                return Err(CredentialError::TypeNotAllowed(fields.type_code).into());
            }
        }

        let verifier = self.verifier();
        let credential = CredentialRequest {
            holder,
            content_hash,
            fields,
            hidden_commitment: request.hidden_commitment,
            expiry: request.expiry,
            proof: &request.proof,
        };
        if !verifier.verify_request(&credential) {
            warn!(
                holder = %holder,
                content_hash = %content_hash,
                scheme = verifier.scheme(),
                "Mint rejected: invalid credential"
            );
            return Err(CredentialError::InvalidCredential.into());
        }

        let amount = fields.quantity;
        let balance = state.balances.get(&holder).copied().unwrap_or_default();
        let (Some(new_balance), Some(new_supply)) = (
            balance.checked_add(amount),
            state.total_supply.checked_add(amount),
        ) else {
            warn!(holder = %holder, content_hash = %content_hash, amount = %amount, "Mint rejected: supply overflow");
            return Err(LedgerError::SupplyOverflow { amount }.into());
        };

        let receipt = self.dispatch_anchor(ctx, content_hash, holder, amount, request)?;

        state.records.insert(
            content_hash,
            MintRecord {
                holder,
                content_hash,
                amount,
                fields: *fields,
                timestamp: ctx.timestamp,
                message_id: receipt.message_id,
            },
        );
        state.balances.insert(holder, new_balance);
        state.total_supply = new_supply;
        state.events.push(LedgerEvent::Minted {
            to: holder,
            content_hash,
            epoch_index: fields.epoch_index,
            type_code: fields.type_code,
            quantity: fields.quantity,
            amount,
        });

        info!(
            holder = %holder,
            content_hash = %content_hash,
            amount = %amount,
            message_id = %receipt.message_id,
            relay_status = ?receipt.status,
            "Minted"
        );

        Ok(amount)
    }

    fn dispatch_anchor(
        &self,
        ctx: &CallContext<'_>,
        content_hash: ContentHash,
        holder: Address,
        amount: U256,
        request: &MintRequest,
    ) -> GtResult<RelayReceipt> {
        let call = abi::encode_record_mint(&AnchorRequest {
            content_hash,
            to: holder,
            amount,
            epoch_index: request.fields.epoch_index,
            type_code: request.fields.type_code,
            quantity: request.fields.quantity,
        });

        let sender = CallContext::new(self.settings.address, ctx.timestamp);
        debug!(content_hash = %content_hash, anchor = %self.settings.anchor, "Dispatching anchor message");
        self.relay.send_message(
            &sender,
            self.settings.anchor,
            call.into(),
            self.settings.relay_gas_limit,
        )
    }

    /// ERC-20 style transfer from the caller
    pub fn transfer(&self, ctx: &CallContext<'_>, to: Address, amount: U256) -> GtResult<()> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress.into());
        }

        let mut state = self.state.lock();
        let available = state.balances.get(&ctx.caller).copied().unwrap_or_default();
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            }
            .into());
        }

        state.balances.insert(ctx.caller, available - amount);
        *state.balances.entry(to).or_default() += amount;
        state.events.push(LedgerEvent::Transfer {
            from: ctx.caller,
            to,
            amount,
        });
        Ok(())
    }

    /// Allow or disallow a type code; the first call switches the allow-list on
    pub fn set_allowed_type(&self, ctx: &CallContext<'_>, type_code: u16, allowed: bool) -> GtResult<()> {
        self.require_admin(ctx)?;

        let mut state = self.state.lock();
        let types = state.allowed_types.get_or_insert_with(HashSet::new);
        if allowed {
            types.insert(type_code);
        } else {
            types.remove(&type_code);
        }
        state.events.push(LedgerEvent::AllowedTypeSet { type_code, allowed });

        info!(type_code = type_code, allowed = allowed, "Allowed type updated");
        Ok(())
    }

    /// Replace the credential verifier
    pub fn set_verifier(&self, ctx: &CallContext<'_>, verifier: Arc<dyn CredentialVerifier>) -> GtResult<()> {
        self.require_admin(ctx)?;

        let event = LedgerEvent::VerifierUpdated {
            scheme: verifier.scheme().to_string(),
            issuer: verifier.issuer(),
        };
        info!(scheme = verifier.scheme(), issuer = %verifier.issuer(), "Verifier updated");
        *self.verifier.write() = verifier;
        self.state.lock().events.push(event);
        Ok(())
    }

    pub fn is_type_allowed(&self, type_code: u16) -> bool {
        self.state
            .lock()
            .allowed_types
            .as_ref()
            .map_or(true, |types| types.contains(&type_code))
    }

    /// Whether `content_hash` is in the usage set
    pub fn is_used(&self, content_hash: ContentHash) -> bool {
        self.state.lock().records.contains_key(&content_hash)
    }

    pub fn mint_record(&self, content_hash: ContentHash) -> Option<MintRecord> {
        self.state.lock().records.get(&content_hash).cloned()
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.state.lock().balances.get(&holder).copied().unwrap_or_default()
    }

    pub fn total_supply(&self) -> U256 {
        self.state.lock().total_supply
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.lock().events.clone()
    }

    fn require_admin(&self, ctx: &CallContext<'_>) -> GtResult<()> {
        if ctx.caller != self.settings.admin {
            return Err(AuthorizationError::NotAdmin { caller: ctx.caller }.into());
        }
        Ok(())
    }
}
