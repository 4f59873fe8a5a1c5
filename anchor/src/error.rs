//! Error types for issuance and anchoring
//!
//! Every rejection on either domain maps to exactly one variant below, so an
//! operator can tell a replay from a bad signature from a wrong relay path by
//! the error code alone.

use alloy::primitives::{Address, B256, U256};
use thiserror::Error;
use uuid::Uuid;

/// Main error type for the issuing and settlement domains
#[derive(Error, Debug)]
pub enum GtError {
    /// Credential errors (holder needs a fresh signed credential)
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Replay errors (permanent for the content hash)
    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    /// Authorization errors (misconfiguration or attack)
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    /// Relay transport errors
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// Ledger bookkeeping errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Credential-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Credential rejected by verifier")]
    InvalidCredential,

    #[error("Credential expired at {expiry}, current time {now}")]
    Expired { expiry: u64, now: u64 },

    #[error("Type code {0} is not allowed")]
    TypeNotAllowed(u16),
}

/// Replay-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Content hash {0} was already minted")]
    DuplicateContentHash(B256),

    #[error("Content hash {0} is already anchored")]
    AlreadyAnchored(B256),
}

/// Authorization-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Caller {caller} is not the configured transport endpoint")]
    NotFromTransport { caller: Address },

    #[error("Origin sender {origin:?} is not the authorized origin-domain sender")]
    NotFromAuthorizedOriginSender { origin: Option<Address> },

    #[error("Caller {caller} is not the administrator")]
    NotAdmin { caller: Address },

    #[error("Relay configuration is locked")]
    ConfigLocked,
}

/// Relay transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("No relay target registered at {0}")]
    UnknownTarget(Address),

    #[error("Gas limit {0} leaves no budget for the relayed call")]
    InsufficientGas(u64),

    #[error("Malformed relayed call: {0}")]
    MalformedCall(String),

    #[error("Message {0} was never sent or is no longer pending")]
    UnknownMessage(Uuid),

    #[error("Unknown exit message at position {0}")]
    UnknownExit(u64),

    #[error("Exit message {position} is not executable before {executable_at}")]
    NotExecutable { position: u64, executable_at: u64 },

    #[error("Exit message {0} was already executed")]
    AlreadySpent(u64),

    #[error("Outbox {0} is not allowed by the bridge")]
    OutboxNotAllowed(Address),
}

/// Ledger bookkeeping errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Transfer to the zero address")]
    ZeroAddress,

    #[error("Crediting {amount} would overflow the token supply")]
    SupplyOverflow { amount: U256 },
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid private key format")]
    InvalidPrivateKey,

    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    #[error("Relay configuration has not been set")]
    NotConfigured,
}

/// Broad class of an error, following the rejection taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Credential,
    Replay,
    Authorization,
    Transport,
    Request,
    Config,
    Internal,
}

/// Error severity levels for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Transient errors that may resolve on retry
    Transient,
    /// Errors requiring attention but not critical
    Warning,
    /// Critical errors requiring immediate attention
    Critical,
    /// Fatal errors that prevent operation
    Fatal,
}

impl GtError {
    /// Get the class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            GtError::Credential(_) => ErrorClass::Credential,
            GtError::Replay(_) => ErrorClass::Replay,
            GtError::Authorization(_) => ErrorClass::Authorization,
            GtError::Relay(_) => ErrorClass::Transport,
            GtError::Ledger(_) => ErrorClass::Request,
            GtError::Config(_) => ErrorClass::Config,
            GtError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Get the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GtError::Credential(_) => ErrorSeverity::Warning,
            GtError::Replay(_) => ErrorSeverity::Warning,
            GtError::Authorization(_) => ErrorSeverity::Fatal,
            GtError::Relay(e) => e.severity(),
            GtError::Ledger(_) => ErrorSeverity::Warning,
            GtError::Config(_) => ErrorSeverity::Fatal,
            GtError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Transient)
    }

    /// Get a short error code for metrics/logging
    pub fn error_code(&self) -> &'static str {
        match self {
            GtError::Credential(CredentialError::InvalidCredential) => "INVALID_CREDENTIAL",
            GtError::Credential(CredentialError::Expired { .. }) => "EXPIRED",
            GtError::Credential(CredentialError::TypeNotAllowed(_)) => "TYPE_NOT_ALLOWED",
            GtError::Replay(ReplayError::DuplicateContentHash(_)) => "DUPLICATE_CONTENT_HASH",
            GtError::Replay(ReplayError::AlreadyAnchored(_)) => "ALREADY_ANCHORED",
            GtError::Authorization(AuthorizationError::NotFromTransport { .. }) => {
                "NOT_FROM_TRANSPORT"
            }
            GtError::Authorization(AuthorizationError::NotFromAuthorizedOriginSender { .. }) => {
                "NOT_FROM_AUTHORIZED_ORIGIN_SENDER"
            }
            GtError::Authorization(AuthorizationError::NotAdmin { .. }) => "NOT_ADMIN",
            GtError::Authorization(AuthorizationError::ConfigLocked) => "CONFIG_LOCKED",
            GtError::Relay(_) => "RELAY_ERROR",
            GtError::Ledger(_) => "LEDGER_ERROR",
            GtError::Config(_) => "CONFIG_ERROR",
            GtError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl RelayError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            RelayError::UnknownTarget(_) => ErrorSeverity::Critical,
            RelayError::InsufficientGas(_) => ErrorSeverity::Warning,
            RelayError::MalformedCall(_) => ErrorSeverity::Critical,
            RelayError::UnknownMessage(_) => ErrorSeverity::Warning,
            RelayError::UnknownExit(_) => ErrorSeverity::Warning,
            RelayError::NotExecutable { .. } => ErrorSeverity::Transient,
            RelayError::AlreadySpent(_) => ErrorSeverity::Warning,
            RelayError::OutboxNotAllowed(_) => ErrorSeverity::Fatal,
        }
    }
}

/// Result type alias using GtError
pub type GtResult<T> = std::result::Result<T, GtError>;

/// Extension trait for converting foreign errors to GtError
pub trait ResultExt<T> {
    /// Convert to GtError with context
    fn gt_context(self, context: &str) -> GtResult<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn gt_context(self, context: &str) -> GtResult<T> {
        self.map_err(|e| GtError::Internal(format!("{}: {}", context, e)))
    }
}
