//! Configuration for the anchor node

use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::messenger::DeliveryMode;

/// Which credential verifier guards the mint ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifierScheme {
    /// Issuer signature over the full mint digest
    #[default]
    IssuerSignature,
    /// Issuer signature over a disclosure of the public fields
    SelectiveDisclosure,
}

impl VerifierScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifierScheme::IssuerSignature => "issuer-signature",
            VerifierScheme::SelectiveDisclosure => "selective-disclosure",
        }
    }
}

impl FromStr for VerifierScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "issuer-signature" | "issuer_signature" | "demo" => Ok(VerifierScheme::IssuerSignature),
            "selective-disclosure" | "selective_disclosure" | "sd" => {
                Ok(VerifierScheme::SelectiveDisclosure)
            }
            other => Err(anyhow::anyhow!("unknown verifier scheme: {}", other)),
        }
    }
}

/// Transport between the issuing and settlement domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayModel {
    /// Cross-domain messenger exposing the origin sender
    #[default]
    Messenger,
    /// Exit messages executed through an outbox and bridge
    Outbox,
}

impl RelayModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayModel::Messenger => "messenger",
            RelayModel::Outbox => "outbox",
        }
    }
}

impl FromStr for RelayModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "messenger" => Ok(RelayModel::Messenger),
            "outbox" | "bridge" => Ok(RelayModel::Outbox),
            other => Err(anyhow::anyhow!("unknown relay model: {}", other)),
        }
    }
}

/// Anchor node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address whose signatures the verifier accepts
    pub issuer_address: Address,

    /// Administrator of the ledger, verifier and registry
    pub admin_address: Address,

    #[serde(default)]
    pub verifier_scheme: VerifierScheme,

    #[serde(default)]
    pub relay_model: RelayModel,

    /// Messenger delivery mode (messenger model only)
    #[serde(default)]
    pub delivery_mode: DeliveryMode,

    /// Relayer poll interval in seconds
    #[serde(default = "default_relay_interval")]
    pub relay_interval_secs: u64,

    /// Messenger delivery delay in seconds
    #[serde(default)]
    pub relay_delay_secs: u64,

    /// Outbox challenge period in seconds
    #[serde(default)]
    pub challenge_period_secs: u64,

    /// Maximum delivery attempts per message and cycle
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry delay in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Gas budget attached to relayed anchor calls
    #[serde(default = "default_gas_limit")]
    pub relay_gas_limit: u64,

    #[serde(default = "default_token_name")]
    pub token_name: String,

    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,

    /// Type allow-list (`None` allows every type)
    #[serde(default)]
    pub allowed_type_codes: Option<Vec<u16>>,

    /// Lock the registry configuration after wiring
    #[serde(default)]
    pub lock_registry_config: bool,

    /// HTTP port for health and API endpoints
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_relay_interval() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}

fn default_gas_limit() -> u64 {
    1_000_000
}

fn default_token_name() -> String {
    "GreenToken".to_string()
}

fn default_token_symbol() -> String {
    "GT".to_string()
}

fn default_http_port() -> u16 {
    9090
}

fn parse_address(name: &str, value: &str) -> Result<Address, ConfigError> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| ConfigError::InvalidAddress(format!("{}: {}", name, e)))
}

/// Parse an optional variable; a present but malformed value is an error
fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|e| ConfigError::InvalidValue {
            field: name.to_string(),
            message: format!("{:?}: {}", raw, e),
        }),
        Err(_) => Ok(None),
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn parse_type_codes(value: &str) -> anyhow::Result<Vec<u16>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>()
                .map_err(|e| anyhow::anyhow!("invalid type code {:?}: {}", s, e))
        })
        .collect()
}

impl NodeConfig {
    /// Configuration with defaults for everything but the issuer and admin
    pub fn new(issuer_address: Address, admin_address: Address) -> Self {
        Self {
            issuer_address,
            admin_address,
            verifier_scheme: VerifierScheme::default(),
            relay_model: RelayModel::default(),
            delivery_mode: DeliveryMode::default(),
            relay_interval_secs: default_relay_interval(),
            relay_delay_secs: 0,
            challenge_period_secs: 0,
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            relay_gas_limit: default_gas_limit(),
            token_name: default_token_name(),
            token_symbol: default_token_symbol(),
            allowed_type_codes: None,
            lock_registry_config: false,
            http_port: default_http_port(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let issuer_address = std::env::var("ISSUER_ADDRESS")
            .map_err(|_| ConfigError::MissingEnvVar("ISSUER_ADDRESS".to_string()))
            .and_then(|v| parse_address("ISSUER_ADDRESS", &v))?;

        let admin_address = match std::env::var("ADMIN_ADDRESS") {
            Ok(v) => parse_address("ADMIN_ADDRESS", &v)?,
            Err(_) => issuer_address,
        };

        let verifier_scheme = match std::env::var("VERIFIER_SCHEME") {
            Ok(v) => v.parse()?,
            Err(_) => VerifierScheme::default(),
        };

        let relay_model = match std::env::var("RELAY_MODEL") {
            Ok(v) => v.parse()?,
            Err(_) => RelayModel::default(),
        };

        let delivery_mode = match std::env::var("DELIVERY_MODE").ok().as_deref().map(str::trim) {
            None | Some("deferred") => DeliveryMode::Deferred,
            Some("sync") | Some("synchronous") => DeliveryMode::Synchronous,
            Some(other) => return Err(invalid("DELIVERY_MODE", other).into()),
        };

        let allowed_type_codes = match std::env::var("ALLOWED_TYPE_CODES") {
            Ok(v) if !v.trim().is_empty() => Some(parse_type_codes(&v)?),
            _ => None,
        };

        Ok(Self {
            issuer_address,
            admin_address,
            verifier_scheme,
            relay_model,
            delivery_mode,
            relay_interval_secs: env_parse("RELAY_INTERVAL_SECS")?
                .unwrap_or_else(default_relay_interval),
            relay_delay_secs: env_parse("RELAY_DELAY_SECS")?.unwrap_or(0),
            challenge_period_secs: env_parse("CHALLENGE_PERIOD_SECS")?.unwrap_or(0),
            max_retries: env_parse("MAX_RETRIES")?.unwrap_or_else(default_max_retries),
            retry_delay_secs: env_parse("RETRY_DELAY_SECS")?.unwrap_or_else(default_retry_delay),
            relay_gas_limit: env_parse("RELAY_GAS_LIMIT")?.unwrap_or_else(default_gas_limit),
            token_name: std::env::var("TOKEN_NAME").unwrap_or_else(|_| default_token_name()),
            token_symbol: std::env::var("TOKEN_SYMBOL").unwrap_or_else(|_| default_token_symbol()),
            allowed_type_codes,
            lock_registry_config: env_parse("LOCK_REGISTRY_CONFIG")?.unwrap_or(false),
            http_port: env_parse("HTTP_PORT")?.unwrap_or_else(default_http_port),
        })
    }

    /// Check invariants `from_env` cannot express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.issuer_address.is_zero() {
            return Err(invalid("ISSUER_ADDRESS", "must not be the zero address").into());
        }
        if self.admin_address.is_zero() {
            return Err(invalid("ADMIN_ADDRESS", "must not be the zero address").into());
        }
        if self.relay_gas_limit == 0 {
            return Err(invalid("RELAY_GAS_LIMIT", "must be positive").into());
        }
        if self.relay_interval_secs == 0 {
            return Err(invalid("RELAY_INTERVAL_SECS", "must be positive").into());
        }
        if self.relay_model == RelayModel::Outbox && self.delivery_mode == DeliveryMode::Synchronous {
            return Err(invalid(
                "DELIVERY_MODE",
                "synchronous delivery requires the messenger relay model",
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schemes() {
        assert_eq!("issuer-signature".parse::<VerifierScheme>().unwrap(), VerifierScheme::IssuerSignature);
        assert_eq!("SD".parse::<VerifierScheme>().unwrap(), VerifierScheme::SelectiveDisclosure);
        assert!("zk".parse::<VerifierScheme>().is_err());

        assert_eq!("bridge".parse::<RelayModel>().unwrap(), RelayModel::Outbox);
        assert!("carrier-pigeon".parse::<RelayModel>().is_err());
    }

    #[test]
    fn test_parse_type_codes() {
        assert_eq!(parse_type_codes("0, 1,2,").unwrap(), vec![0, 1, 2]);
        assert!(parse_type_codes("1,solar").is_err());
    }

    #[test]
    fn test_validate() {
        let issuer = Address::repeat_byte(1);
        let config = NodeConfig::new(issuer, issuer);
        assert!(config.validate().is_ok());

        let mut outbox_sync = config.clone();
        outbox_sync.relay_model = RelayModel::Outbox;
        outbox_sync.delivery_mode = DeliveryMode::Synchronous;
        assert!(outbox_sync.validate().is_err());

        let mut zero = config;
        zero.issuer_address = Address::ZERO;
        let err = zero.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidValue { field, .. }) if field == "ISSUER_ADDRESS"
        ));
    }
}
