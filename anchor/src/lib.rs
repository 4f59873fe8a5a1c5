//! GreenToken anchor node
//!
//! Credential-gated minting on an issuing domain, with every mint anchored
//! once in a write-once registry on a settlement domain through an
//! authenticated cross-domain relay.

pub mod abi;
pub mod api;
pub mod canon;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod ledger;
pub mod messenger;
pub mod node;
pub mod outbox;
pub mod registry;
pub mod relay;
pub mod service;
pub mod types;
pub mod verifier;


pub use config::{NodeConfig, RelayModel, VerifierScheme};
pub use error::{GtError, GtResult};
pub use health::{HealthServer, HealthState};
pub use ledger::MintLedger;
pub use node::AnchorNode;
pub use registry::AnchorRegistry;
pub use service::RelayerService;
pub use types::*;
