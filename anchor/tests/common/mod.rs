//! Common test utilities for integration tests

pub mod fixtures;
pub mod harness;

pub use fixtures::{sample_fields, CredentialFixture, HOLDER, ISSUER_KEY, OTHER_KEY};
pub use harness::Deployment;
