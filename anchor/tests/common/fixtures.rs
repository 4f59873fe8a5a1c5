//! Deterministic keys and credential builders

use alloy::primitives::{address, Address, Bytes, B256, U256};

use gt_anchor::canon;
use gt_anchor::types::{DisclosedFields, MintRequest};
use gt_anchor::verifier::{self, CredentialIssuer};

/// Anvil account #0, used as the credential issuer
pub const ISSUER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Anvil account #1, a key the verifier does not trust
pub const OTHER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub const HOLDER: Address = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

/// `{epoch 202540, type 1, 100 units, nonce 0}`
pub fn sample_fields() -> DisclosedFields {
    DisclosedFields::new(202540, 1, U256::from(100u64), 0)
}

/// Builds mint requests signed by a given key
pub struct CredentialFixture {
    pub issuer: CredentialIssuer,
    pub hidden_commitment: B256,
}

impl CredentialFixture {
    pub fn new(key: &str) -> Self {
        Self {
            issuer: CredentialIssuer::from_private_key(key).expect("valid test key"),
            hidden_commitment: canon::hidden_commitment(
                canon::label_hash("owner:alice"),
                canon::label_hash("meter:42"),
                canon::label_hash("site:rooftop-7"),
            ),
        }
    }

    pub fn issuer() -> Self {
        Self::new(ISSUER_KEY)
    }

    pub fn address(&self) -> Address {
        self.issuer.address()
    }

    /// Request carrying an issuer signature over the mint digest
    pub fn signed_request(&self, holder: Address, fields: DisclosedFields, expiry: u64) -> MintRequest {
        MintRequest {
            fields,
            hidden_commitment: self.hidden_commitment,
            expiry,
            proof: self
                .issuer
                .issue(holder, &fields, self.hidden_commitment, expiry)
                .expect("signing succeeds"),
        }
    }

    /// Request carrying a selective-disclosure proof for `fields`
    pub fn disclosed_request(&self, fields: DisclosedFields, expiry: u64) -> MintRequest {
        let vc_hash = verifier::vc_hash(&serde_json::json!({
            "type": ["VerifiableCredential", "EnergyAttributeCertificate"],
            "credentialSubject": {
                "epochIndex": fields.epoch_index,
                "typeCode": fields.type_code,
                "quantity": fields.quantity.to_string(),
            },
        }));
        MintRequest {
            fields,
            hidden_commitment: self.hidden_commitment,
            expiry,
            proof: self.issuer.disclose(vc_hash, &fields).expect("signing succeeds"),
        }
    }
}

/// Proof that is not a valid signature of anything
pub fn garbage_proof() -> Bytes {
    Bytes::from(vec![0xab; 65])
}
