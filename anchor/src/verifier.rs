//! Credential verification
//!
//! The ledger only needs a yes/no answer for a mint request, so both proof
//! schemes sit behind [`CredentialVerifier`]:
//!
//! - [`IssuerSignatureVerifier`]: the issuer signs a digest binding holder,
//!   content hash, hidden commitment, disclosed fields and expiry
//! - [`SelectiveDisclosureVerifier`]: the issuer signs a credential hash
//!   together with the hash of the disclosed subset
//!
//! Signatures are EIP-191 personal-message signatures over the 32-byte
//! message. Verification never errors: anything malformed is `false`.

use alloy::primitives::{keccak256, Address, Bytes, PrimitiveSignature, B256, U256};
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_sol_types::SolValue;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::canon;
use crate::domain::CallContext;
use crate::error::{AuthorizationError, ConfigError, GtResult, ResultExt};
use crate::types::{ContentHash, DisclosedFields};

/// Everything a verifier may bind a proof to
#[derive(Debug, Clone, Copy)]
pub struct CredentialRequest<'a> {
    pub holder: Address,
    pub content_hash: ContentHash,
    pub fields: &'a DisclosedFields,
    pub hidden_commitment: B256,
    pub expiry: u64,
    pub proof: &'a [u8],
}

/// Capability the mint ledger gates issuance on
pub trait CredentialVerifier: Send + Sync {
    /// Short scheme name for logs and events
    fn scheme(&self) -> &'static str;

    /// Currently trusted issuer
    fn issuer(&self) -> Address;

    fn verify_request(&self, request: &CredentialRequest<'_>) -> bool;
}

/// `keccak256(abi.encode(holder, dtHash, hiddenCommitment, epochIndex,
/// typeCode, quantity, policyNonce, expiry))`
pub fn compute_digest(
    holder: Address,
    content_hash: ContentHash,
    hidden_commitment: B256,
    fields: &DisclosedFields,
    expiry: u64,
) -> B256 {
    let encoded = (
        holder,
        content_hash,
        hidden_commitment,
        fields.epoch_index,
        fields.type_code,
        fields.quantity,
        fields.policy_nonce,
        U256::from(expiry),
    )
        .abi_encode();
    keccak256(encoded)
}

/// Message signed in a selective-disclosure proof:
/// `keccak256(vcHash ‖ keccak256(discEncoding))`
pub fn disclosure_message(vc_hash: B256, disc_encoding: &[u8]) -> B256 {
    let disc_hash = keccak256(disc_encoding);
    let mut packed = [0u8; 64];
    packed[..32].copy_from_slice(vc_hash.as_slice());
    packed[32..].copy_from_slice(disc_hash.as_slice());
    keccak256(packed)
}

/// Signer of an EIP-191 signature over `message`, if the signature parses
pub fn recover_signer(signature: &[u8], message: B256) -> Option<Address> {
    let signature = PrimitiveSignature::try_from(signature).ok()?;
    signature.recover_address_from_msg(message).ok()
}

/// Issuer key holder with an administrator allowed to rotate it
struct IssuerSlot {
    admin: Address,
    issuer: RwLock<Address>,
}

impl IssuerSlot {
    fn set(&self, ctx: &CallContext<'_>, issuer: Address) -> GtResult<()> {
        if ctx.caller != self.admin {
            return Err(AuthorizationError::NotAdmin { caller: ctx.caller }.into());
        }
        *self.issuer.write() = issuer;
        info!(issuer = %issuer, "Credential issuer updated");
        Ok(())
    }

    fn accepts(&self, recovered: Option<Address>) -> bool {
        let issuer = *self.issuer.read();
        !issuer.is_zero() && recovered == Some(issuer)
    }
}

/// Single-issuer signature over the credential digest
pub struct IssuerSignatureVerifier {
    slot: IssuerSlot,
}

impl IssuerSignatureVerifier {
    pub fn new(admin: Address, issuer: Address) -> Self {
        Self {
            slot: IssuerSlot {
                admin,
                issuer: RwLock::new(issuer),
            },
        }
    }

    /// `computeDigest(...)`, identical to what issuer tooling signs
    pub fn compute_digest(
        &self,
        holder: Address,
        content_hash: ContentHash,
        hidden_commitment: B256,
        fields: &DisclosedFields,
        expiry: u64,
    ) -> B256 {
        compute_digest(holder, content_hash, hidden_commitment, fields, expiry)
    }

    /// True iff `signature` over `digest` recovers to the issuer
    pub fn verify(&self, signature: &[u8], digest: B256) -> bool {
        self.slot.accepts(recover_signer(signature, digest))
    }

    pub fn set_issuer(&self, ctx: &CallContext<'_>, issuer: Address) -> GtResult<()> {
        self.slot.set(ctx, issuer)
    }
}

impl CredentialVerifier for IssuerSignatureVerifier {
    fn scheme(&self) -> &'static str {
        "issuer-signature"
    }

    fn issuer(&self) -> Address {
        *self.slot.issuer.read()
    }

    fn verify_request(&self, request: &CredentialRequest<'_>) -> bool {
        let digest = compute_digest(
            request.holder,
            request.content_hash,
            request.hidden_commitment,
            request.fields,
            request.expiry,
        );
        let accepted = self.verify(request.proof, digest);
        debug!(digest = %digest, accepted = accepted, "Issuer signature checked");
        accepted
    }
}

/// Selective disclosure of a signed verifiable credential
pub struct SelectiveDisclosureVerifier {
    slot: IssuerSlot,
}

impl SelectiveDisclosureVerifier {
    pub fn new(admin: Address, issuer: Address) -> Self {
        Self {
            slot: IssuerSlot {
                admin,
                issuer: RwLock::new(issuer),
            },
        }
    }

    /// Verify `proof_blob = abi.encode(bytes32 vcHash, bytes signature)`
    /// against the canonical encoding of the disclosed subset
    pub fn verify_proof(&self, proof_blob: &[u8], disc_encoding: &[u8]) -> bool {
        let Ok((vc_hash, signature)) = <(B256, Bytes)>::abi_decode_params(proof_blob, true) else {
            return false;
        };
        let message = disclosure_message(vc_hash, disc_encoding);
        self.slot.accepts(recover_signer(&signature, message))
    }

    pub fn set_issuer(&self, ctx: &CallContext<'_>, issuer: Address) -> GtResult<()> {
        self.slot.set(ctx, issuer)
    }
}

impl CredentialVerifier for SelectiveDisclosureVerifier {
    fn scheme(&self) -> &'static str {
        "selective-disclosure"
    }

    fn issuer(&self) -> Address {
        *self.slot.issuer.read()
    }

    fn verify_request(&self, request: &CredentialRequest<'_>) -> bool {
        let accepted = self.verify_proof(request.proof, &canon::disclosure_encoding(request.fields));
        debug!(accepted = accepted, "Disclosure proof checked");
        accepted
    }
}

/// Issuer-side tooling producing proofs both verifiers accept
pub struct CredentialIssuer {
    signer: PrivateKeySigner,
}

impl CredentialIssuer {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn from_private_key(key: &str) -> GtResult<Self> {
        let signer: PrivateKeySigner = key.parse().map_err(|_| ConfigError::InvalidPrivateKey)?;
        Ok(Self::new(signer))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// EIP-191 signature over a 32-byte message, as 65 bytes
    pub fn sign_message(&self, message: B256) -> GtResult<Bytes> {
        let signature = self
            .signer
            .sign_message_sync(message.as_slice())
            .gt_context("signing credential message")?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }

    /// Signature for [`IssuerSignatureVerifier`] over a holder's credential
    pub fn issue(
        &self,
        holder: Address,
        fields: &DisclosedFields,
        hidden_commitment: B256,
        expiry: u64,
    ) -> GtResult<Bytes> {
        let digest = compute_digest(holder, fields.content_hash(), hidden_commitment, fields, expiry);
        self.sign_message(digest)
    }

    /// Packed proof for [`SelectiveDisclosureVerifier`]
    pub fn disclose(&self, vc_hash: B256, fields: &DisclosedFields) -> GtResult<Bytes> {
        let message = disclosure_message(vc_hash, &canon::disclosure_encoding(fields));
        let signature = self.sign_message(message)?;
        Ok((vc_hash, signature).abi_encode_params().into())
    }
}

/// Hash of a verifiable credential document
pub fn vc_hash(document: &serde_json::Value) -> B256 {
    keccak256(document.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const OTHER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn fields() -> DisclosedFields {
        DisclosedFields::new(202540, 1, U256::from(100u64), 0)
    }

    #[test]
    fn test_digest_is_deterministic() {
        let holder = Address::repeat_byte(0x11);
        let hidden = canon::label_hash("hidden");
        let a = compute_digest(holder, fields().content_hash(), hidden, &fields(), 1_000);
        let b = compute_digest(holder, fields().content_hash(), hidden, &fields(), 1_000);
        assert_eq!(a, b);

        let other_holder = compute_digest(Address::repeat_byte(0x12), fields().content_hash(), hidden, &fields(), 1_000);
        let other_expiry = compute_digest(holder, fields().content_hash(), hidden, &fields(), 1_001);
        assert_ne!(a, other_holder);
        assert_ne!(a, other_expiry);
    }

    #[test]
    fn test_issuer_signature_accepted_other_rejected() {
        let issuer = CredentialIssuer::from_private_key(ISSUER_KEY).unwrap();
        let other = CredentialIssuer::from_private_key(OTHER_KEY).unwrap();
        let verifier = IssuerSignatureVerifier::new(issuer.address(), issuer.address());

        let digest = canon::label_hash("digest");
        assert!(verifier.verify(&issuer.sign_message(digest).unwrap(), digest));
        assert!(!verifier.verify(&other.sign_message(digest).unwrap(), digest));
    }

    #[test]
    fn test_malformed_signature_is_false() {
        let verifier = IssuerSignatureVerifier::new(Address::ZERO, Address::repeat_byte(1));
        assert!(!verifier.verify(&[0u8; 10], B256::ZERO));
        assert!(!verifier.verify(&[], B256::ZERO));
    }

    #[test]
    fn test_zero_issuer_accepts_nothing() {
        let issuer = CredentialIssuer::from_private_key(ISSUER_KEY).unwrap();
        let verifier = IssuerSignatureVerifier::new(Address::ZERO, Address::ZERO);
        let digest = canon::label_hash("digest");
        assert!(!verifier.verify(&issuer.sign_message(digest).unwrap(), digest));
    }

    #[test]
    fn test_request_with_different_fields_rejected() {
        let issuer = CredentialIssuer::from_private_key(ISSUER_KEY).unwrap();
        let verifier = IssuerSignatureVerifier::new(issuer.address(), issuer.address());
        let holder = Address::repeat_byte(0x11);
        let hidden = canon::label_hash("hidden");
        let signed = issuer.issue(holder, &fields(), hidden, 5_000).unwrap();

        let tampered = DisclosedFields {
            quantity: U256::from(1_000u64),
            ..fields()
        };
        let request = CredentialRequest {
            holder,
            content_hash: tampered.content_hash(),
            fields: &tampered,
            hidden_commitment: hidden,
            expiry: 5_000,
            proof: &signed,
        };
        assert!(!verifier.verify_request(&request));

        let genuine = fields();
        let request = CredentialRequest {
            fields: &genuine,
            content_hash: genuine.content_hash(),
            ..request
        };
        assert!(verifier.verify_request(&request));
    }

    #[test]
    fn test_selective_disclosure_proof() {
        let issuer = CredentialIssuer::from_private_key(ISSUER_KEY).unwrap();
        let other = CredentialIssuer::from_private_key(OTHER_KEY).unwrap();
        let verifier = SelectiveDisclosureVerifier::new(issuer.address(), issuer.address());

        let vc = vc_hash(&serde_json::json!({"credentialSubject": {"epochIndex": 202540}}));
        let disc = canon::disclosure_encoding(&fields());

        assert!(verifier.verify_proof(&issuer.disclose(vc, &fields()).unwrap(), &disc));
        assert!(!verifier.verify_proof(&other.disclose(vc, &fields()).unwrap(), &disc));

        let other_fields = DisclosedFields {
            policy_nonce: 9,
            ..fields()
        };
        assert!(!verifier.verify_proof(
            &issuer.disclose(vc, &fields()).unwrap(),
            &canon::disclosure_encoding(&other_fields)
        ));
        assert!(!verifier.verify_proof(b"not an abi blob", &disc));
    }

    #[test]
    fn test_issuer_rotation_is_admin_only() {
        let issuer = CredentialIssuer::from_private_key(ISSUER_KEY).unwrap();
        let next = CredentialIssuer::from_private_key(OTHER_KEY).unwrap();
        let admin = Address::repeat_byte(0xad);
        let verifier = IssuerSignatureVerifier::new(admin, issuer.address());

        let outsider = CallContext::new(Address::repeat_byte(0x01), 0);
        assert!(verifier.set_issuer(&outsider, next.address()).is_err());

        verifier
            .set_issuer(&CallContext::new(admin, 0), next.address())
            .unwrap();
        assert_eq!(verifier.issuer(), next.address());

        let digest = canon::label_hash("digest");
        assert!(!verifier.verify(&issuer.sign_message(digest).unwrap(), digest));
        assert!(verifier.verify(&next.sign_message(digest).unwrap(), digest));
    }
}
