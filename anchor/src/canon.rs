//! Canonical encodings shared by issuer tooling and on-domain verification
//!
//! Any byte difference here breaks every signature check, so each encoding
//! has exactly one implementation.

use alloy::primitives::{keccak256, B256};
use alloy_sol_types::SolValue;

use crate::types::{ContentHash, DisclosedFields};

/// Length of the packed `(uint64, uint16, uint256, uint128)` encoding
pub const PACKED_FIELDS_LEN: usize = 8 + 2 + 32 + 16;

/// Tightly packed big-endian encoding, equivalent to
/// `abi.encodePacked(epochIndex, typeCode, quantity, policyNonce)`
pub fn encode_packed(fields: &DisclosedFields) -> [u8; PACKED_FIELDS_LEN] {
    let mut out = [0u8; PACKED_FIELDS_LEN];
    out[..8].copy_from_slice(&fields.epoch_index.to_be_bytes());
    out[8..10].copy_from_slice(&fields.type_code.to_be_bytes());
    out[10..42].copy_from_slice(&fields.quantity.to_be_bytes::<32>());
    out[42..].copy_from_slice(&fields.policy_nonce.to_be_bytes());
    out
}

/// `keccak256` of the packed encoding
pub fn content_hash(fields: &DisclosedFields) -> ContentHash {
    keccak256(encode_packed(fields))
}

/// ABI tuple encoding `abi.encode((uint64,uint16,uint256,uint128))` used as the
/// disclosure encoding of selective-disclosure proofs
pub fn disclosure_encoding(fields: &DisclosedFields) -> Vec<u8> {
    (
        fields.epoch_index,
        fields.type_code,
        fields.quantity,
        fields.policy_nonce,
    )
        .abi_encode()
}

/// Commitment over the attributes that never go on-domain
pub fn hidden_commitment(owner: B256, meter: B256, site: B256) -> B256 {
    let mut packed = [0u8; 96];
    packed[..32].copy_from_slice(owner.as_slice());
    packed[32..64].copy_from_slice(meter.as_slice());
    packed[64..].copy_from_slice(site.as_slice());
    keccak256(packed)
}

/// `keccak256` of a UTF-8 label, handy for deriving identifiers
pub fn label_hash(label: &str) -> B256 {
    keccak256(label.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn sample() -> DisclosedFields {
        DisclosedFields::new(202540, 1, U256::from(100u64), 0)
    }

    #[test]
    fn test_packed_layout() {
        let packed = encode_packed(&sample());
        assert_eq!(packed.len(), 58);
        assert_eq!(&packed[..8], &202540u64.to_be_bytes());
        assert_eq!(&packed[8..10], &[0, 1]);
        assert_eq!(packed[41], 100);
        assert!(packed[42..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash(&sample()), content_hash(&sample()));
        assert_eq!(sample().content_hash(), content_hash(&sample()));
    }

    #[test]
    fn test_content_hash_covers_every_field() {
        let base = sample();
        let variants = [
            DisclosedFields { epoch_index: 202541, ..base },
            DisclosedFields { type_code: 2, ..base },
            DisclosedFields { quantity: U256::from(101u64), ..base },
            DisclosedFields { policy_nonce: 1, ..base },
        ];
        for variant in variants {
            assert_ne!(content_hash(&variant), content_hash(&base));
        }
    }

    #[test]
    fn test_disclosure_encoding_is_four_words() {
        let encoded = disclosure_encoding(&sample());
        assert_eq!(encoded.len(), 128);
        assert_eq!(encoded, disclosure_encoding(&sample()));
        // uint16 type code right-aligned in the second word
        assert_eq!(encoded[63], 1);
    }

    #[test]
    fn test_hidden_commitment_order_matters() {
        let owner = label_hash("owner");
        let meter = label_hash("meter");
        let site = label_hash("site");
        assert_ne!(
            hidden_commitment(owner, meter, site),
            hidden_commitment(meter, owner, site)
        );
    }
}
