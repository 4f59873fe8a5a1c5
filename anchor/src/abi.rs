//! Contract ABI of the relayed settlement-domain call

use alloy::sol;
use alloy_sol_types::SolCall;

use crate::error::{GtResult, RelayError};
use crate::types::AnchorRequest;

sol! {
    /// Settlement-domain anchor entry point, reachable only through a relay
    interface IGTokenAnchor {
        function recordMint(
            bytes32 dtHash,
            address to,
            uint256 gtAmount,
            uint64 epochIndex,
            uint16 typeCode,
            uint256 qtyKWh
        ) external;
    }
}

pub use IGTokenAnchor::recordMintCall;

impl From<&AnchorRequest> for recordMintCall {
    fn from(request: &AnchorRequest) -> Self {
        recordMintCall {
            dtHash: request.content_hash,
            to: request.to,
            gtAmount: request.amount,
            epochIndex: request.epoch_index,
            typeCode: request.type_code,
            qtyKWh: request.quantity,
        }
    }
}

impl From<recordMintCall> for AnchorRequest {
    fn from(call: recordMintCall) -> Self {
        AnchorRequest {
            content_hash: call.dtHash,
            to: call.to,
            amount: call.gtAmount,
            epoch_index: call.epochIndex,
            type_code: call.typeCode,
            quantity: call.qtyKWh,
        }
    }
}

/// Encode `recordMint(...)` calldata, selector included
pub fn encode_record_mint(request: &AnchorRequest) -> Vec<u8> {
    recordMintCall::from(request).abi_encode()
}

/// Decode `recordMint(...)` calldata, rejecting foreign selectors
pub fn decode_record_mint(data: &[u8]) -> GtResult<AnchorRequest> {
    let call = recordMintCall::abi_decode(data, true)
        .map_err(|e| RelayError::MalformedCall(e.to_string()))?;
    Ok(call.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256, U256};

    fn request() -> AnchorRequest {
        AnchorRequest {
            content_hash: B256::repeat_byte(0x11),
            to: Address::repeat_byte(0x22),
            amount: U256::from(100u64),
            epoch_index: 202540,
            type_code: 1,
            quantity: U256::from(100u64),
        }
    }

    #[test]
    fn test_calldata_layout() {
        let data = encode_record_mint(&request());
        // selector + six static words
        assert_eq!(data.len(), 4 + 6 * 32);
        assert_eq!(&data[..4], &recordMintCall::SELECTOR);
        assert_eq!(decode_record_mint(&data).unwrap(), request());
    }

    #[test]
    fn test_rejects_foreign_selector() {
        let mut data = encode_record_mint(&request());
        data[0] ^= 0xff;
        assert!(matches!(
            decode_record_mint(&data),
            Err(crate::error::GtError::Relay(RelayError::MalformedCall(_)))
        ));
    }

    #[test]
    fn test_rejects_truncated_calldata() {
        let data = encode_record_mint(&request());
        assert!(decode_record_mint(&data[..40]).is_err());
    }
}
