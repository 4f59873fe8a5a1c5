//! Mint and anchor HTTP API
//!
//! - POST /v1/mint - Mint against a credential as `holder`
//! - POST /v1/digest - Digest an issuer has to sign for a mint
//! - GET /v1/anchors/{hash} - Ledger and registry view of a content hash
//! - GET /v1/balances/{address} - Token balance

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canon;
use crate::error::{ErrorClass, GtError};
use crate::node::AnchorNode;
use crate::types::{AnchorEntry, ContentHash, DisclosedFields, MintRecord, MintRequest};
use crate::verifier;

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Error returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    Domain(GtError),
    BadRequest(String),
    NotFound(String),
}

impl From<GtError> for ApiError {
    fn from(e: GtError) -> Self {
        ApiError::Domain(e)
    }
}

fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::Credential | ErrorClass::Request => StatusCode::BAD_REQUEST,
        ErrorClass::Replay => StatusCode::CONFLICT,
        ErrorClass::Authorization => StatusCode::FORBIDDEN,
        ErrorClass::Transport => StatusCode::BAD_GATEWAY,
        ErrorClass::Config | ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Domain(e) => (status_for(e.class()), e.error_code().to_string(), e.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST".to_string(), message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND".to_string(), message),
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

/// Body of `POST /v1/mint`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintBody {
    /// Caller on the issuing domain
    pub holder: Address,
    pub fields: DisclosedFields,
    pub hidden_commitment: B256,
    pub expiry: u64,
    pub proof: Bytes,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MintResponse {
    pub content_hash: ContentHash,
    pub holder: Address,
    pub amount: U256,
    pub message_id: Option<String>,
}

/// Body of `POST /v1/digest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestBody {
    pub holder: Address,
    pub fields: DisclosedFields,
    pub hidden_commitment: B256,
    pub expiry: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DigestResponse {
    pub content_hash: ContentHash,
    /// Message the issuer signs for an issuer-signature credential
    pub digest: B256,
    /// `abi.encode` of the disclosed fields, for selective disclosure
    pub disclosure: Bytes,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnchorView {
    pub content_hash: ContentHash,
    pub minted: Option<MintRecord>,
    pub anchored: Option<AnchorEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceView {
    pub address: Address,
    pub balance: U256,
    pub symbol: String,
    pub decimals: u8,
}

async fn mint_handler(
    State(node): State<Arc<AnchorNode>>,
    Json(body): Json<MintBody>,
) -> Result<(StatusCode, Json<MintResponse>), ApiError> {
    let request = MintRequest {
        fields: body.fields,
        hidden_commitment: body.hidden_commitment,
        expiry: body.expiry,
        proof: body.proof,
    };

    let amount = node.mint(body.holder, &request)?;
    let content_hash = request.fields.content_hash();
    let record = node.ledger().mint_record(content_hash);

    Ok((
        StatusCode::CREATED,
        Json(MintResponse {
            content_hash,
            holder: body.holder,
            amount,
            message_id: record.map(|r| r.message_id.to_string()),
        }),
    ))
}

async fn digest_handler(Json(body): Json<DigestBody>) -> Json<DigestResponse> {
    let content_hash = body.fields.content_hash();
    Json(DigestResponse {
        content_hash,
        digest: verifier::compute_digest(
            body.holder,
            content_hash,
            body.hidden_commitment,
            &body.fields,
            body.expiry,
        ),
        disclosure: canon::disclosure_encoding(&body.fields).into(),
    })
}

async fn anchor_handler(
    State(node): State<Arc<AnchorNode>>,
    Path(hash): Path<String>,
) -> Result<Json<AnchorView>, ApiError> {
    let content_hash: B256 = hash
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid content hash {:?}: {}", hash, e)))?;

    let minted = node.ledger().mint_record(content_hash);
    let anchored = node.registry().anchor_info(content_hash);
    debug!(content_hash = %content_hash, minted = minted.is_some(), anchored = anchored.is_some(), "Anchor lookup");

    if minted.is_none() && anchored.is_none() {
        return Err(ApiError::NotFound(format!("content hash {} is unknown", content_hash)));
    }

    Ok(Json(AnchorView {
        content_hash,
        minted,
        anchored,
    }))
}

async fn balance_handler(
    State(node): State<Arc<AnchorNode>>,
    Path(address): Path<String>,
) -> Result<Json<BalanceView>, ApiError> {
    let address: Address = address
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid address {:?}: {}", address, e)))?;

    let ledger = node.ledger();
    Ok(Json(BalanceView {
        address,
        balance: ledger.balance_of(address),
        symbol: ledger.symbol().to_string(),
        decimals: ledger.decimals(),
    }))
}

/// Create the API router
pub fn router(node: Arc<AnchorNode>) -> Router {
    Router::new()
        .route("/v1/mint", post(mint_handler))
        .route("/v1/digest", post(digest_handler))
        .route("/v1/anchors/{hash}", get(anchor_handler))
        .route("/v1/balances/{address}", get(balance_handler))
        .with_state(node)
}
