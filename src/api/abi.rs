// src/api/abi.rs

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    api::ApiError,
    blockchain::{
        error::Error,
        models::AbiEntry,
        services::abi::encode_function_call,
    },
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct AbiQuery {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub contract_type: Option<String>,
    pub function: Option<String>,
}

pub async fn get_abi_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<AbiQuery>,
) -> Result<Json<Vec<AbiEntry>>, ApiError> {
    debug!("ABI request for {} ({:?})", address, query);
    let abi = state
        .resolver
        .fetch_contract_abi(
            &address,
            query.name.as_deref(),
            query.contract_type.as_deref(),
            query.function.as_deref(),
        )
        .await?;
    Ok(Json(abi.to_vec()))
}

#[derive(Debug, Deserialize)]
pub struct EncodeRequest {
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Inline ABI; when absent `contract_address` is resolved
    pub abi: Option<Vec<AbiEntry>>,
    pub contract_address: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub contract_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EncodeResponse {
    pub data: String,
}

pub async fn encode_handler(
    State(state): State<AppState>,
    Json(req): Json<EncodeRequest>,
) -> Result<Json<EncodeResponse>, ApiError> {
    let data = match (&req.abi, &req.contract_address) {
        (Some(abi), _) => encode_function_call(abi, &req.function_name, &req.args)?,
        (None, Some(address)) => {
            let abi = state
                .resolver
                .fetch_contract_abi(address, req.name.as_deref(), req.contract_type.as_deref(), None)
                .await?;
            encode_function_call(&abi, &req.function_name, &req.args)?
        }
        (None, None) => {
            return Err(Error::Validation(
                "either 'abi' or 'contract_address' is required".to_string(),
            )
            .into())
        }
    };
    Ok(Json(EncodeResponse { data }))
}
