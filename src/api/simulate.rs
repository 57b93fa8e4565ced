// src/api/simulate.rs

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    api::ApiError,
    blockchain::{
        error::Error,
        models::{SimulationResult, TransactionParams},
    },
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SimulateRequest {
    #[validate(length(min = 1, message = "at least one transaction is required"))]
    pub transactions: Vec<TransactionParams>,
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    #[serde(flatten)]
    pub result: SimulationResult,
    /// Human-readable per-transaction summary
    pub rendered: String,
}

pub async fn simulate_handler(
    State(state): State<AppState>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<SimulateResponse>, ApiError> {
    req.validate()
        .map_err(|e| Error::Validation(e.to_string()))?;
    let result = state
        .simulator
        .simulate_transaction_bundle(&req.transactions)
        .await?;
    let rendered = result.render();
    Ok(Json(SimulateResponse { result, rendered }))
}
