// src/api/ens.rs

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::{api::ApiError, blockchain::services::address::is_address, AppState};

/// Forward resolution for names, reverse resolution for addresses.
pub async fn ens_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if is_address(&name) {
        let ens_name = state.ens.lookup(&name).await?;
        return Ok(Json(json!({ "address": name, "name": ens_name })));
    }
    let address = state.ens.resolve(&name).await?;
    Ok(Json(json!({ "name": name, "address": address })))
}
