//! # API Module
//!
//! HTTP handlers for the transaction assistant. Everything is mounted under `/api`.
//!
//! ## Available Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /abi/:address?name=&type=&function=` - Resolve a contract ABI
//! - `POST /encode` - ABI-encode a function call
//! - `POST /simulate` - Simulate a transaction bundle
//! - `GET /ens/:name` - Resolve an ENS name, or reverse-resolve an address
//! - `POST /rpc` - MCP JSON-RPC over HTTP

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::{blockchain::error::Error, AppState};

pub mod abi;
pub mod ens;
pub mod health;
pub mod rpc;
pub mod simulate;

/// Service error rendered as `{"error", "kind"}` with a matching status code.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::Validation(_) | Error::Encoding(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::RemoteProvider { .. } => StatusCode::BAD_GATEWAY,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = json!({ "error": self.0.to_string(), "kind": self.0.kind() });
        (status, Json(body)).into_response()
    }
}

/// Builds the `/api` router around `state`.
pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        // Health check
        .route("/health", get(health::health_handler))
        // Contracts
        .route("/abi/:address", get(abi::get_abi_handler))
        .route("/encode", post(abi::encode_handler))
        // Simulation
        .route("/simulate", post(simulate::simulate_handler))
        // ENS
        .route("/ens/:name", get(ens::ens_handler))
        // JSON-RPC endpoint for MCP tool calls
        .route("/rpc", post(rpc::rpc_handler));

    Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
