//! Router-level tests for the HTTP API, driven through `tower::ServiceExt::oneshot`

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use evm_tx_assistant::api;

fn app() -> Router {
    app_with(
        Arc::new(FakeExplorer::default()),
        Arc::new(FakeChain::default()),
        Arc::new(FakeSimulation::new(approve_swap_transfer_result())),
    )
}

fn app_with(explorer: Arc<FakeExplorer>, chain: Arc<FakeChain>, simulation: Arc<FakeSimulation>) -> Router {
    api::router(test_state(explorer, chain, simulation))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bundle_body() -> Value {
    json!({
        "transactions": [
            {"from": SENDER, "to": USDC, "data": "0x095ea7b3", "value": "0x0"},
            {"from": SENDER, "to": ROUTER, "data": "0x38ed1739"},
            {"from": SENDER, "to": RECEIVER, "value": "0x7b"}
        ]
    })
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(app(), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["proxy_strategy"], "abi");
}

#[tokio::test]
async fn test_builtin_abi_narrowed_to_function() {
    let uri = format!("/api/abi/{}?function=approve", USDC.to_lowercase());
    let (status, body) = send(app(), get(&uri)).await;

    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "approve");
    assert_eq!(entries[0]["type"], "function");
}

#[tokio::test]
async fn test_proxy_abi_over_http() {
    let explorer = Arc::new(
        FakeExplorer::default()
            .with_abi(PROXY_1, proxy_abi("upgradeTo"))
            .with_abi(IMPL, plain_abi("stake")),
    );
    let chain = Arc::new(FakeChain::default().with_implementation(PROXY_1, IMPL));
    let app = app_with(
        explorer,
        chain,
        Arc::new(FakeSimulation::new(json!([]))),
    );

    let (status, body) = send(app, get(&format!("/api/abi/{}", PROXY_1))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "stake");
}

#[tokio::test]
async fn test_error_statuses() {
    let (status, body) = send(app(), get("/api/abi/0x1234")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = send(app(), get(&format!("/api/abi/{}?function=mint", USDC))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    // Unknown to the explorer
    let (status, body) = send(app(), get(&format!("/api/abi/{}", IMPL))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "remote_provider");
}

#[tokio::test]
async fn test_encode_with_resolved_abi() {
    let request = post_json(
        "/api/encode",
        json!({
            "function_name": "approve",
            "args": [ROUTER.to_lowercase(), "1000000"],
            "contract_address": USDC
        }),
    );
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        "0x095ea7b30000000000000000000000007a250d5630b4cf539739df2c5dacb4c659f2488d00000000000000000000000000000000000000000000000000000000000f4240"
    );
}

#[tokio::test]
async fn test_encode_requires_an_abi_source() {
    let request = post_json("/api/encode", json!({"function_name": "approve", "args": []}));
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let request = post_json(
        "/api/encode",
        json!({"function_name": "approve", "args": [ROUTER], "contract_address": USDC}),
    );
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "encoding");
}

#[tokio::test]
async fn test_simulate_bundle() {
    let simulation = Arc::new(FakeSimulation::new(approve_swap_transfer_result()));
    let app = app_with(
        Arc::new(FakeExplorer::default()),
        Arc::new(FakeChain::default()),
        simulation.clone(),
    );

    let (status, body) = send(app, post_json("/api/simulate", bundle_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from_address"], SENDER);
    let results = body["tx_results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["asset_changes"], json!([]));
    assert_eq!(results[1]["asset_changes"].as_array().unwrap().len(), 2);
    assert!(results[2]["asset_changes"][0]["contract_address"].is_null());

    let rendered = body["rendered"].as_str().unwrap();
    assert!(rendered.starts_with("#1: Transaction was successful."));
    assert!(rendered.contains("ETH (Native): -0.000000000000000123 (0x7b)"));

    // Defaults filled in before submission
    let submitted = simulation.submitted.lock().unwrap();
    assert_eq!(submitted[1].value, "0x0");
    assert_eq!(submitted[2].data, "0x");
}

#[tokio::test]
async fn test_simulate_signs_every_step_from_the_sender() {
    let app = app_with(
        Arc::new(FakeExplorer::default()),
        Arc::new(FakeChain::default()),
        Arc::new(FakeSimulation::new(transfer_swap_transfer_result())),
    );

    let (status, body) = send(app, post_json("/api/simulate", bundle_body())).await;
    assert_eq!(status, StatusCode::OK);

    let steps: Vec<&str> = body["rendered"]
        .as_str()
        .unwrap()
        .split("\n-------------------------------------\n")
        .collect();
    assert_eq!(steps.len(), 3);
    assert!(steps[0].contains("USDC (0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48): -2 (0x1e8480)"));
    assert!(steps[1].contains("USDC (0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48): -1 (0xf4240)"));
    assert!(steps[1].contains("USDT (0xdac17f958d2ee523a2206206994597c13d831ec7): +0.999004 (0xf3e5c)"));
    assert!(steps[2].contains("ETH (Native): -0.000000000000000123 (0x7b)"));
}

#[tokio::test]
async fn test_simulate_rejects_bad_bundles() {
    let (status, _) = send(app(), post_json("/api/simulate", json!({"transactions": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_value = json!({"transactions": [{"from": SENDER, "to": USDC, "value": "123"}]});
    let (status, body) = send(app(), post_json("/api/simulate", bad_value)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_simulation_count_mismatch_is_bad_gateway() {
    // Three transactions submitted, one result returned
    let one = json!([approve_swap_transfer_result()[0].clone()]);
    let app = app_with(
        Arc::new(FakeExplorer::default()),
        Arc::new(FakeChain::default()),
        Arc::new(FakeSimulation::new(one)),
    );
    let (status, body) = send(app, post_json("/api/simulate", bundle_body())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "remote_provider");
}

#[tokio::test]
async fn test_ens_forward_and_reverse() {
    let chain = Arc::new(FakeChain::default().with_name("vitalik.eth", SENDER));
    let app = app_with(
        Arc::new(FakeExplorer::default()),
        chain.clone(),
        Arc::new(FakeSimulation::new(json!([]))),
    );

    let (status, body) = send(app.clone(), get("/api/ens/Vitalik")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"], SENDER);

    let (status, body) = send(app.clone(), get(&format!("/api/ens/{}", SENDER.to_lowercase()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "vitalik.eth");

    let (status, _) = send(app, get("/api/ens/nobody.eth")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(chain.resolve_calls(), vec!["vitalik.eth", "nobody.eth"]);
}

#[tokio::test]
async fn test_rpc_tools_over_http() {
    let (status, body) = send(
        app(),
        post_json("/api/rpc", json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 13);

    let (_, body) = send(
        app(),
        post_json(
            "/api/rpc",
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "convert_to_checksum_address",
                "params": {"address": USDT.to_lowercase()}
            }),
        ),
    )
    .await;
    assert_eq!(body["result"]["address"], USDT);
    assert_eq!(body["result"]["content"][0]["text"], USDT);

    let (_, body) = send(
        app(),
        post_json(
            "/api/rpc",
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "fetch_contract_abi", "arguments": {"address": IMPL}}
            }),
        ),
    )
    .await;
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(body["error"]["data"]["kind"], "remote_provider");
}

#[tokio::test]
async fn test_amount_tools_reject_oversized_decimals() {
    for (method, params) in [
        ("format_token_amount", json!({"raw_amount": "0x1", "decimals": u32::MAX})),
        ("convert_to_smallest_unit", json!({"amount": "1", "decimals": 3_000_000})),
    ] {
        let (_, body) = send(
            app(),
            post_json(
                "/api/rpc",
                json!({"jsonrpc": "2.0", "id": 4, "method": method, "params": params}),
            ),
        )
        .await;
        assert_eq!(body["error"]["code"], -32602, "{}", method);
        assert_eq!(body["error"]["data"]["kind"], "validation");
    }

    let (_, body) = send(
        app(),
        post_json(
            "/api/rpc",
            json!({"jsonrpc": "2.0", "id": 5, "method": "format_token_amount", "params": {"raw_amount": "0xf4240", "decimals": 6}}),
        ),
    )
    .await;
    assert_eq!(body["result"]["amount"], "1");
}
