//! # MCP Handler Module
//!
//! This module implements the Model Context Protocol (MCP) for the transaction
//! assistant. It handles incoming MCP requests and dispatches them to tools.
//!
//! ## Supported Tools
//!
//! ### Contracts
//! - `fetch_contract_abi` - Resolve a contract ABI, following proxies
//! - `encode_function_call` - ABI-encode call data
//! - `get_contract_address_by_name` - Look up a well-known contract by name
//! - `get_token_info` - ERC-20 name, symbol and decimals
//!
//! ### Simulation
//! - `simulate_transaction_bundle` - Simulate an ordered bundle of transactions
//!
//! ### Addresses and ENS
//! - `convert_to_checksum_address`
//! - `resolve_ens` / `lookup_ens`
//!
//! ### Conversions
//! - `convert_to_smallest_unit`, `format_token_amount`, `convert_dec_to_hex`
//! - `get_chain_metadata`, `get_current_timestamp`

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    blockchain::{
        error::Error,
        models::{AbiEntry, TransactionParams},
        services::{
            abi::encode_function_call,
            address::to_checksum_address,
            chain::get_chain_metadata,
            registry::lookup_contract_address,
            token::{dec_to_hex, format_plain, raw_to_decimal, to_smallest_unit},
        },
    },
    mcp::protocol::{error_codes, Request, Response},
    utils, AppState,
};

/// Every tool name, also accepted as a bare JSON-RPC method.
pub const TOOL_NAMES: &[&str] = &[
    "fetch_contract_abi",
    "encode_function_call",
    "simulate_transaction_bundle",
    "convert_to_checksum_address",
    "resolve_ens",
    "lookup_ens",
    "get_contract_address_by_name",
    "get_token_info",
    "convert_to_smallest_unit",
    "format_token_amount",
    "convert_dec_to_hex",
    "get_chain_metadata",
    "get_current_timestamp",
];

// Helper: produce a result Value that always contains a text content array
// and preserves structured data for JSON-friendly clients.
fn make_texty_result(text: String, payload: Value) -> Value {
    let content = json!([{ "type": "text", "text": text }]);
    match payload {
        Value::Object(mut map) => {
            // Do not overwrite if caller already set content
            if !map.contains_key("content") {
                map.insert("content".into(), content);
            }
            Value::Object(map)
        }
        other => json!({
            "data": other,
            "content": content
        }),
    }
}

/// Maps a service error to a JSON-RPC error carrying its kind.
pub fn error_response(req_id: &Value, err: Error) -> Response {
    let code = match err {
        Error::Validation(_) | Error::Encoding(_) => error_codes::INVALID_PARAMS,
        Error::NotFound(_) => error_codes::NOT_FOUND,
        Error::RemoteProvider { .. } | Error::Timeout { .. } => error_codes::UPSTREAM_ERROR,
    };
    warn!("Tool call failed ({}): {}", err.kind(), err);
    Response::error_with_data(
        req_id.clone(),
        code,
        err.to_string(),
        json!({ "kind": err.kind() }),
    )
}

// Amounts may arrive as JSON numbers or strings.
fn numeric_arg(args: &Value, key: &str, req_id: &Value) -> Result<String, Response> {
    match utils::get_required_arg::<Value>(args, key, req_id)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Argument '{}' must be a number or numeric string", key),
        )),
    }
}

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, state).await,
        // Convenience aliases to support direct method calls from CLI.
        // They are rewritten into tools/call internally to reuse the same logic
        method if TOOL_NAMES.contains(&method) => {
            let wrapped = Request {
                jsonrpc: req.jsonrpc.clone(),
                id: req.id.clone(),
                method: "tools/call".to_string(),
                params: Some(json!({
                    "name": method,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            };
            handle_tool_call(wrapped, state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the correct tool logic.
async fn handle_tool_call(req: Request, state: AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let empty_args = json!({});
    let args = params.get("arguments").unwrap_or(&empty_args);
    let req_id = &req.id;
    let fail = |err: Error| error_response(req_id, err);

    let res: Result<Response, Response> = match tool_name {
        "fetch_contract_abi" => {
            (async {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let name = utils::get_optional_arg::<String>(args, "name", req_id)?;
                let contract_type = utils::get_optional_arg::<String>(args, "type", req_id)?;
                let function_name = utils::get_optional_arg::<String>(args, "function_name", req_id)?;

                let abi = state
                    .resolver
                    .fetch_contract_abi(
                        &address,
                        name.as_deref(),
                        contract_type.as_deref(),
                        function_name.as_deref(),
                    )
                    .await
                    .map_err(fail)?;
                let summary = match &function_name {
                    Some(f) => format!("ABI entry for {} on {}", f, address),
                    None => format!("{} ABI entries for {}", abi.len(), address),
                };
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, json!({ "abi": abi.as_slice() })),
                ))
            })
            .await
        }
        "encode_function_call" => {
            (async {
                let function_name = utils::get_required_arg::<String>(args, "function_name", req_id)?;
                let call_args = utils::get_optional_arg::<Vec<Value>>(args, "args", req_id)?.unwrap_or_default();

                // Either an inline ABI or a contract to resolve one for
                let abi = match utils::get_optional_arg::<Vec<AbiEntry>>(args, "abi", req_id)? {
                    Some(abi) => abi,
                    None => {
                        let address = utils::get_required_arg::<String>(args, "contract_address", req_id)?;
                        let name = utils::get_optional_arg::<String>(args, "name", req_id)?;
                        let contract_type = utils::get_optional_arg::<String>(args, "type", req_id)?;
                        state
                            .resolver
                            .fetch_contract_abi(&address, name.as_deref(), contract_type.as_deref(), None)
                            .await
                            .map_err(fail)?
                            .to_vec()
                    }
                };
                let data = encode_function_call(&abi, &function_name, &call_args).map_err(fail)?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(data.clone(), json!({ "data": data })),
                ))
            })
            .await
        }
        "simulate_transaction_bundle" => {
            (async {
                let transactions =
                    utils::get_required_arg::<Vec<TransactionParams>>(args, "transactions", req_id)?;
                let result = state
                    .simulator
                    .simulate_transaction_bundle(&transactions)
                    .await
                    .map_err(fail)?;
                let rendered = result.render();
                let mut payload = serde_json::to_value(&result).map_err(|e| {
                    Response::error(req_id.clone(), error_codes::INTERNAL_ERROR, e.to_string())
                })?;
                payload["rendered"] = json!(rendered);
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(rendered, payload),
                ))
            })
            .await
        }
        "convert_to_checksum_address" => {
            (async {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let checksum = to_checksum_address(&address).map_err(fail)?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(checksum.clone(), json!({ "address": checksum })),
                ))
            })
            .await
        }
        "resolve_ens" => {
            (async {
                // A single `name` or a batch of `names`, answered in order
                if let Some(names) = utils::get_optional_arg::<Vec<String>>(args, "names", req_id)? {
                    let results: Vec<Value> = state
                        .ens
                        .resolve_many(&names)
                        .await
                        .into_iter()
                        .zip(names.iter())
                        .map(|(res, name)| match res {
                            Ok(address) => json!({ "name": name, "address": address }),
                            Err(e) => json!({ "name": name, "error": e.to_string(), "kind": e.kind() }),
                        })
                        .collect();
                    let summary = format!("Resolved {} ENS names", results.len());
                    return Ok(Response::success(
                        req_id.clone(),
                        make_texty_result(summary, json!({ "results": results })),
                    ));
                }

                let name = utils::get_required_arg::<String>(args, "name", req_id)?;
                let address = state.ens.resolve(&name).await.map_err(fail)?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(
                        format!("{} resolves to {}", name, address),
                        json!({ "name": name, "address": address }),
                    ),
                ))
            })
            .await
        }
        "lookup_ens" => {
            (async {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let name = state.ens.lookup(&address).await.map_err(fail)?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(name.clone(), json!({ "address": address, "name": name })),
                ))
            })
            .await
        }
        "get_contract_address_by_name" => {
            (async {
                let name = utils::get_required_arg::<String>(args, "name", req_id)?;
                let address = lookup_contract_address(&name).map_err(fail)?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(
                        format!("{}: {}", name, address),
                        json!({ "name": name, "address": address }),
                    ),
                ))
            })
            .await
        }
        "get_token_info" => {
            (async {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let info = state.chain.token_info(&address).await.map_err(fail)?;
                let summary = format!("{} ({}), {} decimals", info.name, info.symbol, info.decimals);
                let payload = serde_json::to_value(&info).map_err(|e| {
                    Response::error(req_id.clone(), error_codes::INTERNAL_ERROR, e.to_string())
                })?;
                Ok(Response::success(req_id.clone(), make_texty_result(summary, payload)))
            })
            .await
        }
        "convert_to_smallest_unit" => {
            (async {
                let amount = numeric_arg(args, "amount", req_id)?;
                let decimals = utils::get_required_arg::<u32>(args, "decimals", req_id)?;
                let smallest = to_smallest_unit(&amount, decimals).map_err(fail)?;
                let hex = dec_to_hex(&smallest.to_string()).map_err(fail)?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(
                        smallest.to_string(),
                        json!({ "amount": smallest.to_string(), "hex": hex }),
                    ),
                ))
            })
            .await
        }
        "format_token_amount" => {
            (async {
                let raw_amount = utils::get_required_arg::<String>(args, "raw_amount", req_id)?;
                let decimals = utils::get_required_arg::<u32>(args, "decimals", req_id)?;
                let amount = raw_to_decimal(&raw_amount, decimals).map_err(fail)?;
                let formatted = format_plain(&amount);
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(formatted.clone(), json!({ "amount": formatted })),
                ))
            })
            .await
        }
        "convert_dec_to_hex" => {
            (async {
                let value = numeric_arg(args, "value", req_id)?;
                let hex = dec_to_hex(&value).map_err(fail)?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(hex.clone(), json!({ "hex": hex })),
                ))
            })
            .await
        }
        "get_chain_metadata" => {
            (async {
                let chain = numeric_arg(args, "chain", req_id)?;
                let metadata = get_chain_metadata(&chain).map_err(fail)?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(
                        format!("{} (chain id {})", metadata.name, metadata.id),
                        json!({ "id": metadata.id, "name": metadata.name }),
                    ),
                ))
            })
            .await
        }
        "get_current_timestamp" => {
            let timestamp = utils::current_timestamp();
            Ok(Response::success(
                req_id.clone(),
                make_texty_result(timestamp.to_string(), json!({ "timestamp": timestamp })),
            ))
        }
        _ => Err(Response::error(
            req_id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("Tool not found: {}", tool_name),
        )),
    };

    res.unwrap_or_else(|err_resp| err_resp)
}

fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "evm_tx_assistant",
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions =
        "Ethereum transaction assistant: resolves contract ABIs, encodes calls and simulates transaction bundles before they are signed.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

/// Handles the 'tools/list' request by returning a JSON definition of all available tools.
fn handle_tools_list(req: &Request) -> Response {
    let tools = json!([
        {
            "name": "fetch_contract_abi",
            "description": "Fetch the ABI of an Ethereum contract. Built-in ABIs (ERC-20, Uniswap V2 router) are served locally; other contracts are fetched from Etherscan and upgradeable proxies are followed to their implementation.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "address": {"type": "string", "description": "The 0x... contract address."},
                    "name": {"type": "string", "description": "Optional contract name alias, e.g. 'usdc'."},
                    "type": {"type": "string", "description": "Optional contract type alias, e.g. 'erc20' or 'swap'."},
                    "function_name": {"type": "string", "description": "Only return the ABI entry of this function."}
                },
                "required": ["address"]
            }
        },
        {
            "name": "encode_function_call",
            "description": "ABI-encode a function call. Address arguments are checksummed before encoding.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "function_name": {"type": "string"},
                    "args": {"type": "array", "description": "Arguments in declaration order. Large integers should be strings."},
                    "abi": {"type": "array", "description": "Inline ABI. If omitted, contract_address is resolved."},
                    "contract_address": {"type": "string"},
                    "name": {"type": "string"},
                    "type": {"type": "string"}
                },
                "required": ["function_name"]
            }
        },
        {
            "name": "simulate_transaction_bundle",
            "description": "Simulate an ordered bundle of transactions on Ethereum mainnet state and report per-transaction asset changes and errors.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "transactions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "from_address": {"type": "string"},
                                "to_address": {"type": "string"},
                                "data": {"type": "string", "description": "Call data in hex, default '0x'"},
                                "value": {"type": "string", "description": "Native amount in hex, default '0x0'"}
                            },
                            "required": ["from_address", "to_address"]
                        }
                    }
                },
                "required": ["transactions"]
            }
        },
        {
            "name": "convert_to_checksum_address",
            "description": "Convert an address to its EIP-55 checksum form.",
            "inputSchema": {
                "type": "object",
                "properties": { "address": {"type": "string"} },
                "required": ["address"]
            }
        },
        {
            "name": "resolve_ens",
            "description": "Resolve an ENS name ('.eth' is appended when missing), or a batch of names.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "names": {"type": "array", "items": {"type": "string"}}
                }
            }
        },
        {
            "name": "lookup_ens",
            "description": "Reverse-resolve an address to its primary ENS name.",
            "inputSchema": {
                "type": "object",
                "properties": { "address": {"type": "string"} },
                "required": ["address"]
            }
        },
        {
            "name": "get_contract_address_by_name",
            "description": "Look up the mainnet address of a well-known token or protocol by name.",
            "inputSchema": {
                "type": "object",
                "properties": { "name": {"type": "string"} },
                "required": ["name"]
            }
        },
        {
            "name": "get_token_info",
            "description": "Read an ERC-20 token's name, symbol and decimals.",
            "inputSchema": {
                "type": "object",
                "properties": { "address": {"type": "string"} },
                "required": ["address"]
            }
        },
        {
            "name": "convert_to_smallest_unit",
            "description": "Convert a human-readable token amount to its smallest unit.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "amount": {"type": "string"},
                    "decimals": {"type": "integer"}
                },
                "required": ["amount", "decimals"]
            }
        },
        {
            "name": "format_token_amount",
            "description": "Convert a hex smallest-unit amount to an exact decimal amount.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "raw_amount": {"type": "string"},
                    "decimals": {"type": "integer"}
                },
                "required": ["raw_amount", "decimals"]
            }
        },
        {
            "name": "convert_dec_to_hex",
            "description": "Convert a decimal integer to hex.",
            "inputSchema": {
                "type": "object",
                "properties": { "value": {"type": "string"} },
                "required": ["value"]
            }
        },
        {
            "name": "get_chain_metadata",
            "description": "Chain id and display name for a supported chain name or id.",
            "inputSchema": {
                "type": "object",
                "properties": { "chain": {"type": "string"} },
                "required": ["chain"]
            }
        },
        {
            "name": "get_current_timestamp",
            "description": "Current UNIX timestamp in seconds, e.g. for swap deadlines.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        }
    ]);

    Response::success(req.id.clone(), json!({ "tools": tools }))
}
