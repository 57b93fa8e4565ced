// src/blockchain/services/abi.rs
//
// Proxy-aware ABI resolution: built-in ABIs first, then the block explorer,
// following upgradeable proxies to their implementation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ethers::types::{Address, I256, U256};
use ethers_core::abi::{Function, ParamType, Token};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::blockchain::{
    cache::{CachePolicy, MemoCache},
    client::ChainReader,
    error::{Error, Result},
    models::AbiEntry,
    services::{
        address::{is_address, normalize_address_args, to_checksum_address},
        explorer::BlockExplorer,
    },
};

/// A full contract ABI, shared between every key that aliases it.
pub type ContractAbi = Arc<Vec<AbiEntry>>;

const ERC20_ABI_JSON: &str = include_str!("../../../abi/erc20.json");
const SWAP_ABI_JSON: &str = include_str!("../../../abi/uniswap_v2_router.json");

const ERC20_ALIASES: &[&str] = &["erc20", "steth", "usdt", "usdc", "dai"];
const ERC20_ADDRESSES: &[&str] = &[
    "0xdAC17F958D2ee523a2206206994597C13D831ec7", // USDT
    "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", // USDC
    "0x6B175474E89094C44Da98b954EedeAC495271d0F", // DAI
    "0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84", // stETH
];
const SWAP_ALIASES: &[&str] = &["swap"];
const SWAP_ADDRESSES: &[&str] = &["0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"];

/// Read-only table of ABIs shipped with the binary.
///
/// Keys are checksum addresses, lowercase names and lowercase types. Every key
/// of one logical contract points at the same [`ContractAbi`].
#[derive(Debug, Clone)]
pub struct AbiCache {
    entries: HashMap<String, ContractAbi>,
}

impl AbiCache {
    pub fn builtin() -> Result<Self> {
        let mut cache = Self {
            entries: HashMap::new(),
        };
        cache.insert_group(ERC20_ABI_JSON, ERC20_ALIASES, ERC20_ADDRESSES)?;
        cache.insert_group(SWAP_ABI_JSON, SWAP_ALIASES, SWAP_ADDRESSES)?;
        Ok(cache)
    }

    fn insert_group(&mut self, raw: &str, aliases: &[&str], addresses: &[&str]) -> Result<()> {
        let entries: Vec<AbiEntry> = serde_json::from_str(raw)
            .map_err(|e| Error::Validation(format!("embedded ABI is malformed: {}", e)))?;
        let abi: ContractAbi = Arc::new(entries);
        for alias in aliases {
            self.entries.insert(alias.to_string(), Arc::clone(&abi));
        }
        for address in addresses {
            self.entries.insert(to_checksum_address(address)?, Arc::clone(&abi));
        }
        Ok(())
    }

    /// Exact-key lookup. Callers normalize the key.
    pub fn get(&self, key: &str) -> Option<ContractAbi> {
        self.entries.get(key).cloned()
    }

    /// Tries the checksum address, then the lowercased name, then the lowercased type.
    pub fn lookup(
        &self,
        checksum_address: Option<&str>,
        name: Option<&str>,
        contract_type: Option<&str>,
    ) -> Option<ContractAbi> {
        let keys = [
            checksum_address.map(str::to_string),
            name.map(str::to_lowercase),
            contract_type.map(str::to_lowercase),
        ];
        keys.iter()
            .flatten()
            .find_map(|key| self.get(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How the resolver decides a contract is an upgradeable proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyStrategy {
    /// The ABI exposes an `implementation` function; its return value is the target.
    #[default]
    ImplementationFunction,
    /// The explorer's source-code record names an implementation address.
    ExplorerField,
}

impl FromStr for ProxyStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "abi" | "implementation" => Ok(ProxyStrategy::ImplementationFunction),
            "explorer" | "etherscan" => Ok(ProxyStrategy::ExplorerField),
            other => Err(Error::Validation(format!(
                "unknown proxy strategy '{}', expected 'abi' or 'explorer'",
                other
            ))),
        }
    }
}

impl fmt::Display for ProxyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyStrategy::ImplementationFunction => write!(f, "abi"),
            ProxyStrategy::ExplorerField => write!(f, "explorer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub strategy: ProxyStrategy,
    /// Explorer ABI fetches allowed while following proxies. Values below 1 act as 1.
    pub max_redirects: usize,
    pub cache: CachePolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            strategy: ProxyStrategy::default(),
            max_redirects: 2,
            cache: CachePolicy::bounded(CachePolicy::DEFAULT_CAPACITY),
        }
    }
}

/// Resolves contract ABIs, memoizing every remote lookup.
pub struct AbiResolver {
    builtin: Arc<AbiCache>,
    explorer: Arc<dyn BlockExplorer>,
    chain: Arc<dyn ChainReader>,
    remote_abis: MemoCache<ContractAbi>,
    implementations: MemoCache<Option<String>>,
    options: ResolverOptions,
}

impl AbiResolver {
    pub fn new(
        builtin: Arc<AbiCache>,
        explorer: Arc<dyn BlockExplorer>,
        chain: Arc<dyn ChainReader>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            builtin,
            explorer,
            chain,
            remote_abis: MemoCache::new(options.cache),
            implementations: MemoCache::new(options.cache),
            options,
        }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolves the ABI for `address`, optionally narrowed to one function.
    ///
    /// Built-in entries are tried by address, `name` and `contract_type` before
    /// the explorer is asked. A proxy is followed until a non-proxy ABI is found
    /// or the redirect bound is hit, in which case the last fetched ABI is used.
    pub async fn fetch_contract_abi(
        &self,
        address: &str,
        name: Option<&str>,
        contract_type: Option<&str>,
        function_name: Option<&str>,
    ) -> Result<ContractAbi> {
        let checksum = to_checksum_address(address)?;

        let abi = match self.builtin.lookup(Some(&checksum), name, contract_type) {
            Some(abi) => {
                debug!("ABI for {} served from built-in cache", checksum);
                abi
            }
            None => self.resolve_remote(&checksum).await?,
        };

        match function_name {
            Some(function_name) => narrow_to_function(&abi, function_name),
            None => Ok(abi),
        }
    }

    async fn resolve_remote(&self, checksum: &str) -> Result<ContractAbi> {
        let rounds = self.options.max_redirects.max(1);
        let mut current = checksum.to_string();
        let mut abi = self.remote_abi(&current).await?;

        for round in 1..rounds {
            let Some(target) = self.proxy_target(&current, &abi).await else {
                return Ok(abi);
            };
            if let Some(known) = self.builtin.get(&target) {
                info!("Proxy {} points at built-in contract {}", current, target);
                return Ok(known);
            }
            info!(
                "Following proxy {} to implementation {} (fetch {} of {})",
                current,
                target,
                round + 1,
                rounds
            );
            current = target;
            abi = self.remote_abi(&current).await?;
        }

        debug!("Redirect bound reached at {}, using last fetched ABI", current);
        Ok(abi)
    }

    async fn remote_abi(&self, checksum: &str) -> Result<ContractAbi> {
        let key = format!("abi:{}", checksum);
        self.remote_abis
            .get_or_try_insert(key, async {
                info!("Fetching ABI for {} from explorer", checksum);
                let entries = self.explorer.contract_abi(checksum).await?;
                Ok(Arc::new(entries))
            })
            .await
    }

    // Lookup failures end the chase instead of failing the resolution.
    async fn proxy_target(&self, current: &str, abi: &[AbiEntry]) -> Option<String> {
        let looked_up = match self.options.strategy {
            ProxyStrategy::ImplementationFunction => {
                if !abi.iter().any(|entry| entry.is_function_named("implementation")) {
                    return None;
                }
                self.implementations
                    .get_or_try_insert(format!("impl:abi:{}", current), async {
                        self.chain.implementation_address(current).await.map(Some)
                    })
                    .await
            }
            ProxyStrategy::ExplorerField => {
                self.implementations
                    .get_or_try_insert(format!("impl:explorer:{}", current), async {
                        self.explorer.implementation_address(current).await
                    })
                    .await
            }
        };

        let target = match looked_up {
            Ok(target) => target?,
            Err(e) => {
                warn!("Could not read implementation of proxy {}: {}", current, e);
                return None;
            }
        };
        match to_checksum_address(&target) {
            Ok(target) if target != current => Some(target),
            Ok(_) => None,
            Err(e) => {
                warn!("Proxy {} reports unusable implementation: {}", current, e);
                None
            }
        }
    }

    /// Drops memoized remote lookups. Built-in entries are unaffected.
    pub fn clear_remote_cache(&self) {
        self.remote_abis.clear();
        self.implementations.clear();
    }
}

/// The single `function` entry called `function_name`.
pub fn extract_function_abi(abi: &[AbiEntry], function_name: &str) -> Result<AbiEntry> {
    abi.iter()
        .find(|entry| entry.is_function_named(function_name))
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("Function {} not found in ABI", function_name)))
}

fn narrow_to_function(abi: &[AbiEntry], function_name: &str) -> Result<ContractAbi> {
    extract_function_abi(abi, function_name).map(|entry| Arc::new(vec![entry]))
}

// --- Function call encoding ---

/// ABI-encodes a call to `function_name` as `0x`-prefixed calldata.
///
/// Address-shaped arguments are checksummed first. Overloads are told apart by
/// argument count.
pub fn encode_function_call(abi: &[AbiEntry], function_name: &str, args: &[Value]) -> Result<String> {
    let args = normalize_address_args(args);

    let candidates = abi
        .iter()
        .filter(|entry| entry.is_function_named(function_name))
        .map(to_function)
        .collect::<Result<Vec<_>>>()?;
    if candidates.is_empty() {
        return Err(Error::Encoding(format!(
            "function {} not found in ABI",
            function_name
        )));
    }

    let function = candidates
        .iter()
        .find(|f| f.inputs.len() == args.len())
        .ok_or_else(|| {
            let arities: Vec<String> = candidates.iter().map(|f| f.inputs.len().to_string()).collect();
            Error::Encoding(format!(
                "arg count mismatch for {}: expected {}, got {}",
                function_name,
                arities.join(" or "),
                args.len()
            ))
        })?;

    let tokens = function
        .inputs
        .iter()
        .zip(args.iter())
        .map(|(param, value)| {
            coerce_token(&param.kind, value)
                .map_err(|e| Error::Encoding(format!("argument '{}': {}", param.name, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let data = function
        .encode_input(&tokens)
        .map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(format!("0x{}", hex::encode(data)))
}

fn to_function(entry: &AbiEntry) -> Result<Function> {
    let normalized = json!({
        "name": entry.name.clone().unwrap_or_default(),
        "inputs": entry.inputs,
        "outputs": entry.outputs.clone().unwrap_or_default(),
        "stateMutability": entry.state_mutability.clone().unwrap_or_else(|| "nonpayable".to_string()),
    });
    serde_json::from_value(normalized)
        .map_err(|e| Error::Encoding(format!("malformed ABI entry {:?}: {}", entry.name, e)))
}

fn coerce_token(kind: &ParamType, value: &Value) -> std::result::Result<Token, String> {
    match kind {
        ParamType::Address => {
            let s = value.as_str().ok_or("address arg must be string")?;
            if !is_address(s) {
                return Err(format!("invalid address {}", s));
            }
            Address::from_str(s).map(Token::Address).map_err(|e| e.to_string())
        }
        ParamType::Uint(bits) => {
            let n = parse_uint(value)?;
            if n.bits() > *bits {
                return Err(format!("{} does not fit in uint{}", n, bits));
            }
            Ok(Token::Uint(n))
        }
        ParamType::Int(_) => parse_int(value).map(|n| Token::Int(n.into_raw())),
        ParamType::Bool => match value {
            Value::Bool(b) => Ok(Token::Bool(*b)),
            Value::String(s) if s == "true" || s == "false" => Ok(Token::Bool(s == "true")),
            _ => Err("bool arg must be boolean".to_string()),
        },
        ParamType::String => value
            .as_str()
            .map(|s| Token::String(s.to_string()))
            .ok_or_else(|| "string arg must be string".to_string()),
        ParamType::Bytes => {
            let s = value.as_str().ok_or("bytes arg must be string")?;
            let bytes = match s.strip_prefix("0x") {
                Some(digits) => hex::decode(digits).map_err(|e| e.to_string())?,
                None => s.as_bytes().to_vec(),
            };
            Ok(Token::Bytes(bytes))
        }
        ParamType::FixedBytes(size) => {
            let s = value.as_str().ok_or("fixed bytes arg must be hex string")?;
            let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| e.to_string())?;
            if bytes.len() != *size {
                return Err(format!("expected {} bytes, got {}", size, bytes.len()));
            }
            Ok(Token::FixedBytes(bytes))
        }
        ParamType::Array(inner) => {
            let items = value.as_array().ok_or("array arg must be a JSON array")?;
            items
                .iter()
                .map(|item| coerce_token(inner, item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Token::Array)
        }
        ParamType::FixedArray(inner, size) => {
            let items = value.as_array().ok_or("array arg must be a JSON array")?;
            if items.len() != *size {
                return Err(format!("expected {} elements, got {}", size, items.len()));
            }
            items
                .iter()
                .map(|item| coerce_token(inner, item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Token::FixedArray)
        }
        ParamType::Tuple(components) => {
            let items = value.as_array().ok_or("tuple arg must be a JSON array")?;
            if items.len() != components.len() {
                return Err(format!(
                    "expected {} tuple fields, got {}",
                    components.len(),
                    items.len()
                ));
            }
            components
                .iter()
                .zip(items.iter())
                .map(|(kind, item)| coerce_token(kind, item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Token::Tuple)
        }
    }
}

// Integers arrive as JSON numbers, decimal strings or 0x-prefixed hex strings.
fn parse_uint(value: &Value) -> std::result::Result<U256, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("{} is not an unsigned integer; pass large values as strings", n)),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(digits) => U256::from_str_radix(digits, 16).map_err(|e| format!("{:?}", e)),
            None => U256::from_dec_str(s).map_err(|e| e.to_string()),
        },
        _ => Err("uint arg must be a number or numeric string".to_string()),
    }
}

fn parse_int(value: &Value) -> std::result::Result<I256, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(I256::from)
            .ok_or_else(|| format!("{} is not an integer; pass large values as strings", n)),
        Value::String(s) if s.starts_with("0x") || s.starts_with("-0x") => {
            I256::from_hex_str(s).map_err(|e| e.to_string())
        }
        Value::String(s) => I256::from_dec_str(s).map_err(|e| e.to_string()),
        _ => Err("int arg must be a number or numeric string".to_string()),
    }
}
