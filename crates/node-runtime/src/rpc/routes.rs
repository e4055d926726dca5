//! # JSON-RPC Routes
//!
//! Method dispatch over the node's stores and reactors. Params may be given
//! by name (object) or by position (array).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use shared_types::{Block, Transaction};
use tracing::debug;

use super::context::RpcContext;

/// Standard JSON-RPC 2.0 error codes plus the server range used here.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const RESOURCE_NOT_FOUND: i32 = -32001;
    pub const TRANSACTION_REJECTED: i32 = -32003;
}

/// Block metas returned by `blockchain_info` when no range is given.
const DEFAULT_BLOCKCHAIN_INFO_SPAN: u64 = 20;

/// Every method served.
pub const METHODS: &[&str] = &[
    "status",
    "net_info",
    "blockchain_info",
    "get_block",
    "mempool_size",
    "broadcast_tx",
    "dump_consensus_state",
    "list_validators",
];

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcFault {
    pub code: i32,
    pub message: String,
}

impl RpcFault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(details: impl std::fmt::Display) -> Self {
        Self::new(codes::PARSE_ERROR, format!("Parse error: {details}"))
    }

    pub fn invalid_request(details: impl std::fmt::Display) -> Self {
        Self::new(codes::INVALID_REQUEST, format!("Invalid request: {details}"))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(details: impl std::fmt::Display) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("Invalid params: {details}"))
    }

    pub fn internal(details: impl std::fmt::Display) -> Self {
        Self::new(codes::INTERNAL_ERROR, format!("Internal error: {details}"))
    }

    pub fn not_found(resource: impl std::fmt::Display) -> Self {
        Self::new(codes::RESOURCE_NOT_FOUND, format!("Resource not found: {resource}"))
    }
}

type RpcResult = Result<Value, RpcFault>;

/// Run `method` against `ctx`.
pub fn dispatch(ctx: &RpcContext, method: &str, params: &Value) -> RpcResult {
    debug!(method, "RPC call");
    match method {
        "status" => status(ctx),
        "net_info" => net_info(ctx),
        "blockchain_info" => blockchain_info(ctx, params),
        "get_block" => get_block(ctx, params),
        "mempool_size" => Ok(json!({ "n_txs": ctx.mempool.size() })),
        "broadcast_tx" => broadcast_tx(ctx, params),
        "dump_consensus_state" => to_value(ctx.consensus_state.dump()),
        "list_validators" => list_validators(ctx),
        other => Err(RpcFault::method_not_found(other)),
    }
}

/// Param `name` from an object, or position `index` from an array.
fn param<T: DeserializeOwned>(params: &Value, name: &str, index: usize) -> Result<Option<T>, RpcFault> {
    let raw = match params {
        Value::Null => None,
        Value::Object(map) => map.get(name),
        Value::Array(items) => items.get(index),
        _ => return Err(RpcFault::invalid_params("params must be an object or an array")),
    };
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| RpcFault::invalid_params(format!("{name}: {e}"))),
    }
}

fn required<T: DeserializeOwned>(params: &Value, name: &str, index: usize) -> Result<T, RpcFault> {
    param(params, name, index)?.ok_or_else(|| RpcFault::invalid_params(format!("missing {name}")))
}

fn to_value<T: Serialize>(value: T) -> RpcResult {
    serde_json::to_value(value).map_err(RpcFault::internal)
}

fn block_json(block: &Block) -> Value {
    json!({
        "hash": hex::encode(block.hash()),
        "height": block.height(),
        "parent_hash": hex::encode(block.header.parent_hash),
        "time": block.header.timestamp,
        "proposer": hex::encode(block.header.proposer),
        "tx_root": hex::encode(block.header.tx_root),
        "txs": block.transactions.iter().map(|tx| hex::encode(tx.hash())).collect::<Vec<_>>(),
    })
}

fn status(ctx: &RpcContext) -> RpcResult {
    let state = ctx.consensus_state.chain_state();
    Ok(json!({
        "node_info": ctx.switch.node_info(),
        "latest_block_height": state.last_block_height,
        "latest_block_hash": hex::encode(state.last_block_hash),
        "latest_block_time": state.last_block_time,
        "syncing": ctx.consensus.is_syncing(),
        "validator": ctx.consensus.validator_public_key().map(hex::encode),
    }))
}

fn net_info(ctx: &RpcContext) -> RpcResult {
    let peers: Vec<Value> = ctx
        .switch
        .peers()
        .iter()
        .map(|peer| {
            json!({
                "address": peer.address().to_string(),
                "outbound": peer.is_outbound(),
                "connected_at": peer.connected_at(),
            })
        })
        .collect();
    let listeners: Vec<String> = ctx
        .switch
        .listeners()
        .iter()
        .map(|l| l.external_address().to_string())
        .collect();
    Ok(json!({
        "listening": ctx.switch.is_listening(),
        "listeners": listeners,
        "n_peers": peers.len(),
        "peers": peers,
    }))
}

fn blockchain_info(ctx: &RpcContext, params: &Value) -> RpcResult {
    let height = ctx.block_store.height().map_err(RpcFault::internal)?;
    let max = param::<u64>(params, "max_height", 1)?.unwrap_or(height).min(height);
    let min = param::<u64>(params, "min_height", 0)?
        .unwrap_or_else(|| max.saturating_sub(DEFAULT_BLOCKCHAIN_INFO_SPAN - 1));
    if min > max {
        return Err(RpcFault::invalid_params(format!(
            "min_height {min} is greater than max_height {max}"
        )));
    }
    let metas: Vec<Value> = ctx
        .block_store
        .load_range(min, max)
        .map_err(RpcFault::internal)?
        .iter()
        .map(|b| {
            json!({
                "height": b.height(),
                "hash": hex::encode(b.hash()),
                "num_txs": b.transactions.len(),
                "time": b.header.timestamp,
            })
        })
        .collect();
    Ok(json!({ "last_height": height, "block_metas": metas }))
}

fn get_block(ctx: &RpcContext, params: &Value) -> RpcResult {
    let height: u64 = required(params, "height", 0)?;
    match ctx.block_store.load_block(height).map_err(RpcFault::internal)? {
        Some(block) => Ok(block_json(&block)),
        None => Err(RpcFault::not_found(format!("block at height {height}"))),
    }
}

fn broadcast_tx(ctx: &RpcContext, params: &Value) -> RpcResult {
    let tx: Transaction = required(params, "tx", 0)?;
    let hash = ctx
        .mempool
        .check_tx(tx)
        .map_err(|e| RpcFault::new(codes::TRANSACTION_REJECTED, e.to_string()))?;
    Ok(json!({ "hash": hex::encode(hash) }))
}

fn list_validators(ctx: &RpcContext) -> RpcResult {
    let validators: Vec<Value> = ctx
        .consensus_state
        .validators()
        .iter()
        .map(|v| {
            json!({
                "public_key": hex::encode(v.public_key),
                "voting_power": v.voting_power,
            })
        })
        .collect();
    Ok(json!({ "validators": validators }))
}
