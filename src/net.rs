use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{config::Config, errors::VoteError};

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

/// Ethereum JSON-RPC over HTTP
#[derive(Clone)]
pub struct RpcClient {
    url: String,
    client: Client,
    next_id: Arc<AtomicU64>,
}

/// Connect to a JSON-RPC node
pub fn connect_rpc(config: &Config) -> Result<RpcClient, VoteError> {
    let client = reqwest::ClientBuilder::new()
        .timeout(config.rpc_timeout())
        .build()?;
    Ok(RpcClient {
        url: config.rpc_url.clone(),
        client,
        next_id: Arc::new(AtomicU64::new(1)),
    })
}

impl RpcClient {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn request_raw(&self, method: &str, params: Value) -> Result<Value, VoteError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("rpc #{id} {method}");
        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        into_result(response)
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, VoteError> {
        let result = self.request_raw(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn block_number(&self) -> Result<u64, VoteError> {
        let n: String = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&n)
    }
}

fn into_result(response: RpcResponse) -> Result<Value, VoteError> {
    if let Some(e) = response.error {
        return Err(VoteError::Rpc {
            code: e.code,
            message: e.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

/// Parses a hex `QUANTITY` such as `0x1a`
pub fn parse_quantity(s: &str) -> Result<u64, VoteError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| VoteError::InvalidJson(format!("Not a quantity: {s}")))?;
    if digits.is_empty() {
        return Err(VoteError::InvalidJson(format!("Not a quantity: {s}")));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|_| VoteError::InvalidJson(format!("Not a quantity: {s}")))
}

pub fn to_quantity(v: u64) -> String {
    format!("0x{v:x}")
}
