use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::time::sleep;

use crate::{Receipt, RpcError};

#[derive(Serialize)]
struct RpcRequest<'a, P> {
  jsonrpc: &'static str,
  method: &'a str,
  params: P,
  id: u64,
}

#[derive(Deserialize)]
struct RpcErrorBody {
  code: i64,
  message: String,
}

/// Minimal JSON-RPC 2.0 client. Errors are returned as-is, nothing is retried.
#[derive(Clone, Debug)]
pub struct JsonRpcClient {
  url: String,
  client: Client,
}

impl JsonRpcClient {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into(), client: Client::new() }
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  pub async fn request<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R, RpcError> {
    let response =
      self.client.post(&self.url).json(&RpcRequest { jsonrpc: "2.0", method, params, id: 1 }).send().await?;

    if !response.status().is_success() {
      return Err(RpcError::Status(response.status().as_u16()));
    }

    let body = response.bytes().await?;
    decode_response(&body)
  }
}

/// `result: null` is a valid answer (e.g. a pending receipt), only a missing `result` is empty.
fn decode_response<R: DeserializeOwned>(body: &[u8]) -> Result<R, RpcError> {
  let mut response: Map<String, Value> = serde_json::from_slice(body)?;
  if let Some(error) = response.remove("error").filter(|error| !error.is_null()) {
    let error: RpcErrorBody = serde_json::from_value(error)?;
    return Err(RpcError::Rpc { code: error.code, message: error.message });
  }
  let result = response.remove("result").ok_or(RpcError::EmptyResponse)?;
  Ok(serde_json::from_value(result)?)
}

#[derive(Clone, Copy, Debug)]
pub struct PollConfig {
  pub interval: Duration,
  pub attempts: u32,
}

impl Default for PollConfig {
  fn default() -> Self {
    Self { interval: Duration::from_secs(2), attempts: 90 }
  }
}

/// Read access to a chain, shared by every call made through one network.
#[async_trait]
pub trait ChainProvider: Send + Sync {
  async fn get_block_number(&self) -> Result<u64>;

  /// Resolves once the transaction is included. A reverted transaction is an error.
  async fn wait_for_transaction(&self, tx_id: &str) -> Result<Receipt>;

  async fn call(&self, to: &str, data: &str) -> Result<String>;

  async fn is_contract(&self, address: &str) -> Result<bool>;
}

pub struct EvmProvider {
  rpc: JsonRpcClient,
  poll: PollConfig,
}

impl EvmProvider {
  pub fn new(rpc_url: &str, poll: PollConfig) -> Self {
    Self { rpc: JsonRpcClient::new(rpc_url), poll }
  }
}

#[async_trait]
impl ChainProvider for EvmProvider {
  async fn get_block_number(&self) -> Result<u64> {
    let block: String = self.rpc.request("eth_blockNumber", json!([])).await?;
    parse_quantity(&block)
  }

  async fn wait_for_transaction(&self, tx_id: &str) -> Result<Receipt> {
    for attempt in 0 .. self.poll.attempts {
      let receipt: Option<Value> = self.rpc.request("eth_getTransactionReceipt", json!([tx_id])).await?;
      if let Some(receipt) = receipt {
        let success = receipt.get("status").and_then(Value::as_str) == Some("0x1");
        let block_number =
          receipt.get("blockNumber").and_then(Value::as_str).map(parse_quantity).transpose()?;
        if !success {
          bail!("transaction {tx_id} reverted");
        }
        return Ok(Receipt { tx_id: tx_id.to_string(), block_number, success });
      }
      tracing::debug!("receipt for {} not available yet (attempt {})", tx_id, attempt);
      sleep(self.poll.interval).await;
    }
    Err(anyhow!("timed out waiting for transaction {tx_id}"))
  }

  async fn call(&self, to: &str, data: &str) -> Result<String> {
    Ok(self.rpc.request("eth_call", json!([{ "to": to, "data": data }, "latest"])).await?)
  }

  async fn is_contract(&self, address: &str) -> Result<bool> {
    let code: String = self.rpc.request("eth_getCode", json!([address, "latest"])).await?;
    Ok(code != "0x" && !code.is_empty())
  }
}

pub struct StarknetProvider {
  rpc: JsonRpcClient,
  poll: PollConfig,
}

impl StarknetProvider {
  pub fn new(rpc_url: &str, poll: PollConfig) -> Self {
    Self { rpc: JsonRpcClient::new(rpc_url), poll }
  }
}

#[async_trait]
impl ChainProvider for StarknetProvider {
  async fn get_block_number(&self) -> Result<u64> {
    Ok(self.rpc.request("starknet_blockNumber", json!([])).await?)
  }

  async fn wait_for_transaction(&self, tx_id: &str) -> Result<Receipt> {
    for attempt in 0 .. self.poll.attempts {
      match self.rpc.request::<_, Value>("starknet_getTransactionReceipt", json!([tx_id])).await {
        Ok(receipt) => {
          let status = receipt.get("execution_status").and_then(Value::as_str).unwrap_or("SUCCEEDED");
          if status == "REVERTED" {
            bail!("transaction {tx_id} reverted");
          }
          let block_number = receipt.get("block_number").and_then(Value::as_u64);
          if block_number.is_some() {
            return Ok(Receipt { tx_id: tx_id.to_string(), block_number, success: true });
          }
        }
        // 29: transaction hash not found, the sequencer has not seen it yet
        Err(RpcError::Rpc { code: 29, .. }) => {}
        Err(err) => return Err(err).context("failed to fetch transaction receipt"),
      }
      tracing::debug!("receipt for {} not available yet (attempt {})", tx_id, attempt);
      sleep(self.poll.interval).await;
    }
    Err(anyhow!("timed out waiting for transaction {tx_id}"))
  }

  /// `data` is `selector:felt,felt,..`; the result felts come back comma separated.
  async fn call(&self, to: &str, data: &str) -> Result<String> {
    let (entrypoint, calldata) = data.split_once(':').unwrap_or((data, ""));
    let calldata: Vec<&str> = calldata.split(',').filter(|felt| !felt.is_empty()).collect();
    let result: Vec<String> = self
      .rpc
      .request(
        "starknet_call",
        json!([{ "contract_address": to, "entry_point_selector": entrypoint, "calldata": calldata }, "latest"]),
      )
      .await?;
    Ok(result.join(","))
  }

  /// Starknet accounts are all contracts but sign like externally owned accounts.
  async fn is_contract(&self, _address: &str) -> Result<bool> {
    Ok(false)
  }
}

pub fn parse_quantity(value: &str) -> Result<u64> {
  let digits = value.strip_prefix("0x").ok_or_else(|| anyhow!("invalid quantity {value}"))?;
  let digits = if digits.is_empty() { "0" } else { digits };
  u64::from_str_radix(digits, 16).with_context(|| format!("invalid quantity {value}"))
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decode_response() {
    let ok: u64 = decode_response(br#"{"jsonrpc":"2.0","id":1,"result":7}"#).unwrap();
    assert_eq!(ok, 7);

    let err = decode_response::<u64>(br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nope"}}"#);
    assert!(matches!(err, Err(RpcError::Rpc { code: -32000, .. })));

    let empty = decode_response::<u64>(br#"{"jsonrpc":"2.0","id":1}"#);
    assert!(matches!(empty, Err(RpcError::EmptyResponse)));

    let pending: Option<u64> = decode_response(br#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
    assert_eq!(pending, None);

    assert!(matches!(decode_response::<u64>(b"<html>"), Err(RpcError::Decode(_))));
  }

  #[test]
  fn test_parse_quantity() {
    assert_eq!(parse_quantity("0x10").unwrap(), 16);
    assert_eq!(parse_quantity("0x").unwrap(), 0);
    assert!(parse_quantity("16").is_err());
  }
}
