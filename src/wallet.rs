use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Connector, WalletError};

/// A Starknet contract call, the unit of an invoke transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Call {
  pub contract_address: String,
  pub entrypoint: String,
  pub calldata: Vec<String>,
}

/// A transaction for the connected wallet to sign and broadcast.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionRequest {
  Evm { to: String, data: String, value: u128 },
  Starknet { calls: Vec<Call> },
}

impl TransactionRequest {
  pub fn evm(to: impl Into<String>, data: impl Into<String>) -> Self {
    TransactionRequest::Evm { to: to.into(), data: data.into(), value: 0 }
  }

  pub fn invoke(contract_address: impl Into<String>, entrypoint: &str, calldata: Vec<String>) -> Self {
    TransactionRequest::Starknet {
      calls: vec![Call { contract_address: contract_address.into(), entrypoint: entrypoint.to_string(), calldata }],
    }
  }
}

/// A connected wallet. Key management and signing live behind this trait.
#[async_trait]
pub trait Wallet: Send + Sync {
  fn account(&self) -> &str;

  fn connector(&self) -> Connector;

  /// Chain id the wallet is currently connected to, as the chain reports it.
  fn chain_id(&self) -> &str;

  /// Signs and broadcasts, returning the transaction hash.
  async fn send_transaction(&self, request: TransactionRequest) -> Result<String, WalletError>;

  /// Signs EIP-712 or SNIP-12 typed data, returning the serialized signature.
  async fn sign_typed_data(&self, typed_data: &Value) -> Result<String, WalletError>;
}
