use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{NetworkId, RelayerType};

/// What a write action handed back. Callers branch on the variant, never on field presence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
  /// Broadcast already happened, directly or through a relayer.
  Transaction { hash: String },
  /// Signed off-chain, still waiting to be relayed.
  Signature { relayer: RelayerType, signature_data: SignatureData, data: Value },
  /// First half of an L1 to L2 transaction; the L2 half is registered with the relayer.
  Commit { commit_tx: String, commit_hash: String, base_network: NetworkId, payload: Value },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignatureData {
  pub address: String,
  pub signature: String,
  pub domain: Value,
  pub types: Value,
  pub message: Value,
  pub primary_type: String,
}

impl Envelope {
  /// Id to track in the pending ledger, present once something was broadcast.
  pub fn tx_id(&self) -> Option<&str> {
    match self {
      Envelope::Transaction { hash } => Some(hash),
      Envelope::Commit { commit_tx, .. } => Some(commit_tx),
      Envelope::Signature { .. } => None,
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
  pub tx_id: String,
  pub block_number: Option<u64>,
  pub success: bool,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_envelope_tag() {
    let envelope = Envelope::Transaction { hash: "0xabc".to_string() };
    assert_eq!(serde_json::to_value(&envelope).unwrap(), json!({ "type": "transaction", "hash": "0xabc" }));
    assert_eq!(envelope.tx_id(), Some("0xabc"));
  }

  #[test]
  fn test_signature_has_no_tx_id() {
    let envelope = Envelope::Signature {
      relayer: RelayerType::Evm,
      signature_data: SignatureData {
        address: "0x1".to_string(),
        signature: "0x2".to_string(),
        domain: json!({}),
        types: json!({}),
        message: json!({}),
        primary_type: "Vote".to_string(),
      },
      data: json!({}),
    };
    assert_eq!(envelope.tx_id(), None);
  }
}
