use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::abi::{self, Token};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Token20 {
  pub address: String,
  pub symbol: String,
  pub decimals: u32,
}

/// What the editor needs to rebuild a transaction form; never sent on-chain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "_type", content = "_form", rename_all = "camelCase")]
pub enum TransactionForm {
  SendToken { recipient: String, amount: String, token: Token20 },
  SendNft { recipient: String, amount: String, nft: Value },
  ContractCall { abi: Vec<Value>, recipient: String, method: String, args: Value },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
  #[serde(flatten)]
  pub form: TransactionForm,
  pub to: String,
  pub data: String,
  pub value: String,
  pub salt: String,
}

/// The on-chain shape executed by module executors.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MetaTransaction {
  pub to: String,
  pub value: String,
  pub data: String,
  pub operation: u8,
  pub salt: String,
}

impl From<&Transaction> for MetaTransaction {
  fn from(tx: &Transaction) -> Self {
    MetaTransaction {
      to: tx.to.clone(),
      value: tx.value.clone(),
      data: tx.data.clone(),
      operation: 0,
      salt: tx.salt.clone(),
    }
  }
}

impl MetaTransaction {
  pub fn to_token(&self) -> Result<Token> {
    let value: u128 = self.value.parse().with_context(|| format!("invalid transaction value {}", self.value))?;
    let salt: u128 = self.salt.parse().with_context(|| format!("invalid transaction salt {}", self.salt))?;
    Ok(Token::Tuple(vec![
      Token::address(&self.to)?,
      Token::Uint(value),
      Token::bytes_hex(&self.data)?,
      Token::Uint(u128::from(self.operation)),
      Token::Uint(salt),
    ]))
  }
}

/// `abi.encode(MetaTransaction[])`, the payload module executors decode.
pub fn encode_meta_transactions(transactions: &[MetaTransaction]) -> Result<Vec<u8>> {
  let items = transactions.iter().map(MetaTransaction::to_token).collect::<Result<Vec<_>>>()?;
  Ok(abi::encode(&[Token::Array(items)]))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_transaction_serde_shape() {
    let raw = json!({
      "_type": "sendToken",
      "_form": {
        "recipient": "0x0000000000000000000000000000000000000001",
        "amount": "10",
        "token": { "address": "0x0000000000000000000000000000000000000002", "symbol": "USDC", "decimals": 6 }
      },
      "to": "0x0000000000000000000000000000000000000002",
      "data": "0x",
      "value": "0",
      "salt": "42"
    });

    let tx: Transaction = serde_json::from_value(raw.clone()).unwrap();
    assert!(matches!(tx.form, TransactionForm::SendToken { .. }));
    assert_eq!(serde_json::to_value(&tx).unwrap(), raw);

    let meta = MetaTransaction::from(&tx);
    assert_eq!(meta.operation, 0);
    assert_eq!(meta.salt, "42");
  }

  #[test]
  fn test_encode_meta_transactions() {
    let meta = MetaTransaction {
      to: "0x0000000000000000000000000000000000000001".to_string(),
      value: "5".to_string(),
      data: "0x".to_string(),
      operation: 0,
      salt: "1".to_string(),
    };

    let encoded = encode_meta_transactions(&[meta]).unwrap();
    // offset, length, tuple offset, 5 head words, empty bytes length
    assert_eq!(encoded.len(), 32 * 9);
    assert_eq!(encoded[31], 32);
    assert_eq!(encoded[63], 1);
  }

  #[test]
  fn test_invalid_value_is_rejected() {
    let meta = MetaTransaction {
      to: "0x0000000000000000000000000000000000000001".to_string(),
      value: "abc".to_string(),
      data: "0x".to_string(),
      operation: 0,
      salt: "1".to_string(),
    };
    assert!(meta.to_token().is_err());
  }
}
