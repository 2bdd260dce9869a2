use serde::Deserialize;
use serde_json::{json, Value};

use crate::{ActionError, Envelope, JsonRpcClient};

#[derive(Deserialize, Debug)]
struct SendResult {
  #[serde(alias = "hash")]
  transaction_hash: String,
}

/// Backend that broadcasts signed payloads on the signer's behalf.
#[derive(Clone, Debug)]
pub struct RelayerClient {
  rpc: JsonRpcClient,
}

impl RelayerClient {
  pub fn new(url: impl Into<String>) -> Self {
    Self { rpc: JsonRpcClient::new(url) }
  }

  /// Relays a signature envelope, returning the broadcast transaction.
  pub async fn send(&self, envelope: &Envelope) -> Result<Envelope, ActionError> {
    let Envelope::Signature { signature_data, data, .. } = envelope else {
      return Ok(envelope.clone());
    };

    let params = json!({ "envelope": { "signatureData": signature_data, "data": data } });
    let result: SendResult = self.rpc.request("send", params).await.map_err(ActionError::Relay)?;
    tracing::info!("relayer {} accepted envelope as {}", self.rpc.url(), result.transaction_hash);
    Ok(Envelope::Transaction { hash: result.transaction_hash })
  }

  /// Tells the relayer to execute `payload` on L2 once the L1 commit `hash` lands.
  pub async fn register_transaction(
    &self,
    kind: &str,
    sender: &str,
    hash: &str,
    payload: &Value,
  ) -> Result<(), ActionError> {
    let params = json!({ "type": kind, "sender": sender, "hash": hash, "payload": payload });
    let _: Value = self.rpc.request("registerTransaction", params).await.map_err(ActionError::Relay)?;
    tracing::info!("registered {} commit {} with relayer", kind, hash);
    Ok(())
  }
}
