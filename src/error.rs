use thiserror::Error;

use crate::NetworkId;

const USER_ABORT_CODES: &[&str] = &["4001", "ACTION_REJECTED"];
const USER_ABORT_MESSAGES: &[&str] = &["User abort", "User rejected the request.", "Execute failed"];

/// Error surfaced by a wallet connector when asked to sign or send.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct WalletError {
  pub code: Option<String>,
  pub message: String,
}

impl WalletError {
  pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
    Self { code: code.map(str::to_string), message: message.into() }
  }

  /// Whether the user declined the request in their wallet.
  pub fn is_user_abort(&self) -> bool {
    self.code.as_deref().is_some_and(|code| USER_ABORT_CODES.contains(&code))
      || USER_ABORT_MESSAGES.contains(&self.message.as_str())
  }
}

/// JSON-RPC transport errors, shared by chain providers and relayers.
#[derive(Error, Debug)]
pub enum RpcError {
  #[error("rpc request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("rpc endpoint returned status {0}")]
  Status(u16),
  #[error("rpc error {code}: {message}")]
  Rpc { code: i64, message: String },
  #[error("rpc response had neither result nor error")]
  EmptyResponse,
  #[error("invalid rpc response: {0}")]
  Decode(#[from] serde_json::Error),
}

/// Classified failure of a write action.
#[derive(Error, Debug)]
pub enum ActionError {
  #[error("user rejected the request: {0}")]
  UserAbort(WalletError),
  #[error("wallet error: {0}")]
  Wallet(WalletError),
  #[error("unsupported space")]
  UnsupportedSpace,
  #[error("no supported executor configured")]
  NoSupportedExecutor,
  #[error("network {0} is not enabled")]
  NetworkNotEnabled(NetworkId),
  #[error("network {0} is read-only")]
  ReadOnlyNetwork(NetworkId),
  #[error("{operation} is not supported on network {network}")]
  UnsupportedOperation { network: NetworkId, operation: &'static str },
  #[error("invalid vote choice {0}")]
  InvalidChoice(u8),
  #[error("relayer rejected the request: {0}")]
  Relay(RpcError),
  #[error("failed to pin content: {0}")]
  Pin(String),
  #[error(transparent)]
  Transport(#[from] anyhow::Error),
}

impl From<WalletError> for ActionError {
  fn from(err: WalletError) -> Self {
    if err.is_user_abort() {
      ActionError::UserAbort(err)
    } else {
      ActionError::Wallet(err)
    }
  }
}

impl ActionError {
  pub fn is_user_abort(&self) -> bool {
    matches!(self, ActionError::UserAbort(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_wallet_rejections_are_user_aborts() {
    assert!(WalletError::new(Some("4001"), "MetaMask Tx Signature: User denied").is_user_abort());
    assert!(WalletError::new(Some("ACTION_REJECTED"), "rejected").is_user_abort());
    assert!(WalletError::new(None, "User abort").is_user_abort());
    assert!(!WalletError::new(Some("-32000"), "insufficient funds").is_user_abort());
  }

  #[test]
  fn test_from_wallet_error_classifies() {
    let abort: ActionError = WalletError::new(None, "Execute failed").into();
    assert!(abort.is_user_abort());

    let other: ActionError = WalletError::new(Some("-32603"), "nonce too low").into();
    assert!(matches!(other, ActionError::Wallet(_)));
    assert!(!other.is_user_abort());
  }

  #[test]
  fn test_messages() {
    assert_eq!(ActionError::UnsupportedSpace.to_string(), "unsupported space");
    assert_eq!(ActionError::NoSupportedExecutor.to_string(), "no supported executor configured");
    assert_eq!(ActionError::ReadOnlyNetwork(NetworkId::from("s")).to_string(), "network s is read-only");
  }
}
