use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{abi, felt};

/// Identifier of one configured network, e.g. `eth`, `sn-sep` or `s`.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub String);

impl NetworkId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for NetworkId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkFamily {
  #[display("evm")]
  Evm,
  #[display("starknet")]
  Starknet,
  #[display("offchain")]
  Offchain,
}

/// How a signed payload reaches the chain when an authenticator is relayer backed.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayerType {
  #[display("evm")]
  #[serde(rename = "evm")]
  Evm,
  #[display("evm-tx")]
  #[serde(rename = "evm-tx")]
  EvmTx,
  #[display("starknet")]
  #[serde(rename = "starknet")]
  Starknet,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
  #[display("injected")]
  Injected,
  #[display("walletconnect")]
  Walletconnect,
  #[display("walletlink")]
  Walletlink,
  #[display("gnosis")]
  Gnosis,
  #[display("sequence")]
  Sequence,
  #[display("unicorn")]
  Unicorn,
  #[display("argentx")]
  Argentx,
}

pub const EVM_CONNECTORS: &[Connector] = &[
  Connector::Injected,
  Connector::Walletconnect,
  Connector::Walletlink,
  Connector::Gnosis,
  Connector::Sequence,
  Connector::Unicorn,
];

pub const STARKNET_CONNECTORS: &[Connector] = &[Connector::Argentx];

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticatorKind {
  Vanilla,
  EthSig,
  EthTx,
  StarkSig,
  StarkTx,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
  Vanilla,
  Whitelist,
  OzVotes,
  Comp,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutorKind {
  Vanilla,
  SimpleQuorumAvatar,
  SimpleQuorumTimelock,
  EthRelayer,
}

impl ExecutorKind {
  /// Parses an indexer `executors_types` entry. Unknown kinds are not usable by this client.
  pub fn from_type(value: &str) -> Option<Self> {
    match value {
      "Vanilla" => Some(Self::Vanilla),
      "SimpleQuorumAvatar" => Some(Self::SimpleQuorumAvatar),
      "SimpleQuorumTimelock" => Some(Self::SimpleQuorumTimelock),
      "EthRelayer" => Some(Self::EthRelayer),
      _ => None,
    }
  }
}

/// Lowercases and strips leading zeros so that `0x0abc` and `0xABC` compare equal.
pub fn normalize_address(address: &str) -> String {
  let lower = address.trim().to_lowercase();
  let body = lower.strip_prefix("0x").unwrap_or(&lower);
  let trimmed = body.trim_start_matches('0');
  format!("0x{}", if trimmed.is_empty() { "0" } else { trimmed })
}

#[derive(Deserialize, Debug, Clone)]
pub struct AuthenticatorEntry {
  pub address: String,
  pub kind: AuthenticatorKind,
  #[serde(default)]
  pub relayer: Option<RelayerType>,
  #[serde(default)]
  pub contract_supported: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StrategyEntry {
  pub address: String,
  pub kind: StrategyKind,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExecutorEntry {
  pub address: String,
  pub kind: ExecutorKind,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorDescriptor {
  pub address: String,
  pub kind: AuthenticatorKind,
  pub relayer: Option<RelayerType>,
  pub contract_supported: bool,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", content = "kind")]
pub enum TemplateKind {
  Authenticator(AuthenticatorKind),
  Strategy(StrategyKind),
  Executor(ExecutorKind),
}

/// Editor-facing description of something a space can be configured with.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StrategyTemplate {
  pub address: String,
  pub name: String,
  pub kind: TemplateKind,
  pub family: NetworkFamily,
  pub params_schema: Option<Value>,
}

impl StrategyTemplate {
  /// Encodes user supplied params into what the space contract stores for this strategy.
  pub fn generate_params(&self, params: &Value) -> Result<Vec<String>> {
    let TemplateKind::Strategy(kind) = self.kind else {
      return Ok(Vec::new());
    };

    match (kind, self.family) {
      (StrategyKind::Vanilla, NetworkFamily::Evm) => Ok(vec!["0x".to_string()]),
      (StrategyKind::Vanilla, _) => Ok(Vec::new()),
      (StrategyKind::Whitelist, NetworkFamily::Evm) => {
        let members = parse_whitelist(params)?
          .into_iter()
          .map(|(address, power)| Ok(abi::Token::Tuple(vec![abi::Token::address(&address)?, abi::Token::Uint(power)])))
          .collect::<Result<Vec<_>>>()?;
        Ok(vec![abi::encode_hex(&[abi::Token::Array(members)])])
      }
      (StrategyKind::Whitelist, _) => {
        let members = parse_whitelist(params)?;
        let mut out = vec![felt::from_u128(members.len() as u128)];
        for (address, power) in members {
          out.push(address);
          out.extend(felt::split_u256(power));
        }
        Ok(out)
      }
      (StrategyKind::OzVotes | StrategyKind::Comp, _) => {
        let token = params
          .get("contractAddress")
          .and_then(Value::as_str)
          .ok_or_else(|| anyhow!("{} strategy requires contractAddress", kind))?;
        Ok(vec![format!("0x{}", hex::encode(abi::parse_address(token)?))])
      }
    }
  }

  /// Metadata pinned next to the strategy, read back when computing voting power.
  pub fn generate_metadata(&self, params: &Value) -> Result<Option<Value>> {
    match self.kind {
      TemplateKind::Strategy(StrategyKind::Whitelist) => {
        let tree: Vec<Value> = parse_whitelist(params)?
          .into_iter()
          .map(|(address, power)| json!({ "address": address, "votingPower": power.to_string() }))
          .collect();
        Ok(Some(json!({ "name": self.name, "properties": { "tree": tree, "decimals": 0 } })))
      }
      TemplateKind::Strategy(StrategyKind::OzVotes | StrategyKind::Comp) => {
        let decimals = params.get("decimals").and_then(Value::as_u64).unwrap_or(18);
        let symbol = params.get("symbol").and_then(Value::as_str).unwrap_or("VOTE");
        Ok(Some(json!({ "name": self.name, "properties": { "decimals": decimals, "symbol": symbol } })))
      }
      _ => Ok(None),
    }
  }
}

/// Whitelist params are `address:power` pairs, one per line.
fn parse_whitelist(params: &Value) -> Result<Vec<(String, u128)>> {
  let raw = params.get("whitelist").and_then(Value::as_str).ok_or_else(|| anyhow!("missing whitelist param"))?;
  raw
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(|line| {
      let Some((address, power)) = line.split_once(':') else {
        bail!("invalid whitelist entry {line}");
      };
      Ok((address.trim().to_lowercase(), power.trim().parse()?))
    })
    .collect()
}

/// Frozen per-network capability data. Lookups are keyed by normalized address.
#[derive(Debug, Clone)]
pub struct NetworkDescriptor {
  family: NetworkFamily,
  authenticators: HashMap<String, AuthenticatorDescriptor>,
  strategies: HashMap<String, StrategyKind>,
  executors: HashMap<String, ExecutorEntry>,
  editor_authenticators: Vec<StrategyTemplate>,
  editor_strategies: Vec<StrategyTemplate>,
  editor_executors: Vec<StrategyTemplate>,
}

impl NetworkDescriptor {
  pub fn new(
    family: NetworkFamily,
    authenticators: &[AuthenticatorEntry],
    strategies: &[StrategyEntry],
    executors: &[ExecutorEntry],
  ) -> Self {
    let template = |address: &str, name: String, kind: TemplateKind| StrategyTemplate {
      address: address.to_string(),
      name,
      kind,
      family,
      params_schema: params_schema(kind),
    };

    Self {
      family,
      authenticators: authenticators
        .iter()
        .map(|entry| {
          let descriptor = AuthenticatorDescriptor {
            address: entry.address.clone(),
            kind: entry.kind,
            relayer: entry.relayer,
            contract_supported: entry.contract_supported,
          };
          (normalize_address(&entry.address), descriptor)
        })
        .collect(),
      strategies: strategies.iter().map(|entry| (normalize_address(&entry.address), entry.kind)).collect(),
      executors: executors.iter().map(|entry| (normalize_address(&entry.address), entry.clone())).collect(),
      editor_authenticators: authenticators
        .iter()
        .filter(|entry| entry.kind != AuthenticatorKind::Vanilla)
        .map(|entry| template(&entry.address, entry.kind.to_string(), TemplateKind::Authenticator(entry.kind)))
        .collect(),
      editor_strategies: strategies
        .iter()
        .map(|entry| template(&entry.address, entry.kind.to_string(), TemplateKind::Strategy(entry.kind)))
        .collect(),
      editor_executors: executors
        .iter()
        .filter(|entry| entry.kind != ExecutorKind::Vanilla)
        .map(|entry| template(&entry.address, entry.kind.to_string(), TemplateKind::Executor(entry.kind)))
        .collect(),
    }
  }

  pub fn family(&self) -> NetworkFamily {
    self.family
  }

  pub fn authenticator(&self, address: &str) -> Option<&AuthenticatorDescriptor> {
    self.authenticators.get(&normalize_address(address))
  }

  pub fn is_authenticator_supported(&self, address: &str) -> bool {
    self.authenticator(address).is_some()
  }

  pub fn is_authenticator_contract_supported(&self, address: &str) -> bool {
    self.authenticator(address).is_some_and(|authenticator| authenticator.contract_supported)
  }

  pub fn relayer_type(&self, address: &str) -> Option<RelayerType> {
    self.authenticator(address).and_then(|authenticator| authenticator.relayer)
  }

  pub fn authenticator_of_kind(&self, kind: AuthenticatorKind) -> Option<&AuthenticatorDescriptor> {
    self.authenticators.values().find(|authenticator| authenticator.kind == kind)
  }

  pub fn is_strategy_supported(&self, address: &str) -> bool {
    self.strategies.contains_key(&normalize_address(address))
  }

  pub fn strategy_kind(&self, address: &str) -> Option<StrategyKind> {
    self.strategies.get(&normalize_address(address)).copied()
  }

  pub fn is_executor_supported(&self, address: &str) -> bool {
    self.executors.contains_key(&normalize_address(address))
  }

  pub fn executor_kind(&self, address: &str) -> Option<ExecutorKind> {
    self.executors.get(&normalize_address(address)).map(|entry| entry.kind)
  }

  pub fn executor_of_kind(&self, kind: ExecutorKind) -> Option<&ExecutorEntry> {
    self.executors.values().find(|entry| entry.kind == kind)
  }

  pub fn is_vanilla_executor(&self, address: &str) -> bool {
    self.executor_kind(address) == Some(ExecutorKind::Vanilla)
  }

  pub fn editor_authenticators(&self) -> &[StrategyTemplate] {
    &self.editor_authenticators
  }

  pub fn editor_strategies(&self) -> &[StrategyTemplate] {
    &self.editor_strategies
  }

  pub fn editor_executors(&self) -> &[StrategyTemplate] {
    &self.editor_executors
  }
}

fn params_schema(kind: TemplateKind) -> Option<Value> {
  match kind {
    TemplateKind::Strategy(StrategyKind::Whitelist) => Some(json!({
      "type": "object",
      "required": ["whitelist"],
      "properties": { "whitelist": { "type": "string", "format": "addresses-with-voting-power" } }
    })),
    TemplateKind::Strategy(StrategyKind::OzVotes | StrategyKind::Comp) => Some(json!({
      "type": "object",
      "required": ["contractAddress"],
      "properties": {
        "contractAddress": { "type": "string", "format": "address" },
        "decimals": { "type": "integer" },
        "symbol": { "type": "string" }
      }
    })),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn evm_descriptor() -> NetworkDescriptor {
    NetworkDescriptor::new(
      NetworkFamily::Evm,
      &[
        AuthenticatorEntry {
          address: "0x00000000000000000000000000000000000000a1".to_string(),
          kind: AuthenticatorKind::EthSig,
          relayer: Some(RelayerType::Evm),
          contract_supported: false,
        },
        AuthenticatorEntry {
          address: "0x00000000000000000000000000000000000000A2".to_string(),
          kind: AuthenticatorKind::EthTx,
          relayer: None,
          contract_supported: true,
        },
      ],
      &[StrategyEntry {
        address: "0x00000000000000000000000000000000000000b1".to_string(),
        kind: StrategyKind::Vanilla,
      }],
      &[ExecutorEntry {
        address: "0x00000000000000000000000000000000000000c1".to_string(),
        kind: ExecutorKind::Vanilla,
      }],
    )
  }

  #[test]
  fn test_normalize_address() {
    assert_eq!(normalize_address("0x00ABc"), "0xabc");
    assert_eq!(normalize_address("0x0000"), "0x0");
    assert_eq!(normalize_address(" 0xdead "), "0xdead");
  }

  #[test]
  fn test_lookups_ignore_case_and_padding() {
    let descriptor = evm_descriptor();

    assert!(descriptor.is_authenticator_supported("0xa2"));
    assert!(descriptor.is_authenticator_contract_supported("0x00000000000000000000000000000000000000a2"));
    assert!(!descriptor.is_authenticator_contract_supported("0xa1"));
    assert_eq!(descriptor.relayer_type("0xA1"), Some(RelayerType::Evm));
    assert_eq!(descriptor.relayer_type("0xa2"), None);
    assert!(descriptor.is_strategy_supported("0xb1"));
    assert!(!descriptor.is_strategy_supported("0xb2"));
    assert!(descriptor.is_vanilla_executor("0xc1"));
    assert_eq!(
      descriptor.executor_of_kind(ExecutorKind::Vanilla).map(|entry| entry.address.as_str()),
      Some("0x00000000000000000000000000000000000000c1")
    );
  }

  #[test]
  fn test_relayer_type_serde() {
    let parsed: RelayerType = serde_json::from_str("\"evm-tx\"").unwrap();
    assert_eq!(parsed, RelayerType::EvmTx);
    assert_eq!(RelayerType::Starknet.to_string(), "starknet");
  }

  #[test]
  fn test_editor_templates_skip_vanilla_executor() {
    let descriptor = evm_descriptor();
    assert_eq!(descriptor.editor_authenticators().len(), 2);
    assert_eq!(descriptor.editor_strategies().len(), 1);
    assert!(descriptor.editor_executors().is_empty());
  }

  #[test]
  fn test_whitelist_metadata() {
    let template = StrategyTemplate {
      address: "0xb2".to_string(),
      name: "Whitelist".to_string(),
      kind: TemplateKind::Strategy(StrategyKind::Whitelist),
      family: NetworkFamily::Starknet,
      params_schema: None,
    };
    let params = json!({ "whitelist": "0xAA:10\n\n0xbb: 5" });

    let metadata = template.generate_metadata(&params).unwrap().unwrap();
    assert_eq!(metadata["properties"]["tree"][0]["address"], "0xaa");
    assert_eq!(metadata["properties"]["tree"][1]["votingPower"], "5");

    let felts = template.generate_params(&params).unwrap();
    assert_eq!(felts[0], "0x2");
    assert_eq!(felts.len(), 7);
  }
}
