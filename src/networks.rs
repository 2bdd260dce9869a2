mod evm;
mod offchain;
mod starknet;
mod sx_api;

use std::{
  sync::Arc,
  time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use evm::EvmNetwork;
pub use offchain::{HubApi, OffchainNetwork};
pub use starknet::StarknetNetwork;
pub use sx_api::SxApi;

use crate::{
  build_execution, ActionError, AuthenticatorEntry, ChainProvider, ExecutionData, ExecutionEncoder, ExecutorEntry,
  ExecutorKind, ExecutorRef, Network, NetworkDescriptor, NetworkFamily, NetworkHelpers, NetworkId, Pinned, Pinner,
  PollConfig, ProposeParams, Receipt, StrategyEntry,
};

/// The bundled description of every network the hub knows about.
#[derive(Deserialize, Debug, Clone)]
pub struct NetworksManifest {
  pub networks: Vec<NetworkConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Contracts {
  pub proxy_factory: Option<String>,
  pub master_space: Option<String>,
  pub space_class_hash: Option<String>,
  pub starknet_commit: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NetworkConfig {
  pub id: NetworkId,
  pub family: NetworkFamily,
  pub name: String,
  pub chain_id: String,
  /// L1 a Starknet network settles to.
  #[serde(default)]
  pub base_network: Option<NetworkId>,
  pub api_url: String,
  #[serde(default)]
  pub rpc_url: Option<String>,
  #[serde(default)]
  pub relayer_url: Option<String>,
  #[serde(default)]
  pub explorer_url: Option<String>,
  #[serde(default)]
  pub contracts: Contracts,
  #[serde(default)]
  pub authenticators: Vec<AuthenticatorEntry>,
  #[serde(default)]
  pub strategies: Vec<StrategyEntry>,
  #[serde(default)]
  pub executors: Vec<ExecutorEntry>,
}

impl NetworkConfig {
  pub fn descriptor(&self) -> NetworkDescriptor {
    NetworkDescriptor::new(self.family, &self.authenticators, &self.strategies, &self.executors)
  }

  fn require<'a>(&self, value: &'a Option<String>, what: &str) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| anyhow!("network {} has no {}", self.id, what))
  }
}

/// Shared collaborators handed to every network at construction.
#[derive(Clone)]
pub struct NetworkDeps {
  pub pinner: Arc<dyn Pinner>,
  pub poll: PollConfig,
}

/// Builds the network for `config`. Nothing is fetched here; clients connect lazily.
pub fn build_network(
  config: &NetworkConfig,
  manifest: &NetworksManifest,
  deps: &NetworkDeps,
) -> Result<Arc<dyn Network>> {
  Ok(match config.family {
    NetworkFamily::Offchain => Arc::new(OffchainNetwork::new(config, deps)),
    NetworkFamily::Evm => Arc::new(EvmNetwork::new(config, deps)?),
    NetworkFamily::Starknet => {
      let base_id =
        config.base_network.as_ref().ok_or_else(|| anyhow!("network {} has no base network", config.id))?;
      let base = manifest
        .networks
        .iter()
        .find(|network| &network.id == base_id)
        .ok_or_else(|| anyhow!("base network {} of {} is not in the manifest", base_id, config.id))?;
      Arc::new(StarknetNetwork::new(config, base, deps)?)
    }
  })
}

/// How a chain measures proposal timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
  BlockNumber,
  Timestamp,
}

pub fn unix_now() -> u64 {
  SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_secs()).unwrap_or_default()
}

/// Helpers backed by a chain provider, shared by the EVM and Starknet networks.
pub struct ChainHelpers {
  provider: Arc<dyn ChainProvider>,
  pinner: Arc<dyn Pinner>,
  explorer_url: Option<String>,
  clock: Clock,
}

impl ChainHelpers {
  pub fn new(
    provider: Arc<dyn ChainProvider>,
    pinner: Arc<dyn Pinner>,
    explorer_url: Option<String>,
    clock: Clock,
  ) -> Self {
    Self { provider, pinner, explorer_url, clock }
  }
}

#[async_trait]
impl NetworkHelpers for ChainHelpers {
  async fn pin(&self, content: &Value) -> Result<Pinned> {
    self.pinner.pin(content).await
  }

  async fn wait_for_transaction(&self, tx_id: &str) -> Result<Receipt> {
    self.provider.wait_for_transaction(tx_id).await
  }

  fn get_transaction_link(&self, tx_id: &str) -> Option<String> {
    self.explorer_url.as_ref().map(|explorer| format!("{}/tx/{}", explorer.trim_end_matches('/'), tx_id))
  }

  async fn current(&self) -> Result<u64> {
    match self.clock {
      Clock::BlockNumber => self.provider.get_block_number().await,
      Clock::Timestamp => Ok(unix_now()),
    }
  }
}

/// Salt for signed payloads and deployments; only needs to be unique per signer.
pub(crate) fn salt() -> u128 {
  SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_nanos()).unwrap_or_default()
}

/// Accepts decimal or 0x-prefixed hex.
pub(crate) fn parse_u128(value: &str) -> Result<u128, ActionError> {
  let parsed = match value.strip_prefix("0x") {
    Some(hex) => u128::from_str_radix(hex, 16),
    None => value.parse(),
  };
  parsed.map_err(|_| ActionError::Transport(anyhow!("invalid number {value}")))
}

/// Execution for a proposal: the chosen executor if one was given, else the network's vanilla executor.
pub(crate) fn execution_for(
  descriptor: &NetworkDescriptor,
  encoder: &dyn ExecutionEncoder,
  params: &ProposeParams<'_>,
) -> Result<ExecutionData, ActionError> {
  match params.execution_strategy {
    Some(address) => {
      build_execution(descriptor, encoder, &ExecutorRef::matching(params.space, address), params.transactions)
    }
    None => {
      let vanilla = descriptor.executor_of_kind(ExecutorKind::Vanilla).ok_or(ActionError::NoSupportedExecutor)?;
      Ok(ExecutionData { executor: vanilla.address.clone(), execution_params: encoder.vanilla_params() })
    }
  }
}

/// Parses an indexer proposal id, which is a plain decimal counter on every chain.
pub(crate) fn proposal_number(proposal_id: &str) -> Result<u128, ActionError> {
  proposal_id.parse().map_err(|_| ActionError::Transport(anyhow!("invalid proposal id {proposal_id}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pin::mock::MockPinner;

  fn manifest() -> NetworksManifest {
    serde_json::from_slice(include_bytes!("../networks/networks.json")).unwrap()
  }

  fn deps() -> NetworkDeps {
    NetworkDeps { pinner: Arc::new(MockPinner::new("bafy")), poll: PollConfig::default() }
  }

  #[test]
  fn test_bundled_manifest_builds() {
    let manifest = manifest();
    for config in &manifest.networks {
      let network = build_network(config, &manifest, &deps()).unwrap();
      assert_eq!(network.id(), &config.id);
      assert_eq!(network.family(), config.family);
      assert_eq!(network.is_read_only(), config.family == NetworkFamily::Offchain);
    }
  }

  #[test]
  fn test_starknet_requires_known_base() {
    let mut manifest = manifest();
    let mut config = manifest.networks.iter().find(|network| network.id.as_str() == "sn").cloned().unwrap();
    config.base_network = Some(NetworkId::from("nope"));
    manifest.networks.retain(|network| network.id.as_str() != "nope");

    assert!(build_network(&config, &manifest, &deps()).is_err());
  }

  #[test]
  fn test_transaction_link() {
    let helpers = ChainHelpers::new(
      Arc::new(crate::rpc::mock::MockProvider::default()),
      Arc::new(MockPinner::new("bafy")),
      Some("https://etherscan.io/".to_string()),
      Clock::BlockNumber,
    );
    assert_eq!(helpers.get_transaction_link("0xabc").as_deref(), Some("https://etherscan.io/tx/0xabc"));
  }

  #[test]
  fn test_proposal_number() {
    assert_eq!(proposal_number("12").unwrap(), 12);
    assert!(matches!(proposal_number("0x5a/12"), Err(ActionError::Transport(_))));
    assert_eq!(parse_u128("0x10").unwrap(), 16);
    assert_eq!(parse_u128("10").unwrap(), 10);
  }
}
