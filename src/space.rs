use anyhow::{bail, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{NetworkId, StrategyTemplate};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Space {
  pub id: String,
  pub network: NetworkId,
  pub name: String,
  pub about: String,
  pub controller: String,
  pub voting_delay: u64,
  pub min_voting_period: u64,
  pub max_voting_period: u64,
  pub proposal_threshold: Decimal,
  pub quorum: Decimal,
  pub strategies: Vec<String>,
  pub strategies_indices: Vec<u32>,
  pub strategies_params: Vec<String>,
  /// Parsed strategy metadata, `null` where none was pinned.
  pub strategies_metadata: Vec<Value>,
  pub authenticators: Vec<String>,
  pub executors: Vec<String>,
  pub executors_types: Vec<String>,
  pub executors_destinations: Vec<String>,
  pub proposal_count: u64,
  pub vote_count: u64,
}

impl Space {
  /// Checks the parallel-array invariants the indexer is expected to uphold.
  pub fn validate(&self) -> Result<()> {
    if self.executors.len() != self.executors_types.len() {
      bail!(
        "space {} has {} executors but {} executor types",
        self.id,
        self.executors.len(),
        self.executors_types.len()
      );
    }
    if self.strategies.len() != self.strategies_params.len() {
      bail!(
        "space {} has {} strategies but {} strategy params",
        self.id,
        self.strategies.len(),
        self.strategies_params.len()
      );
    }
    if self.strategies.len() != self.strategies_indices.len() {
      bail!("space {} has mismatched strategy indices", self.id);
    }
    Ok(())
  }

  /// Params of the strategy stored at on-chain `index`, if still configured.
  pub fn strategy_params(&self, index: u32) -> Option<&str> {
    let position = self.strategies_indices.iter().position(|i| *i == index)?;
    self.strategies_params.get(position).map(String::as_str)
  }

  pub fn strategy_metadata(&self, index: u32) -> Value {
    self
      .strategies_indices
      .iter()
      .position(|i| *i == index)
      .and_then(|position| self.strategies_metadata.get(position).cloned())
      .unwrap_or(Value::Null)
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SpaceMetadata {
  pub name: String,
  pub about: String,
  pub avatar: String,
  pub cover: String,
  pub external_url: String,
  pub github: String,
  pub twitter: String,
  pub discord: String,
  pub voting_power_symbol: String,
  pub treasuries: Vec<Value>,
  pub delegations: Vec<Value>,
}

impl SpaceMetadata {
  /// ERC-1155 style document pinned as the space `metadataURI`.
  pub fn to_pinnable(&self, execution_strategies: &[String], execution_types: &[String]) -> Value {
    json!({
      "name": self.name,
      "description": self.about,
      "external_url": self.external_url,
      "image": self.avatar,
      "properties": {
        "cover": self.cover,
        "github": self.github,
        "twitter": self.twitter,
        "discord": self.discord,
        "voting_power_symbol": self.voting_power_symbol,
        "treasuries": self.treasuries,
        "delegations": self.delegations,
        "execution_strategies": execution_strategies,
        "execution_strategies_types": execution_types,
      }
    })
  }
}

/// A template plus the params a user picked for it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StrategyConfig {
  pub template: StrategyTemplate,
  pub params: Value,
}

/// Address and already encoded params, for strategies that bypass the editor templates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RawStrategy {
  pub address: String,
  pub params: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CreateSpaceParams {
  pub controller: String,
  pub voting_delay: u32,
  pub min_voting_duration: u32,
  pub max_voting_duration: u32,
  pub validation_strategy: RawStrategy,
  pub metadata_uri: String,
  /// Pinned list of the voting strategies' metadata uris, read back by the validation strategy.
  pub validation_strategy_metadata: String,
  pub dao_uri: String,
  pub authenticators: Vec<StrategyConfig>,
  pub voting_strategies: Vec<StrategyConfig>,
  /// One uri per voting strategy, empty when the strategy has no metadata.
  pub voting_strategies_metadata: Vec<String>,
  pub execution_strategies: Vec<StrategyConfig>,
}

/// Owner-authorized settings change. `None` leaves the setting untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceSettings {
  pub voting_delay: Option<u32>,
  pub min_voting_duration: Option<u32>,
  pub max_voting_duration: Option<u32>,
  pub metadata_uri: Option<String>,
}

#[cfg(test)]
pub(crate) mod fixtures {
  use super::*;

  pub(crate) fn space(network: &str) -> Space {
    Space {
      id: "0x5a".to_string(),
      network: NetworkId::from(network),
      name: "Test space".to_string(),
      about: String::new(),
      controller: "0x00000000000000000000000000000000000000c0".to_string(),
      voting_delay: 0,
      min_voting_period: 0,
      max_voting_period: 86400,
      proposal_threshold: Decimal::ZERO,
      quorum: Decimal::from(10),
      strategies: Vec::new(),
      strategies_indices: Vec::new(),
      strategies_params: Vec::new(),
      strategies_metadata: Vec::new(),
      authenticators: Vec::new(),
      executors: Vec::new(),
      executors_types: Vec::new(),
      executors_destinations: Vec::new(),
      proposal_count: 0,
      vote_count: 0,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_validate_parallel_arrays() {
    let mut space = fixtures::space("eth");
    assert!(space.validate().is_ok());

    space.executors.push("0x1".to_string());
    assert!(space.validate().is_err());

    space.executors_types.push("Vanilla".to_string());
    space.strategies.push("0x2".to_string());
    space.strategies_indices.push(0);
    assert!(space.validate().is_err());
  }

  #[test]
  fn test_strategy_params_follow_indices() {
    let mut space = fixtures::space("eth");
    space.strategies = vec!["0xa".to_string(), "0xb".to_string()];
    space.strategies_indices = vec![0, 3];
    space.strategies_params = vec!["0x".to_string(), "0x1234".to_string()];

    assert_eq!(space.strategy_params(3), Some("0x1234"));
    assert_eq!(space.strategy_params(1), None);
    assert_eq!(space.strategy_metadata(3), Value::Null);
  }
}
