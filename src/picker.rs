use serde::Serialize;

use crate::{
  ActionError, Connector, NetworkDescriptor, RelayerType, Space, EVM_CONNECTORS, STARKNET_CONNECTORS,
};

#[derive(Debug, Clone, Copy)]
pub struct PickParams<'a> {
  pub authenticators: &'a [String],
  pub strategies: &'a [String],
  pub strategies_indices: &'a [u32],
  pub is_contract: bool,
  pub connector: Connector,
}

impl<'a> PickParams<'a> {
  pub fn for_space(space: &'a Space, is_contract: bool, connector: Connector) -> Self {
    Self {
      authenticators: &space.authenticators,
      strategies: &space.strategies,
      strategies_indices: &space.strategies_indices,
      is_contract,
      connector,
    }
  }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PickedStrategy {
  pub address: String,
  pub index: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Pick {
  pub authenticator: String,
  pub strategies: Vec<PickedStrategy>,
  pub relayer_type: Option<RelayerType>,
}

/// Chooses the authenticator and voting strategies a wallet can use on a space.
#[derive(Debug, Clone, Copy)]
pub struct StrategyPicker<'a> {
  descriptor: &'a NetworkDescriptor,
  manager_connectors: &'a [Connector],
  low_priority: &'a [RelayerType],
}

impl<'a> StrategyPicker<'a> {
  pub fn new(
    descriptor: &'a NetworkDescriptor,
    manager_connectors: &'a [Connector],
    low_priority: &'a [RelayerType],
  ) -> Self {
    Self { descriptor, manager_connectors, low_priority }
  }

  pub fn pick(&self, params: &PickParams<'_>) -> Result<Pick, ActionError> {
    let mut candidates: Vec<(&String, Option<RelayerType>)> = params
      .authenticators
      .iter()
      .filter(|address| {
        if params.is_contract {
          self.descriptor.is_authenticator_contract_supported(address)
        } else {
          self.descriptor.is_authenticator_supported(address)
        }
      })
      .map(|address| (address, self.descriptor.relayer_type(address)))
      .collect();

    // sort_by_key is stable, ties keep their configured order
    candidates.sort_by_key(|(_, relayer)| self.rank(*relayer));

    let (authenticator, relayer_type) = candidates
      .into_iter()
      .find(|(_, relayer)| self.connectors_for(*relayer).contains(&params.connector))
      .ok_or(ActionError::UnsupportedSpace)?;

    let strategies: Vec<PickedStrategy> = params
      .strategies
      .iter()
      .zip(params.strategies_indices)
      .filter(|(address, _)| self.descriptor.is_strategy_supported(address))
      .map(|(address, index)| PickedStrategy { address: address.clone(), index: *index })
      .collect();

    if !params.strategies.is_empty() && strategies.is_empty() {
      return Err(ActionError::UnsupportedSpace);
    }

    Ok(Pick { authenticator: authenticator.clone(), strategies, relayer_type })
  }

  fn rank(&self, relayer: Option<RelayerType>) -> u8 {
    match relayer {
      Some(relayer) if self.low_priority.contains(&relayer) => 1,
      Some(_) => 0,
      None => 2,
    }
  }

  fn connectors_for(&self, relayer: Option<RelayerType>) -> &'a [Connector] {
    match relayer {
      Some(RelayerType::Evm | RelayerType::EvmTx) => EVM_CONNECTORS,
      Some(RelayerType::Starknet) => STARKNET_CONNECTORS,
      None => self.manager_connectors,
    }
  }
}
