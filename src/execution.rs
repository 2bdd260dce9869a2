use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::{
  abi, encode_meta_transactions, felt, normalize_address, ActionError, ExecutorKind, MetaTransaction,
  NetworkDescriptor, Space,
};

/// One configured execution target of a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorRef {
  pub address: String,
  pub kind: String,
  pub destination: Option<String>,
}

impl ExecutorRef {
  pub fn from_space(space: &Space) -> Vec<ExecutorRef> {
    space
      .executors
      .iter()
      .zip(&space.executors_types)
      .enumerate()
      .map(|(i, (address, kind))| ExecutorRef {
        address: address.clone(),
        kind: kind.clone(),
        destination: space.executors_destinations.get(i).filter(|d| !d.is_empty()).cloned(),
      })
      .collect()
  }

  /// Executors of `space` whose address is `address`.
  pub fn matching(space: &Space, address: &str) -> Vec<ExecutorRef> {
    let wanted = normalize_address(address);
    Self::from_space(space).into_iter().filter(|e| normalize_address(&e.address) == wanted).collect()
  }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionData {
  pub executor: String,
  pub execution_params: Vec<String>,
}

/// Protocol-specific encoding of an execution payload.
pub trait ExecutionEncoder: Send + Sync {
  /// Executor kinds that take a batch of module calls.
  fn is_module(&self, kind: ExecutorKind) -> bool;

  fn encode_module(&self, executor: &ExecutorRef, transactions: &[MetaTransaction]) -> Result<Vec<String>>;

  fn vanilla_params(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EvmExecution;

impl ExecutionEncoder for EvmExecution {
  fn is_module(&self, kind: ExecutorKind) -> bool {
    matches!(kind, ExecutorKind::SimpleQuorumAvatar | ExecutorKind::SimpleQuorumTimelock)
  }

  fn encode_module(&self, _executor: &ExecutorRef, transactions: &[MetaTransaction]) -> Result<Vec<String>> {
    Ok(vec![format!("0x{}", hex::encode(encode_meta_transactions(transactions)?))])
  }

  fn vanilla_params(&self) -> Vec<String> {
    vec!["0x".to_string()]
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StarknetExecution;

impl ExecutionEncoder for StarknetExecution {
  fn is_module(&self, kind: ExecutorKind) -> bool {
    kind == ExecutorKind::EthRelayer
  }

  /// L1 execution: the relayer executor stores the destination and the hash of the L1 batch.
  fn encode_module(&self, executor: &ExecutorRef, transactions: &[MetaTransaction]) -> Result<Vec<String>> {
    let destination = executor
      .destination
      .clone()
      .ok_or_else(|| anyhow!("executor {} has no L1 destination", executor.address))?;
    let hash = abi::keccak256(&encode_meta_transactions(transactions)?);
    let [low, high] = felt::split_word(&hash);
    Ok(vec![destination, low, high])
  }

  fn vanilla_params(&self) -> Vec<String> {
    Vec::new()
  }
}

/// Picks the executor for `transactions`. Module executors win over the vanilla executor
/// regardless of their position in the space configuration.
pub fn build_execution(
  descriptor: &NetworkDescriptor,
  encoder: &dyn ExecutionEncoder,
  executors: &[ExecutorRef],
  transactions: &[MetaTransaction],
) -> Result<ExecutionData, ActionError> {
  let module = executors
    .iter()
    .find(|executor| ExecutorKind::from_type(&executor.kind).is_some_and(|kind| encoder.is_module(kind)));

  if let Some(executor) = module {
    return Ok(ExecutionData {
      executor: executor.address.clone(),
      execution_params: encoder.encode_module(executor, transactions)?,
    });
  }

  if let Some(executor) = executors.iter().find(|executor| descriptor.is_vanilla_executor(&executor.address)) {
    if !transactions.is_empty() {
      tracing::warn!(
        "executor {} cannot execute transactions, dropping {} transaction(s)",
        executor.address,
        transactions.len()
      );
    }
    return Ok(ExecutionData { executor: executor.address.clone(), execution_params: encoder.vanilla_params() });
  }

  Err(ActionError::NoSupportedExecutor)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ExecutorEntry, NetworkFamily};

  const VANILLA: &str = "0x00000000000000000000000000000000000000e1";
  const AVATAR: &str = "0x00000000000000000000000000000000000000e2";

  fn descriptor(family: NetworkFamily) -> NetworkDescriptor {
    NetworkDescriptor::new(
      family,
      &[],
      &[],
      &[ExecutorEntry { address: VANILLA.to_string(), kind: ExecutorKind::Vanilla }],
    )
  }

  fn executor(address: &str, kind: &str, destination: Option<&str>) -> ExecutorRef {
    ExecutorRef { address: address.to_string(), kind: kind.to_string(), destination: destination.map(str::to_string) }
  }

  fn transfer() -> MetaTransaction {
    MetaTransaction {
      to: "0x0000000000000000000000000000000000000001".to_string(),
      value: "1000".to_string(),
      data: "0x".to_string(),
      operation: 0,
      salt: "7".to_string(),
    }
  }

  #[test]
  fn test_module_executor_wins_over_vanilla() {
    let executors = vec![executor(VANILLA, "Vanilla", None), executor(AVATAR, "SimpleQuorumAvatar", None)];

    let data = build_execution(&descriptor(NetworkFamily::Evm), &EvmExecution, &executors, &[transfer()]).unwrap();
    assert_eq!(data.executor, AVATAR);
    assert_eq!(data.execution_params.len(), 1);
    assert!(data.execution_params[0].len() > 2);
  }

  #[test]
  fn test_vanilla_drops_transactions() {
    let executors = vec![executor(VANILLA, "Vanilla", None)];

    let data = build_execution(&descriptor(NetworkFamily::Evm), &EvmExecution, &executors, &[transfer()]).unwrap();
    assert_eq!(data, ExecutionData { executor: VANILLA.to_string(), execution_params: vec!["0x".to_string()] });
  }

  #[test]
  fn test_no_executor_configured() {
    let result = build_execution(&descriptor(NetworkFamily::Evm), &EvmExecution, &[], &[]);
    assert!(matches!(result, Err(ActionError::NoSupportedExecutor)));
  }

  #[test]
  fn test_unknown_executor_is_not_supported() {
    let executors = vec![executor("0x00000000000000000000000000000000000000e9", "Axiom", None)];
    let result = build_execution(&descriptor(NetworkFamily::Evm), &EvmExecution, &executors, &[]);
    assert!(matches!(result, Err(ActionError::NoSupportedExecutor)));
  }

  #[test]
  fn test_starknet_relayer_encodes_destination_and_hash() {
    let destination = "0x00000000000000000000000000000000000000d1";
    let executors = vec![executor("0x0e3", "EthRelayer", Some(destination))];

    let data =
      build_execution(&descriptor(NetworkFamily::Starknet), &StarknetExecution, &executors, &[transfer()]).unwrap();
    assert_eq!(data.executor, "0x0e3");
    assert_eq!(data.execution_params.len(), 3);
    assert_eq!(data.execution_params[0], destination);
  }

  #[test]
  fn test_starknet_relayer_requires_destination() {
    let executors = vec![executor("0x0e3", "EthRelayer", None)];
    let result = build_execution(&descriptor(NetworkFamily::Starknet), &StarknetExecution, &executors, &[]);
    assert!(matches!(result, Err(ActionError::Transport(_))));
  }

  #[test]
  fn test_matching_filters_by_address() {
    let mut space = crate::space::fixtures::space("eth");
    space.executors = vec![VANILLA.to_string(), AVATAR.to_string()];
    space.executors_types = vec!["Vanilla".to_string(), "SimpleQuorumAvatar".to_string()];

    let matching = ExecutorRef::matching(&space, &AVATAR.to_uppercase().replace("0X", "0x"));
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].kind, "SimpleQuorumAvatar");
  }
}
