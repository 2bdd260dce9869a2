use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};

use super::{
  evm::eip712_types, execution_for, parse_u128, proposal_number, salt, ChainHelpers, Clock, Contracts,
  NetworkConfig, NetworkDeps,
};
use crate::{
  abi::{self, Token},
  felt, ActionError, ActionResult, ChainProvider, Choice, Connector, CreateSpaceParams, Envelope, EvmProvider,
  ExecutionData, ExecutionEncoder, ExecutorKind, ExecutorRef, MetaTransaction, Network, NetworkActions, NetworkApi,
  NetworkDescriptor, NetworkHelpers, NetworkId, Pick, PickParams, PickedStrategy, Proposal, ProposeParams,
  RelayerClient, RelayerType, SignatureData, Space, SpaceSettings, StarknetExecution, StarknetProvider,
  StrategyPicker, SxApi, TransactionRequest, VotingPower, VotingPowerQuery, VotingPowerStrategies, Wallet,
  STARKNET_CONNECTORS,
};

const NO_UPDATE_U32: u128 = 0xf2cda9b1;
const NO_UPDATE_STRING: &str = "No update";
const NO_UPDATE_ADDRESS: &str = "0xf2cda9b13ed04e585461605c0d6e804933ca8281";

/// On-chain encoding of a vote choice on Starknet spaces.
pub fn starknet_choice(choice: Choice) -> u8 {
  match choice {
    Choice::Against => 0,
    Choice::For => 1,
    Choice::Abstain => 2,
  }
}

fn strategy_felts(address: &str, params: &[String]) -> Vec<String> {
  let mut out = vec![address.to_string()];
  out.extend(felt::array(params));
  out
}

fn indexed_strategies_felts(strategies: &[PickedStrategy]) -> Vec<String> {
  let mut out = vec![felt::from_u128(strategies.len() as u128)];
  for strategy in strategies {
    out.push(felt::from_u128(u128::from(strategy.index)));
    out.extend(felt::array(&[]));
  }
  out
}

fn snip12_types(primary_type: &str) -> Value {
  let mut types = json!({
    "StarkNetDomain": [
      { "name": "name", "type": "felt252" },
      { "name": "version", "type": "felt252" },
      { "name": "chainId", "type": "felt252" },
      { "name": "verifyingContract", "type": "ContractAddress" }
    ],
    "Strategy": [{ "name": "address", "type": "felt252" }, { "name": "params", "type": "felt*" }],
    "IndexedStrategy": [{ "name": "index", "type": "felt252" }, { "name": "params", "type": "felt*" }],
    "u256": [{ "name": "low", "type": "felt252" }, { "name": "high", "type": "felt252" }],
  });
  let fields = match primary_type {
    "Propose" => json!([
      { "name": "space", "type": "ContractAddress" },
      { "name": "author", "type": "ContractAddress" },
      { "name": "metadataUri", "type": "felt*" },
      { "name": "executionStrategy", "type": "Strategy" },
      { "name": "userProposalValidationParams", "type": "felt*" },
      { "name": "salt", "type": "felt252" }
    ]),
    "UpdateProposal" => json!([
      { "name": "space", "type": "ContractAddress" },
      { "name": "author", "type": "ContractAddress" },
      { "name": "proposalId", "type": "u256" },
      { "name": "executionStrategy", "type": "Strategy" },
      { "name": "metadataUri", "type": "felt*" },
      { "name": "salt", "type": "felt252" }
    ]),
    _ => json!([
      { "name": "space", "type": "ContractAddress" },
      { "name": "voter", "type": "ContractAddress" },
      { "name": "proposalId", "type": "u256" },
      { "name": "choice", "type": "felt252" },
      { "name": "userVotingStrategies", "type": "IndexedStrategy*" },
      { "name": "metadataUri", "type": "felt*" }
    ]),
  };
  types[primary_type] = fields;
  types
}

/// An authenticator call: the entrypoint and calldata for direct or committed calls, the message for signing.
struct AuthenticatedCall {
  entrypoint: &'static str,
  calldata: Vec<String>,
  primary_type: &'static str,
  message: Value,
}

pub struct StarknetActions {
  network: NetworkId,
  chain_id: String,
  base_network: NetworkId,
  base_chain_id: u64,
  descriptor: Arc<NetworkDescriptor>,
  provider: Arc<dyn ChainProvider>,
  l1_provider: Arc<dyn ChainProvider>,
  relayer: RelayerClient,
  contracts: Contracts,
  voting_power: VotingPowerStrategies,
  manager_connectors: &'static [Connector],
}

impl StarknetActions {
  async fn pick(&self, wallet: &dyn Wallet, space: &Space) -> Result<Pick, ActionError> {
    let connector = wallet.connector();
    // Starknet accounts are always contracts, the flag only matters for L1 wallets
    let is_contract = if STARKNET_CONNECTORS.contains(&connector) {
      self.provider.is_contract(wallet.account()).await?
    } else {
      self.l1_provider.is_contract(wallet.account()).await?
    };
    let picker = StrategyPicker::new(&self.descriptor, self.manager_connectors, &[RelayerType::EvmTx]);
    picker.pick(&PickParams::for_space(space, is_contract, connector))
  }

  fn unsupported(&self, operation: &'static str) -> ActionError {
    ActionError::UnsupportedOperation { network: self.network.clone(), operation }
  }

  async fn sign(
    &self,
    wallet: &dyn Wallet,
    relayer: RelayerType,
    authenticator: &str,
    space: &str,
    pick: &Pick,
    call: AuthenticatedCall,
  ) -> ActionResult {
    let (domain, types) = match relayer {
      RelayerType::Starknet => (
        json!({
          "name": "sx-starknet",
          "version": "0.1.0",
          "chainId": self.chain_id,
          "verifyingContract": authenticator,
        }),
        snip12_types(call.primary_type),
      ),
      _ => (
        json!({
          "name": "snapshot-x",
          "version": "1",
          "chainId": self.base_chain_id,
        }),
        eip712_types(call.primary_type),
      ),
    };
    let typed = json!({
      "domain": domain,
      "types": types,
      "primaryType": call.primary_type,
      "message": call.message,
    });
    let signature = wallet.sign_typed_data(&typed).await?;

    Ok(Some(Envelope::Signature {
      relayer,
      signature_data: SignatureData {
        address: wallet.account().to_string(),
        signature,
        domain,
        types,
        message: call.message,
        primary_type: call.primary_type.to_string(),
      },
      data: json!({
        "space": space,
        "authenticator": authenticator,
        "strategies": pick.strategies,
        "calldata": call.calldata,
      }),
    }))
  }

  /// Commits the hash of the L2 call on L1; the relayer submits the call once the commit lands.
  async fn commit(&self, wallet: &dyn Wallet, authenticator: &str, call: AuthenticatedCall) -> ActionResult {
    let commit_contract =
      self.contracts.starknet_commit.as_deref().ok_or_else(|| self.unsupported("commit"))?;
    let commit_hash = felt::hash_felts(&call.calldata)?;
    let data = abi::encode_call(
      "commit(uint256,uint256)",
      &[Token::word_hex(authenticator)?, Token::word_hex(&commit_hash)?],
    );
    let commit_tx = wallet.send_transaction(TransactionRequest::evm(commit_contract, data)).await?;
    tracing::info!(
      "{} committed {} for {} on {}",
      wallet.account(),
      call.primary_type,
      self.network,
      self.base_network
    );

    Ok(Some(Envelope::Commit {
      commit_tx,
      commit_hash,
      base_network: self.base_network.clone(),
      payload: json!({
        "entrypoint": call.entrypoint,
        "calldata": call.calldata,
        "authenticator": authenticator,
      }),
    }))
  }

  async fn dispatch(&self, wallet: &dyn Wallet, space: &str, pick: &Pick, call: AuthenticatedCall) -> ActionResult {
    match pick.relayer_type {
      None => {
        let request = TransactionRequest::invoke(&pick.authenticator, call.entrypoint, call.calldata);
        let hash = wallet.send_transaction(request).await?;
        tracing::info!("{} sent {} to {} on {}", wallet.account(), call.primary_type, space, self.network);
        Ok(Some(Envelope::Transaction { hash }))
      }
      Some(RelayerType::EvmTx) => self.commit(wallet, &pick.authenticator, call).await,
      Some(relayer) => self.sign(wallet, relayer, &pick.authenticator, space, pick, call).await,
    }
  }

  fn propose_call(
    &self,
    space: &str,
    author: &str,
    metadata_uri: &str,
    execution: &ExecutionData,
    pick: &Pick,
    proposal_id: Option<u128>,
  ) -> Result<AuthenticatedCall> {
    let strategy = strategy_felts(&execution.executor, &execution.execution_params);
    let strategy_json = json!({ "address": execution.executor, "params": execution.execution_params });
    let metadata = felt::string_array(metadata_uri)?;
    let salt = felt::from_u128(salt());

    Ok(match proposal_id {
      None => {
        let validation_params = felt::array(&indexed_strategies_felts(&pick.strategies));
        let mut calldata = vec![space.to_string(), author.to_string()];
        calldata.extend(metadata);
        calldata.extend(strategy);
        calldata.extend(validation_params.clone());
        AuthenticatedCall {
          entrypoint: "authenticate_propose",
          calldata,
          primary_type: "Propose",
          message: json!({
            "space": space,
            "author": author,
            "metadataUri": metadata_uri,
            "executionStrategy": strategy_json,
            "userProposalValidationParams": validation_params,
            "salt": salt,
          }),
        }
      }
      Some(proposal_id) => {
        let [low, high] = felt::split_u256(proposal_id);
        let mut calldata = vec![space.to_string(), author.to_string(), low.clone(), high.clone()];
        calldata.extend(strategy);
        calldata.extend(metadata);
        AuthenticatedCall {
          entrypoint: "authenticate_update_proposal",
          calldata,
          primary_type: "UpdateProposal",
          message: json!({
            "space": space,
            "author": author,
            "proposalId": { "low": low, "high": high },
            "executionStrategy": strategy_json,
            "metadataUri": metadata_uri,
            "salt": salt,
          }),
        }
      }
    })
  }

  async fn propose_or_update(
    &self,
    wallet: &dyn Wallet,
    params: ProposeParams<'_>,
    proposal_id: Option<u128>,
  ) -> ActionResult {
    let pick = self.pick(wallet, params.space).await?;
    let execution = execution_for(&self.descriptor, &StarknetExecution, &params)?;
    let metadata_uri = format!("ipfs://{}", params.cid);
    let call =
      self.propose_call(&params.space.id, wallet.account(), &metadata_uri, &execution, &pick, proposal_id)?;
    self.dispatch(wallet, &params.space.id, &pick, call).await
  }

  /// Execution payload the space checks against the stored execution hash.
  fn execution_payload(proposal: &Proposal) -> Result<Vec<String>> {
    match ExecutorKind::from_type(&proposal.execution_strategy_type) {
      Some(ExecutorKind::EthRelayer) => {
        let executor = ExecutorRef {
          address: proposal.execution_strategy.clone(),
          kind: proposal.execution_strategy_type.clone(),
          destination: proposal.execution_destination.clone(),
        };
        let transactions: Vec<MetaTransaction> = proposal.execution.iter().map(MetaTransaction::from).collect();
        StarknetExecution.encode_module(&executor, &transactions)
      }
      _ => Ok(Vec::new()),
    }
  }

  async fn send_request(&self, wallet: &dyn Wallet, request: TransactionRequest) -> ActionResult {
    let hash = wallet.send_transaction(request).await?;
    Ok(Some(Envelope::Transaction { hash }))
  }
}

fn score(value: rust_decimal::Decimal) -> Result<u128> {
  value.trunc().to_u128().ok_or_else(|| anyhow!("score {value} does not fit in 128 bits"))
}

#[async_trait]
impl NetworkActions for StarknetActions {
  async fn create_space(&self, wallet: &dyn Wallet, salt: &str, params: &CreateSpaceParams) -> ActionResult {
    let factory = self.contracts.proxy_factory.as_deref().ok_or_else(|| self.unsupported("create_space"))?;
    let class_hash = self.contracts.space_class_hash.as_deref().ok_or_else(|| self.unsupported("create_space"))?;

    let mut voting_strategies = vec![felt::from_u128(params.voting_strategies.len() as u128)];
    let mut voting_metadata = vec![felt::from_u128(params.voting_strategies.len() as u128)];
    for (i, config) in params.voting_strategies.iter().enumerate() {
      let encoded = config.template.generate_params(&config.params)?;
      voting_strategies.extend(strategy_felts(&config.template.address, &encoded));
      let uri = params.voting_strategies_metadata.get(i).map(String::as_str).unwrap_or_default();
      voting_metadata.extend(felt::string_array(uri)?);
    }
    let authenticators: Vec<String> =
      params.authenticators.iter().map(|config| config.template.address.clone()).collect();

    let mut initialize = vec![
      params.controller.clone(),
      felt::from_u128(u128::from(params.min_voting_duration)),
      felt::from_u128(u128::from(params.max_voting_duration)),
      felt::from_u128(u128::from(params.voting_delay)),
    ];
    initialize.extend(strategy_felts(&params.validation_strategy.address, &params.validation_strategy.params));
    initialize.extend(felt::string_array(&params.validation_strategy_metadata)?);
    initialize.extend(voting_strategies);
    initialize.extend(voting_metadata);
    initialize.extend(felt::array(&authenticators));
    initialize.extend(felt::string_array(&params.metadata_uri)?);
    initialize.extend(felt::string_array(&params.dao_uri)?);

    let mut calldata = vec![class_hash.to_string(), felt::from_u128(parse_u128(salt)?)];
    calldata.extend(felt::array(&initialize));
    self.send_request(wallet, TransactionRequest::invoke(factory, "deploy", calldata)).await
  }

  async fn propose(&self, wallet: &dyn Wallet, params: ProposeParams<'_>) -> ActionResult {
    self.propose_or_update(wallet, params, None).await
  }

  async fn update_proposal(&self, wallet: &dyn Wallet, proposal_id: &str, params: ProposeParams<'_>) -> ActionResult {
    self.propose_or_update(wallet, params, Some(proposal_number(proposal_id)?)).await
  }

  async fn cancel_proposal(&self, wallet: &dyn Wallet, space: &Space, proposal: &Proposal) -> ActionResult {
    let calldata = felt::split_u256(proposal_number(&proposal.proposal_id)?).to_vec();
    self.send_request(wallet, TransactionRequest::invoke(&space.id, "cancel", calldata)).await
  }

  async fn vote(&self, wallet: &dyn Wallet, space: &Space, proposal: &Proposal, choice: Choice) -> ActionResult {
    let pick = self.pick(wallet, space).await?;
    let [low, high] = felt::split_u256(proposal_number(&proposal.proposal_id)?);
    let choice = felt::from_u128(u128::from(starknet_choice(choice)));
    let strategies = indexed_strategies_felts(&pick.strategies);

    let mut calldata = vec![space.id.clone(), wallet.account().to_string(), low.clone(), high.clone(), choice.clone()];
    calldata.extend(strategies);
    calldata.extend(felt::string_array("")?);

    let call = AuthenticatedCall {
      entrypoint: "authenticate_vote",
      calldata,
      primary_type: "Vote",
      message: json!({
        "space": space.id,
        "voter": wallet.account(),
        "proposalId": { "low": low, "high": high },
        "choice": choice,
        "userVotingStrategies": pick
          .strategies
          .iter()
          .map(|strategy| json!({ "index": strategy.index, "params": [] }))
          .collect::<Vec<_>>(),
        "metadataUri": "",
      }),
    };
    self.dispatch(wallet, &space.id, &pick, call).await
  }

  async fn finalize_proposal(&self, _wallet: &dyn Wallet, _proposal: &Proposal) -> ActionResult {
    Ok(None)
  }

  /// Executes an EthRelayer proposal on L1 once its message arrived there.
  async fn receive_proposal(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult {
    if ExecutorKind::from_type(&proposal.execution_strategy_type) != Some(ExecutorKind::EthRelayer) {
      return Ok(None);
    }
    let destination = proposal
      .execution_destination
      .as_deref()
      .ok_or_else(|| anyhow!("proposal {} has no L1 destination", proposal.id))?;
    let transactions: Vec<MetaTransaction> = proposal.execution.iter().map(MetaTransaction::from).collect();

    let data = abi::encode_call(
      "execute(uint256,uint256,uint256,uint256,uint256,bytes32,bytes)",
      &[
        Token::word_hex(&proposal.space)?,
        Token::Uint(proposal_number(&proposal.proposal_id)?),
        Token::Uint(score(proposal.scores_1)?),
        Token::Uint(score(proposal.scores_2)?),
        Token::Uint(score(proposal.scores_3)?),
        Token::word_hex(&proposal.execution_hash)?,
        Token::Bytes(crate::encode_meta_transactions(&transactions)?),
      ],
    );
    self.send_request(wallet, TransactionRequest::evm(destination, data)).await
  }

  async fn execute_transactions(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult {
    let mut calldata = felt::split_u256(proposal_number(&proposal.proposal_id)?).to_vec();
    calldata.extend(felt::array(&Self::execution_payload(proposal)?));
    self.send_request(wallet, TransactionRequest::invoke(&proposal.space, "execute", calldata)).await
  }

  async fn execute_queued_proposal(&self, _wallet: &dyn Wallet, _proposal: &Proposal) -> ActionResult {
    Ok(None)
  }

  async fn veto_proposal(&self, _wallet: &dyn Wallet, _proposal: &Proposal) -> ActionResult {
    Ok(None)
  }

  async fn update_settings(&self, wallet: &dyn Wallet, space: &Space, settings: &SpaceSettings) -> ActionResult {
    let u32_felt = |value: Option<u32>| felt::from_u128(value.map_or(NO_UPDATE_U32, u128::from));
    let metadata_uri = settings.metadata_uri.as_deref().unwrap_or(NO_UPDATE_STRING);

    let mut calldata = vec![
      u32_felt(settings.min_voting_duration),
      u32_felt(settings.max_voting_duration),
      u32_felt(settings.voting_delay),
    ];
    calldata.extend(felt::string_array(metadata_uri)?);
    calldata.extend(felt::string_array(NO_UPDATE_STRING)?);
    calldata.extend(strategy_felts(NO_UPDATE_ADDRESS, &[]));
    calldata.extend(felt::string_array(NO_UPDATE_STRING)?);
    // authenticators, strategies and their metadata, strategies to remove
    for _ in 0 .. 5 {
      calldata.extend(felt::array(&[]));
    }
    self.send_request(wallet, TransactionRequest::invoke(&space.id, "update_settings", calldata)).await
  }

  async fn transfer_ownership(&self, wallet: &dyn Wallet, space: &Space, owner: &str) -> ActionResult {
    let request = TransactionRequest::invoke(&space.id, "transfer_ownership", vec![owner.to_string()]);
    self.send_request(wallet, request).await
  }

  async fn delegate(&self, _wallet: &dyn Wallet, _space: &Space, _token: &str, _delegatee: &str) -> ActionResult {
    Ok(None)
  }

  async fn get_voting_power(&self, query: VotingPowerQuery<'_>) -> Result<Vec<VotingPower>> {
    self
      .voting_power
      .get_voting_power(&self.descriptor, query.strategies, query.params, query.metadata, query.voter, query.at)
      .await
  }

  async fn send(&self, envelope: &Envelope) -> ActionResult {
    Ok(Some(self.relayer.send(envelope).await?))
  }

  async fn register_commit(&self, sender: &str, envelope: &Envelope) -> Result<(), ActionError> {
    let Envelope::Commit { commit_hash, payload, .. } = envelope else {
      return Err(ActionError::Transport(anyhow!("only commit envelopes can be registered")));
    };
    let entrypoint = payload.get("entrypoint").and_then(Value::as_str).unwrap_or_default();
    self.relayer.register_transaction(entrypoint, sender, commit_hash, payload).await
  }
}

pub struct StarknetNetwork {
  id: NetworkId,
  name: String,
  descriptor: Arc<NetworkDescriptor>,
  api: SxApi,
  helpers: ChainHelpers,
  actions: StarknetActions,
}

impl StarknetNetwork {
  pub fn new(config: &NetworkConfig, base: &NetworkConfig, deps: &NetworkDeps) -> Result<Self> {
    let provider = Arc::new(StarknetProvider::new(config.require(&config.rpc_url, "rpc_url")?, deps.poll));
    let l1_provider = Arc::new(EvmProvider::new(base.require(&base.rpc_url, "rpc_url")?, deps.poll));
    Self::with_providers(config, base, deps, provider, l1_provider)
  }

  pub fn with_providers(
    config: &NetworkConfig,
    base: &NetworkConfig,
    deps: &NetworkDeps,
    provider: Arc<dyn ChainProvider>,
    l1_provider: Arc<dyn ChainProvider>,
  ) -> Result<Self> {
    let descriptor = Arc::new(config.descriptor());
    let base_chain_id = base.chain_id.parse().map_err(|_| anyhow!("invalid chain id {}", base.chain_id))?;

    Ok(Self {
      id: config.id.clone(),
      name: config.name.clone(),
      descriptor: descriptor.clone(),
      api: SxApi::new(&config.api_url, config.id.clone()),
      helpers: ChainHelpers::new(
        provider.clone(),
        deps.pinner.clone(),
        config.explorer_url.clone(),
        Clock::Timestamp,
      ),
      actions: StarknetActions {
        network: config.id.clone(),
        chain_id: config.chain_id.clone(),
        base_network: base.id.clone(),
        base_chain_id,
        descriptor,
        voting_power: VotingPowerStrategies::for_family(config.family, provider.clone()),
        provider,
        l1_provider,
        relayer: RelayerClient::new(config.require(&config.relayer_url, "relayer_url")?),
        contracts: config.contracts.clone(),
        manager_connectors: STARKNET_CONNECTORS,
      },
    })
  }
}

impl Network for StarknetNetwork {
  fn id(&self) -> &NetworkId {
    &self.id
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn descriptor(&self) -> &NetworkDescriptor {
    &self.descriptor
  }

  fn manager_connectors(&self) -> &'static [Connector] {
    self.actions.manager_connectors
  }

  fn api(&self) -> &dyn NetworkApi {
    &self.api
  }

  fn helpers(&self) -> &dyn NetworkHelpers {
    &self.helpers
  }

  fn actions(&self) -> Option<&dyn NetworkActions> {
    Some(&self.actions)
  }
}

#[cfg(test)]
mod tests {
  use rust_decimal::Decimal;

  use super::*;
  use crate::{
    pin::mock::MockPinner, proposals::fixtures::proposal, rpc::mock::MockProvider, space::fixtures::space,
    wallet::mock::MockWallet, AuthenticatorKind, NetworksManifest, PollConfig, StrategyTemplate,
  };

  const STARK_ACCOUNT: &str = "0x0000000000000000000000000000000000000000000000000000000000000abc";
  const ETH_ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";

  fn network(l1: MockProvider) -> StarknetNetwork {
    let manifest: NetworksManifest = serde_json::from_slice(include_bytes!("../../networks/networks.json")).unwrap();
    let config = manifest.networks.iter().find(|network| network.id.as_str() == "sn").unwrap();
    let base = manifest.networks.iter().find(|network| network.id.as_str() == "eth").unwrap();
    let deps = NetworkDeps { pinner: Arc::new(MockPinner::new("bafy")), poll: PollConfig::default() };
    StarknetNetwork::with_providers(config, base, &deps, Arc::new(MockProvider::default()), Arc::new(l1)).unwrap()
  }

  fn authenticator(network: &StarknetNetwork, kind: AuthenticatorKind) -> String {
    network.descriptor().authenticator_of_kind(kind).unwrap().address.clone()
  }

  fn space_with(network: &StarknetNetwork, kinds: &[AuthenticatorKind]) -> Space {
    let mut space = space("sn");
    space.id = "0x0000000000000000000000000000000000000000000000000000000000005a5a".to_string();
    space.authenticators = kinds.iter().map(|kind| authenticator(network, *kind)).collect();
    space
  }

  #[test]
  fn test_starknet_choice() {
    assert_eq!(starknet_choice(Choice::For), 1);
    assert_eq!(starknet_choice(Choice::Against), 0);
    assert_eq!(starknet_choice(Choice::Abstain), 2);
  }

  #[tokio::test]
  async fn test_argent_vote_signs_snip12() {
    let network = network(MockProvider::default());
    let space = space_with(&network, &[AuthenticatorKind::StarkSig, AuthenticatorKind::StarkTx]);
    let wallet = MockWallet::new(STARK_ACCOUNT, Connector::Argentx);

    let envelope = network.actions().unwrap().vote(&wallet, &space, &proposal("sn"), Choice::Abstain).await.unwrap();

    let Some(Envelope::Signature { relayer, signature_data, .. }) = envelope else {
      panic!("expected a signature envelope");
    };
    assert_eq!(relayer, RelayerType::Starknet);
    assert_eq!(signature_data.domain["name"], "sx-starknet");
    assert_eq!(signature_data.message["choice"], "0x2");
  }

  #[tokio::test]
  async fn test_contract_l1_wallet_commits() {
    let l1 = MockProvider { contracts: vec![ETH_ACCOUNT.to_string()], ..MockProvider::default() };
    let network = network(l1);
    let space = space_with(&network, &[AuthenticatorKind::EthSig, AuthenticatorKind::EthTx]);
    let wallet = MockWallet::new(ETH_ACCOUNT, Connector::Gnosis);
    let params = ProposeParams { space: &space, cid: "bafy", execution_strategy: None, transactions: &[] };

    let envelope = network.actions().unwrap().propose(&wallet, params).await.unwrap().unwrap();

    let Envelope::Commit { base_network, payload, commit_hash, .. } = &envelope else {
      panic!("expected a commit envelope");
    };
    assert_eq!(base_network.as_str(), "eth");
    assert_eq!(payload["entrypoint"], "authenticate_propose");
    assert!(commit_hash.starts_with("0x"));
    let sent = wallet.sent.lock().unwrap();
    let TransactionRequest::Evm { to, .. } = &sent[0] else {
      panic!("expected an L1 transaction");
    };
    assert_eq!(to, "0x6792e45c43517c81cebdc8913f12c17862cc2193");
  }

  #[tokio::test]
  async fn test_eth_signature_preferred_over_commit() {
    let network = network(MockProvider::default());
    let space = space_with(&network, &[AuthenticatorKind::EthTx, AuthenticatorKind::EthSig]);
    let wallet = MockWallet::new(ETH_ACCOUNT, Connector::Injected);

    let envelope = network.actions().unwrap().vote(&wallet, &space, &proposal("sn"), Choice::For).await.unwrap();

    assert!(matches!(envelope, Some(Envelope::Signature { relayer: RelayerType::Evm, .. })));
    assert!(wallet.sent.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_stark_tx_invokes_authenticator() {
    let network = network(MockProvider::default());
    let stark_tx = authenticator(&network, AuthenticatorKind::StarkTx);
    let space = space_with(&network, &[AuthenticatorKind::StarkTx]);
    let wallet = MockWallet::new(STARK_ACCOUNT, Connector::Argentx);

    let envelope = network.actions().unwrap().vote(&wallet, &space, &proposal("sn"), Choice::Against).await.unwrap();
    assert!(matches!(envelope, Some(Envelope::Transaction { .. })));

    let sent = wallet.sent.lock().unwrap();
    let TransactionRequest::Starknet { calls } = &sent[0] else {
      panic!("expected an invoke");
    };
    assert_eq!(calls[0].contract_address, stark_tx);
    assert_eq!(calls[0].entrypoint, "authenticate_vote");
    // space, voter, proposal id low and high, then the choice
    assert_eq!(calls[0].calldata[4], "0x0");
  }

  #[tokio::test]
  async fn test_unsupported_actions_are_absent() {
    let network = network(MockProvider::default());
    let actions = network.actions().unwrap();
    let wallet = MockWallet::new(STARK_ACCOUNT, Connector::Argentx);
    let space = space("sn");

    assert!(actions.delegate(&wallet, &space, "0x1", "0x2").await.unwrap().is_none());
    assert!(actions.veto_proposal(&wallet, &proposal("sn")).await.unwrap().is_none());
    assert!(actions.receive_proposal(&wallet, &proposal("sn")).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_register_commit_rejects_other_envelopes() {
    let network = network(MockProvider::default());
    let envelope = Envelope::Transaction { hash: "0x1".to_string() };

    let result = network.actions().unwrap().register_commit(ETH_ACCOUNT, &envelope).await;
    assert!(matches!(result, Err(ActionError::Transport(_))));
  }

  #[tokio::test]
  async fn test_voting_power_through_actions() {
    let network = network(MockProvider::default());
    let strategies = vec![
      "0x04d90f646268d29b2aabf289e4057982cc36fa8b43e80de7467e530357a15edd".to_string(),
      "0x001d362ab5b643523d0f8254efc2d9a3d623f4aadb10568e7ef8a304083a6d11".to_string(),
      "0x0000000000000000000000000000000000000000000000000000000000000dead".to_string(),
    ];
    let params = vec![String::new(), format!("0x1,{STARK_ACCOUNT},0x5,0x0"), String::new()];
    let query =
      VotingPowerQuery { strategies: &strategies, params: &params, metadata: &[], voter: STARK_ACCOUNT, at: None };

    let powers = network.actions().unwrap().get_voting_power(query).await.unwrap();

    let values: Vec<Decimal> = powers.iter().map(|power| power.value).collect();
    assert_eq!(values, vec![Decimal::ONE, Decimal::from(5), Decimal::ZERO]);
  }

  #[tokio::test]
  async fn test_create_space_carries_strategy_metadata() {
    let network = network(MockProvider::default());
    let wallet = MockWallet::new(STARK_ACCOUNT, Connector::Argentx);
    let vanilla = StrategyTemplate {
      address: "0x04d90f646268d29b2aabf289e4057982cc36fa8b43e80de7467e530357a15edd".to_string(),
      name: "Vanilla".to_string(),
      kind: crate::TemplateKind::Strategy(crate::StrategyKind::Vanilla),
      family: crate::NetworkFamily::Starknet,
      params_schema: None,
    };
    let params = CreateSpaceParams {
      controller: STARK_ACCOUNT.to_string(),
      voting_delay: 0,
      min_voting_duration: 0,
      max_voting_duration: 86400,
      validation_strategy: crate::RawStrategy { address: "0xc7".to_string(), params: Vec::new() },
      metadata_uri: "ipfs://bafyspace".to_string(),
      validation_strategy_metadata: "ipfs://bafyvalidation".to_string(),
      dao_uri: String::new(),
      authenticators: Vec::new(),
      voting_strategies: vec![crate::StrategyConfig { template: vanilla, params: json!({}) }],
      voting_strategies_metadata: vec!["ipfs://bafyvanilla".to_string()],
      execution_strategies: Vec::new(),
    };

    network.actions().unwrap().create_space(&wallet, "1", &params).await.unwrap();

    let sent = wallet.sent.lock().unwrap();
    let TransactionRequest::Starknet { calls } = &sent[0] else {
      panic!("expected an invoke");
    };
    assert_eq!(calls[0].entrypoint, "deploy");
    for uri in ["ipfs://bafyvalidation", "ipfs://bafyvanilla"] {
      assert!(calls[0].calldata.contains(&felt::short_string(uri).unwrap()));
    }
  }
}
