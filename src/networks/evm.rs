use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
  execution_for, parse_u128, proposal_number, salt, ChainHelpers, Clock, Contracts, NetworkConfig, NetworkDeps,
};
use crate::{
  abi::{self, Token},
  encode_meta_transactions, ActionError, ActionResult, ChainProvider, Choice, Connector, CreateSpaceParams, Envelope,
  EvmExecution, EvmProvider, ExecutionData, ExecutorKind, MetaTransaction, Network, NetworkActions, NetworkApi,
  NetworkDescriptor, NetworkHelpers, NetworkId, Pick, PickParams, PickedStrategy, Proposal, ProposeParams,
  RelayerClient, RelayerType, SignatureData, Space, SpaceSettings, StrategyPicker, SxApi, TransactionRequest,
  VotingPower, VotingPowerQuery, VotingPowerStrategies, Wallet, EVM_CONNECTORS,
};

const NO_UPDATE_UINT32: u128 = 0xf2cda9b1;
const NO_UPDATE_STRING: &str = "No update";
const NO_UPDATE_ADDRESS: &str = "0xf2cda9b13ed04e585461605c0d6e804933ca8281";

const AUTHENTICATE: &str = "authenticate(address,bytes4,bytes)";
const PROPOSE: &str = "propose(address,string,(address,bytes),bytes)";
const UPDATE_PROPOSAL: &str = "updateProposal(address,uint256,(address,bytes),string)";
const VOTE: &str = "vote(address,uint256,uint8,(uint8,bytes)[],string)";
const INITIALIZE: &str = concat!(
  "initialize((address,uint32,uint32,uint32,(address,bytes),string,string,string,",
  "(address,bytes)[],string[],address[]))"
);
const UPDATE_SETTINGS: &str = concat!(
  "updateSettings((uint32,uint32,uint32,string,string,(address,bytes),string,",
  "address[],address[],(address,bytes)[],string[],uint8[]))"
);

/// The on-chain encoding of a vote choice on EVM spaces: against is 0, everything else keeps its ordinal.
pub fn evm_choice(choice: Choice) -> u8 {
  match choice {
    Choice::Against => 0,
    other => other.ordinal(),
  }
}

fn selector_word(signature: &str) -> Token {
  let mut word = [0u8; 32];
  word[.. 4].copy_from_slice(&abi::selector(signature));
  Token::Word(word)
}

fn strategy_token(address: &str, params: &str) -> Result<Token> {
  Ok(Token::Tuple(vec![Token::address(address)?, Token::bytes_hex(params)?]))
}

fn indexed_strategies(strategies: &[PickedStrategy]) -> Token {
  Token::Array(
    strategies
      .iter()
      .map(|strategy| Token::Tuple(vec![Token::Uint(u128::from(strategy.index)), Token::Bytes(Vec::new())]))
      .collect(),
  )
}

fn indexed_strategies_json(strategies: &[PickedStrategy]) -> Value {
  Value::Array(strategies.iter().map(|strategy| json!({ "index": strategy.index, "params": "0x" })).collect())
}

pub(super) fn eip712_types(primary_type: &str) -> Value {
  let mut types = json!({
    "Strategy": [{ "name": "addr", "type": "address" }, { "name": "params", "type": "bytes" }],
    "IndexedStrategy": [{ "name": "index", "type": "uint8" }, { "name": "params", "type": "bytes" }],
  });
  let fields = match primary_type {
    "Propose" => json!([
      { "name": "space", "type": "address" },
      { "name": "author", "type": "address" },
      { "name": "metadataURI", "type": "string" },
      { "name": "executionStrategy", "type": "Strategy" },
      { "name": "userProposalValidationParams", "type": "bytes" },
      { "name": "salt", "type": "uint256" }
    ]),
    "UpdateProposal" => json!([
      { "name": "space", "type": "address" },
      { "name": "author", "type": "address" },
      { "name": "proposalId", "type": "uint256" },
      { "name": "executionStrategy", "type": "Strategy" },
      { "name": "metadataURI", "type": "string" },
      { "name": "salt", "type": "uint256" }
    ]),
    _ => json!([
      { "name": "space", "type": "address" },
      { "name": "voter", "type": "address" },
      { "name": "proposalId", "type": "uint256" },
      { "name": "choice", "type": "uint8" },
      { "name": "userVotingStrategies", "type": "IndexedStrategy[]" },
      { "name": "voteMetadataURI", "type": "string" }
    ]),
  };
  types[primary_type] = fields;
  types
}

/// A space call routed through an authenticator: ABI form for direct calls, typed data form for relaying.
struct SpaceCall {
  signature: &'static str,
  args: Vec<Token>,
  primary_type: &'static str,
  message: Value,
}

pub struct EvmActions {
  network: NetworkId,
  chain_id: u64,
  descriptor: Arc<NetworkDescriptor>,
  provider: Arc<dyn ChainProvider>,
  relayer: RelayerClient,
  contracts: Contracts,
  voting_power: VotingPowerStrategies,
  manager_connectors: &'static [Connector],
}

impl EvmActions {
  async fn pick(&self, wallet: &dyn Wallet, space: &Space) -> Result<Pick, ActionError> {
    let is_contract = self.provider.is_contract(wallet.account()).await?;
    let picker = StrategyPicker::new(&self.descriptor, self.manager_connectors, &[]);
    picker.pick(&PickParams::for_space(space, is_contract, wallet.connector()))
  }

  fn unsupported(&self, operation: &'static str) -> ActionError {
    ActionError::UnsupportedOperation { network: self.network.clone(), operation }
  }

  fn typed_data(&self, verifying_contract: &str, primary_type: &str, message: &Value) -> (Value, Value) {
    let domain = json!({
      "name": "snapshot-x",
      "version": "1",
      "chainId": self.chain_id,
      "verifyingContract": verifying_contract,
    });
    let typed = json!({
      "domain": domain,
      "types": eip712_types(primary_type),
      "primaryType": primary_type,
      "message": message,
    });
    (domain, typed)
  }

  async fn dispatch(&self, wallet: &dyn Wallet, space: &str, pick: &Pick, call: SpaceCall) -> ActionResult {
    match pick.relayer_type {
      None | Some(RelayerType::EvmTx) => {
        let data = abi::encode_call(
          AUTHENTICATE,
          &[Token::address(space)?, selector_word(call.signature), Token::Bytes(abi::encode(&call.args))],
        );
        let hash = wallet.send_transaction(TransactionRequest::evm(&pick.authenticator, data)).await?;
        tracing::info!("{} sent {} to {} on {}", wallet.account(), call.primary_type, space, self.network);
        Ok(Some(Envelope::Transaction { hash }))
      }
      Some(RelayerType::Evm) => {
        let (domain, typed) = self.typed_data(&pick.authenticator, call.primary_type, &call.message);
        let signature = wallet.sign_typed_data(&typed).await?;
        Ok(Some(Envelope::Signature {
          relayer: RelayerType::Evm,
          signature_data: SignatureData {
            address: wallet.account().to_string(),
            signature,
            domain,
            types: typed["types"].clone(),
            message: call.message,
            primary_type: call.primary_type.to_string(),
          },
          data: json!({ "space": space, "authenticator": pick.authenticator, "strategies": pick.strategies }),
        }))
      }
      Some(RelayerType::Starknet) => Err(ActionError::UnsupportedSpace),
    }
  }

  async fn send_to(&self, wallet: &dyn Wallet, to: &str, data: String) -> ActionResult {
    let hash = wallet.send_transaction(TransactionRequest::evm(to, data)).await?;
    Ok(Some(Envelope::Transaction { hash }))
  }

  fn execution_payload(proposal: &Proposal) -> Result<Vec<u8>> {
    let is_module = ExecutorKind::from_type(&proposal.execution_strategy_type)
      .is_some_and(|kind| matches!(kind, ExecutorKind::SimpleQuorumAvatar | ExecutorKind::SimpleQuorumTimelock));
    if !is_module {
      return Ok(Vec::new());
    }
    let transactions: Vec<MetaTransaction> = proposal.execution.iter().map(MetaTransaction::from).collect();
    encode_meta_transactions(&transactions)
  }

  fn propose_call(
    &self,
    author: &str,
    metadata_uri: &str,
    execution: &ExecutionData,
    pick: &Pick,
    proposal_id: Option<u128>,
  ) -> Result<SpaceCall> {
    let execution_params = execution.execution_params.first().map(String::as_str).unwrap_or("0x");
    let strategy = strategy_token(&execution.executor, execution_params)?;
    let strategy_json = json!({ "addr": execution.executor, "params": execution_params });
    let salt = salt();

    Ok(match proposal_id {
      None => {
        let validation_params = abi::encode(&[indexed_strategies(&pick.strategies)]);
        SpaceCall {
          signature: PROPOSE,
          args: vec![
            Token::address(author)?,
            Token::String(metadata_uri.to_string()),
            strategy,
            Token::Bytes(validation_params.clone()),
          ],
          primary_type: "Propose",
          message: json!({
            "author": author,
            "metadataURI": metadata_uri,
            "executionStrategy": strategy_json,
            "userProposalValidationParams": format!("0x{}", hex::encode(validation_params)),
            "salt": salt.to_string(),
          }),
        }
      }
      Some(proposal_id) => SpaceCall {
        signature: UPDATE_PROPOSAL,
        args: vec![
          Token::address(author)?,
          Token::Uint(proposal_id),
          strategy,
          Token::String(metadata_uri.to_string()),
        ],
        primary_type: "UpdateProposal",
        message: json!({
          "author": author,
          "proposalId": proposal_id.to_string(),
          "executionStrategy": strategy_json,
          "metadataURI": metadata_uri,
          "salt": salt.to_string(),
        }),
      },
    })
  }

  async fn propose_or_update(
    &self,
    wallet: &dyn Wallet,
    params: ProposeParams<'_>,
    proposal_id: Option<u128>,
  ) -> ActionResult {
    let pick = self.pick(wallet, params.space).await?;
    let execution = execution_for(&self.descriptor, &EvmExecution, &params)?;
    let metadata_uri = format!("ipfs://{}", params.cid);
    let mut call = self.propose_call(wallet.account(), &metadata_uri, &execution, &pick, proposal_id)?;
    call.message["space"] = json!(params.space.id);
    self.dispatch(wallet, &params.space.id, &pick, call).await
  }
}

#[async_trait]
impl NetworkActions for EvmActions {
  async fn create_space(&self, wallet: &dyn Wallet, salt: &str, params: &CreateSpaceParams) -> ActionResult {
    let factory = self.contracts.proxy_factory.as_deref().ok_or_else(|| self.unsupported("create_space"))?;
    let master_space = self.contracts.master_space.as_deref().ok_or_else(|| self.unsupported("create_space"))?;

    let validation_params = params.validation_strategy.params.first().map(String::as_str).unwrap_or("0x");
    let voting_strategies = params
      .voting_strategies
      .iter()
      .map(|config| {
        let encoded = config.template.generate_params(&config.params)?;
        strategy_token(&config.template.address, encoded.first().map(String::as_str).unwrap_or("0x"))
      })
      .collect::<Result<Vec<_>>>()?;
    let voting_metadata = (0 .. voting_strategies.len())
      .map(|i| Token::String(params.voting_strategies_metadata.get(i).cloned().unwrap_or_default()))
      .collect();
    let authenticators = params
      .authenticators
      .iter()
      .map(|config| Token::address(&config.template.address))
      .collect::<Result<Vec<_>>>()?;

    let initialize = abi::encode_call(
      INITIALIZE,
      &[Token::Tuple(vec![
        Token::address(&params.controller)?,
        Token::Uint(u128::from(params.voting_delay)),
        Token::Uint(u128::from(params.min_voting_duration)),
        Token::Uint(u128::from(params.max_voting_duration)),
        strategy_token(&params.validation_strategy.address, validation_params)?,
        Token::String(params.validation_strategy_metadata.clone()),
        Token::String(params.dao_uri.clone()),
        Token::String(params.metadata_uri.clone()),
        Token::Array(voting_strategies.clone()),
        Token::Array(voting_metadata),
        Token::Array(authenticators),
      ])],
    );

    let data = abi::encode_call(
      "deployProxy(address,bytes,uint256)",
      &[Token::address(master_space)?, Token::bytes_hex(&initialize)?, Token::Uint(parse_u128(salt)?)],
    );
    self.send_to(wallet, factory, data).await
  }

  async fn propose(&self, wallet: &dyn Wallet, params: ProposeParams<'_>) -> ActionResult {
    self.propose_or_update(wallet, params, None).await
  }

  async fn update_proposal(&self, wallet: &dyn Wallet, proposal_id: &str, params: ProposeParams<'_>) -> ActionResult {
    self.propose_or_update(wallet, params, Some(proposal_number(proposal_id)?)).await
  }

  async fn cancel_proposal(&self, wallet: &dyn Wallet, space: &Space, proposal: &Proposal) -> ActionResult {
    let data = abi::encode_call("cancel(uint256)", &[Token::Uint(proposal_number(&proposal.proposal_id)?)]);
    self.send_to(wallet, &space.id, data).await
  }

  async fn vote(&self, wallet: &dyn Wallet, space: &Space, proposal: &Proposal, choice: Choice) -> ActionResult {
    let pick = self.pick(wallet, space).await?;
    let proposal_id = proposal_number(&proposal.proposal_id)?;
    let choice = evm_choice(choice);

    let call = SpaceCall {
      signature: VOTE,
      args: vec![
        Token::address(wallet.account())?,
        Token::Uint(proposal_id),
        Token::Uint(u128::from(choice)),
        indexed_strategies(&pick.strategies),
        Token::String(String::new()),
      ],
      primary_type: "Vote",
      message: json!({
        "space": space.id,
        "voter": wallet.account(),
        "proposalId": proposal_id.to_string(),
        "choice": choice,
        "userVotingStrategies": indexed_strategies_json(&pick.strategies),
        "voteMetadataURI": "",
      }),
    };
    self.dispatch(wallet, &space.id, &pick, call).await
  }

  async fn finalize_proposal(&self, _wallet: &dyn Wallet, _proposal: &Proposal) -> ActionResult {
    Ok(None)
  }

  async fn receive_proposal(&self, _wallet: &dyn Wallet, _proposal: &Proposal) -> ActionResult {
    Ok(None)
  }

  async fn execute_transactions(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult {
    let payload = Self::execution_payload(proposal)?;
    let data = abi::encode_call(
      "execute(uint256,bytes)",
      &[Token::Uint(proposal_number(&proposal.proposal_id)?), Token::Bytes(payload)],
    );
    self.send_to(wallet, &proposal.space, data).await
  }

  async fn execute_queued_proposal(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult {
    if ExecutorKind::from_type(&proposal.execution_strategy_type) != Some(ExecutorKind::SimpleQuorumTimelock) {
      return Err(self.unsupported("execute_queued_proposal"));
    }
    let data = abi::encode_call("executeQueuedProposal(bytes)", &[Token::Bytes(Self::execution_payload(proposal)?)]);
    self.send_to(wallet, &proposal.execution_strategy, data).await
  }

  async fn veto_proposal(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult {
    if ExecutorKind::from_type(&proposal.execution_strategy_type) != Some(ExecutorKind::SimpleQuorumTimelock) {
      return Err(self.unsupported("veto_proposal"));
    }
    let data = abi::encode_call("veto(bytes32)", &[Token::word_hex(&proposal.execution_hash)?]);
    self.send_to(wallet, &proposal.execution_strategy, data).await
  }

  async fn update_settings(&self, wallet: &dyn Wallet, space: &Space, settings: &SpaceSettings) -> ActionResult {
    let uint32 = |value: Option<u32>| Token::Uint(value.map_or(NO_UPDATE_UINT32, u128::from));
    let metadata_uri = settings.metadata_uri.clone().unwrap_or_else(|| NO_UPDATE_STRING.to_string());

    let data = abi::encode_call(
      UPDATE_SETTINGS,
      &[Token::Tuple(vec![
        uint32(settings.min_voting_duration),
        uint32(settings.max_voting_duration),
        uint32(settings.voting_delay),
        Token::String(metadata_uri),
        Token::String(NO_UPDATE_STRING.to_string()),
        strategy_token(NO_UPDATE_ADDRESS, "0x")?,
        Token::String(NO_UPDATE_STRING.to_string()),
        Token::Array(Vec::new()),
        Token::Array(Vec::new()),
        Token::Array(Vec::new()),
        Token::Array(Vec::new()),
        Token::Array(Vec::new()),
      ])],
    );
    self.send_to(wallet, &space.id, data).await
  }

  async fn transfer_ownership(&self, wallet: &dyn Wallet, space: &Space, owner: &str) -> ActionResult {
    let data = abi::encode_call("transferOwnership(address)", &[Token::address(owner)?]);
    self.send_to(wallet, &space.id, data).await
  }

  async fn delegate(&self, wallet: &dyn Wallet, _space: &Space, token: &str, delegatee: &str) -> ActionResult {
    let data = abi::encode_call("delegate(address)", &[Token::address(delegatee)?]);
    self.send_to(wallet, token, data).await
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

  async fn register_commit(&self, _sender: &str, _envelope: &Envelope) -> Result<(), ActionError> {
    Err(self.unsupported("register_commit"))
  }
}

pub struct EvmNetwork {
  id: NetworkId,
  name: String,
  descriptor: Arc<NetworkDescriptor>,
  api: SxApi,
  helpers: ChainHelpers,
  actions: EvmActions,
}

impl EvmNetwork {
  pub fn new(config: &NetworkConfig, deps: &NetworkDeps) -> Result<Self> {
    let provider = Arc::new(EvmProvider::new(config.require(&config.rpc_url, "rpc_url")?, deps.poll));
    Self::with_provider(config, deps, provider)
  }

  pub fn with_provider(config: &NetworkConfig, deps: &NetworkDeps, provider: Arc<dyn ChainProvider>) -> Result<Self> {
    let descriptor = Arc::new(config.descriptor());
    let chain_id = config.chain_id.parse().map_err(|_| anyhow!("invalid chain id {}", config.chain_id))?;

    Ok(Self {
      id: config.id.clone(),
      name: config.name.clone(),
      descriptor: descriptor.clone(),
      api: SxApi::new(&config.api_url, config.id.clone()),
      helpers: ChainHelpers::new(
        provider.clone(),
        deps.pinner.clone(),
        config.explorer_url.clone(),
        Clock::BlockNumber,
      ),
      actions: EvmActions {
        network: config.id.clone(),
        chain_id,
        descriptor,
        voting_power: VotingPowerStrategies::for_family(config.family, provider.clone()),
        provider,
        relayer: RelayerClient::new(config.require(&config.relayer_url, "relayer_url")?),
        contracts: config.contracts.clone(),
        manager_connectors: EVM_CONNECTORS,
      },
    })
  }
}

impl Network for EvmNetwork {
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
