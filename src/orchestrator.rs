use std::{future::Future, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::{
  ActionError, ActionResult, Choice, CreateSpaceParams, Envelope, MetaTransaction, Network, NetworkActions, NetworkId,
  NetworkRegistry, PendingTransactions, Proposal, ProposeParams, Space, SpaceMetadata, SpaceSettings, Transaction,
  Wallet,
};

/// Where user-visible feedback goes.
pub trait Notifier: Send + Sync {
  /// Asks the user to connect a wallet; the action that triggered it is dropped.
  fn request_login(&self);

  fn error(&self, message: &str);

  fn submitted(&self, network: &NetworkId, tx_id: &str, link: Option<&str>);
}

/// Notifier for headless use: everything goes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn request_login(&self) {
    tracing::info!("wallet connection required");
  }

  fn error(&self, message: &str) {
    tracing::error!("{}", message);
  }

  fn submitted(&self, network: &NetworkId, tx_id: &str, link: Option<&str>) {
    tracing::info!("submitted {} on {} {}", tx_id, network, link.unwrap_or_default());
  }
}

/// Proposal content as written in the editor.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProposalDraft {
  pub title: String,
  pub body: String,
  pub discussion: String,
  pub execution_strategy: Option<String>,
  pub execution: Vec<Transaction>,
}

impl ProposalDraft {
  fn to_pinnable(&self) -> Value {
    json!({
      "title": self.title,
      "body": self.body,
      "discussion": self.discussion,
      "execution": self.execution,
    })
  }
}

fn actions(network: &dyn Network) -> Result<&dyn NetworkActions, ActionError> {
  network.actions().ok_or_else(|| ActionError::ReadOnlyNetwork(network.id().clone()))
}

/// Pins `content` through the network's pinning service. An empty cid means nothing was stored.
async fn pin(network: &dyn Network, content: &Value) -> Result<Option<String>, ActionError> {
  let pinned = network.helpers().pin(content).await.map_err(|err| ActionError::Pin(err.to_string()))?;
  if pinned.cid.is_empty() {
    tracing::warn!("pinning service returned no cid on {}", network.id());
    return Ok(None);
  }
  Ok(Some(pinned.cid))
}

/// Entry point for every write intent: login gate, error interception and pending bookkeeping.
pub struct Orchestrator {
  registry: NetworkRegistry,
  pending: PendingTransactions,
  notifier: Arc<dyn Notifier>,
  wallet: RwLock<Option<Arc<dyn Wallet>>>,
}

impl Orchestrator {
  pub fn new(registry: NetworkRegistry, pending: PendingTransactions, notifier: Arc<dyn Notifier>) -> Self {
    Self { registry, pending, notifier, wallet: RwLock::new(None) }
  }

  pub async fn connect(&self, wallet: Arc<dyn Wallet>) {
    tracing::info!("connected {} via {}", wallet.account(), wallet.connector());
    *self.wallet.write().await = Some(wallet);
  }

  pub async fn disconnect(&self) {
    *self.wallet.write().await = None;
  }

  pub fn pending(&self) -> &PendingTransactions {
    &self.pending
  }

  pub fn registry(&self) -> &NetworkRegistry {
    &self.registry
  }

  async fn run<F, Fut>(&self, network: &NetworkId, action: F) -> ActionResult
  where
    F: FnOnce(Arc<dyn Wallet>, Arc<dyn Network>) -> Fut,
    Fut: Future<Output = ActionResult>,
  {
    let Some(wallet) = self.wallet.read().await.clone() else {
      self.notifier.request_login();
      return Ok(None);
    };
    self.execute(wallet, network, action).await.map_err(|err| self.intercept(err))
  }

  async fn execute<F, Fut>(&self, wallet: Arc<dyn Wallet>, network: &NetworkId, action: F) -> ActionResult
  where
    F: FnOnce(Arc<dyn Wallet>, Arc<dyn Network>) -> Fut,
    Fut: Future<Output = ActionResult>,
  {
    let network = self.registry.get_read_write(network)?;
    match action(wallet.clone(), network.clone()).await? {
      Some(envelope) => Ok(Some(self.record(wallet.as_ref(), network, envelope).await?)),
      None => Ok(None),
    }
  }

  fn intercept(&self, err: ActionError) -> ActionError {
    if err.is_user_abort() {
      tracing::debug!("user aborted: {}", err);
    } else {
      self.notifier.error(&err.to_string());
    }
    err
  }

  /// Relays signatures and registers commits, then starts watching whatever was broadcast.
  async fn record(
    &self,
    wallet: &dyn Wallet,
    network: Arc<dyn Network>,
    envelope: Envelope,
  ) -> Result<Envelope, ActionError> {
    match &envelope {
      Envelope::Signature { .. } => match actions(network.as_ref())?.send(&envelope).await? {
        Some(relayed) => {
          self.track(network, &relayed);
          Ok(relayed)
        }
        None => Ok(envelope),
      },
      Envelope::Transaction { .. } => {
        self.track(network, &envelope);
        Ok(envelope)
      }
      Envelope::Commit { commit_tx, commit_hash, base_network, .. } => {
        actions(network.as_ref())?.register_commit(wallet.account(), &envelope).await?;
        self.pending.correlate(commit_tx, network.id(), commit_hash);
        self.pending.add(base_network, commit_tx);
        match self.registry.get(base_network) {
          Ok(base) => {
            self.notifier.submitted(base_network, commit_tx, base.helpers().get_transaction_link(commit_tx).as_deref());
            self.pending.spawn_watch(base, commit_tx.clone());
          }
          Err(_) => tracing::warn!("base network {} is not enabled, not watching {}", base_network, commit_tx),
        }
        Ok(envelope)
      }
    }
  }

  fn track(&self, network: Arc<dyn Network>, envelope: &Envelope) {
    let Some(tx_id) = envelope.tx_id() else {
      return;
    };
    self.pending.add(network.id(), tx_id);
    self.notifier.submitted(network.id(), tx_id, network.helpers().get_transaction_link(tx_id).as_deref());
    self.pending.spawn_watch(network, tx_id.to_string());
  }

  pub async fn create_space(
    &self,
    network: &NetworkId,
    salt: &str,
    metadata: &SpaceMetadata,
    params: &CreateSpaceParams,
  ) -> ActionResult {
    self
      .run(network, |wallet, network| async move {
        let (executors, types): (Vec<String>, Vec<String>) = params
          .execution_strategies
          .iter()
          .map(|config| (config.template.address.clone(), config.template.name.clone()))
          .unzip();
        let Some(cid) = pin(network.as_ref(), &metadata.to_pinnable(&executors, &types)).await? else {
          return Ok(None);
        };

        let mut strategies_metadata = Vec::with_capacity(params.voting_strategies.len());
        for config in &params.voting_strategies {
          let uri = match config.template.generate_metadata(&config.params)? {
            Some(metadata) => match pin(network.as_ref(), &metadata).await? {
              Some(cid) => format!("ipfs://{cid}"),
              None => return Ok(None),
            },
            None => String::new(),
          };
          strategies_metadata.push(uri);
        }
        let validation = json!({ "strategies_metadata": strategies_metadata });
        let Some(validation_cid) = pin(network.as_ref(), &validation).await? else {
          return Ok(None);
        };

        let params = CreateSpaceParams {
          metadata_uri: format!("ipfs://{cid}"),
          validation_strategy_metadata: format!("ipfs://{validation_cid}"),
          voting_strategies_metadata: strategies_metadata,
          ..params.clone()
        };
        actions(network.as_ref())?.create_space(wallet.as_ref(), salt, &params).await
      })
      .await
  }

  pub async fn propose(&self, space: &Space, draft: &ProposalDraft) -> ActionResult {
    self.submit_proposal(space, None, draft).await
  }

  pub async fn update_proposal(&self, space: &Space, proposal_id: &str, draft: &ProposalDraft) -> ActionResult {
    self.submit_proposal(space, Some(proposal_id), draft).await
  }

  async fn submit_proposal(&self, space: &Space, proposal_id: Option<&str>, draft: &ProposalDraft) -> ActionResult {
    self
      .run(&space.network, |wallet, network| async move {
        let Some(cid) = pin(network.as_ref(), &draft.to_pinnable()).await? else {
          return Ok(None);
        };
        let transactions: Vec<MetaTransaction> = draft.execution.iter().map(MetaTransaction::from).collect();
        let params = ProposeParams {
          space,
          cid: &cid,
          execution_strategy: draft.execution_strategy.as_deref(),
          transactions: &transactions,
        };
        let actions = actions(network.as_ref())?;
        match proposal_id {
          Some(proposal_id) => actions.update_proposal(wallet.as_ref(), proposal_id, params).await,
          None => actions.propose(wallet.as_ref(), params).await,
        }
      })
      .await
  }

  /// `choice` is the basic ordinal: 1 for, 2 against, 3 abstain.
  pub async fn vote(&self, space: &Space, proposal: &Proposal, choice: u8) -> ActionResult {
    self
      .run(&space.network, |wallet, network| async move {
        let choice = Choice::try_from(choice)?;
        actions(network.as_ref())?.vote(wallet.as_ref(), space, proposal, choice).await
      })
      .await
  }

  pub async fn cancel_proposal(&self, space: &Space, proposal: &Proposal) -> ActionResult {
    self
      .run(&space.network, |wallet, network| async move {
        actions(network.as_ref())?.cancel_proposal(wallet.as_ref(), space, proposal).await
      })
      .await
  }

  pub async fn finalize_proposal(&self, proposal: &Proposal) -> ActionResult {
    self
      .run(&proposal.network, |wallet, network| async move {
        actions(network.as_ref())?.finalize_proposal(wallet.as_ref(), proposal).await
      })
      .await
  }

  pub async fn receive_proposal(&self, proposal: &Proposal) -> ActionResult {
    self
      .run(&proposal.network, |wallet, network| async move {
        actions(network.as_ref())?.receive_proposal(wallet.as_ref(), proposal).await
      })
      .await
  }

  pub async fn execute_transactions(&self, proposal: &Proposal) -> ActionResult {
    self
      .run(&proposal.network, |wallet, network| async move {
        actions(network.as_ref())?.execute_transactions(wallet.as_ref(), proposal).await
      })
      .await
  }

  pub async fn execute_queued_proposal(&self, proposal: &Proposal) -> ActionResult {
    self
      .run(&proposal.network, |wallet, network| async move {
        actions(network.as_ref())?.execute_queued_proposal(wallet.as_ref(), proposal).await
      })
      .await
  }

  pub async fn veto_proposal(&self, proposal: &Proposal) -> ActionResult {
    self
      .run(&proposal.network, |wallet, network| async move {
        actions(network.as_ref())?.veto_proposal(wallet.as_ref(), proposal).await
      })
      .await
  }

  async fn update_settings(&self, space: &Space, settings: SpaceSettings) -> ActionResult {
    self
      .run(&space.network, |wallet, network| async move {
        actions(network.as_ref())?.update_settings(wallet.as_ref(), space, &settings).await
      })
      .await
  }

  pub async fn set_voting_delay(&self, space: &Space, voting_delay: u32) -> ActionResult {
    self.update_settings(space, SpaceSettings { voting_delay: Some(voting_delay), ..SpaceSettings::default() }).await
  }

  pub async fn set_min_voting_duration(&self, space: &Space, duration: u32) -> ActionResult {
    self.update_settings(space, SpaceSettings { min_voting_duration: Some(duration), ..SpaceSettings::default() }).await
  }

  pub async fn set_max_voting_duration(&self, space: &Space, duration: u32) -> ActionResult {
    self.update_settings(space, SpaceSettings { max_voting_duration: Some(duration), ..SpaceSettings::default() }).await
  }

  pub async fn update_space_metadata(&self, space: &Space, metadata: &SpaceMetadata) -> ActionResult {
    self
      .run(&space.network, |wallet, network| async move {
        let Some(cid) = pin(network.as_ref(), &metadata.to_pinnable(&space.executors, &space.executors_types)).await?
        else {
          return Ok(None);
        };
        let settings = SpaceSettings { metadata_uri: Some(format!("ipfs://{cid}")), ..SpaceSettings::default() };
        actions(network.as_ref())?.update_settings(wallet.as_ref(), space, &settings).await
      })
      .await
  }

  pub async fn transfer_ownership(&self, space: &Space, owner: &str) -> ActionResult {
    self
      .run(&space.network, |wallet, network| async move {
        actions(network.as_ref())?.transfer_ownership(wallet.as_ref(), space, owner).await
      })
      .await
  }

  pub async fn delegate(&self, space: &Space, token: &str, delegatee: &str) -> ActionResult {
    self
      .run(&space.network, |wallet, network| async move {
        actions(network.as_ref())?.delegate(wallet.as_ref(), space, token, delegatee).await
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::{
    pin::mock::MockPinner, proposals::fixtures::proposal, rpc::mock::MockProvider, space::fixtures::space,
    wallet::mock::MockWallet, AuthenticatorKind, Connector, EvmNetwork, NetworkDeps, NetworkFamily,
    NetworksManifest, OffchainNetwork, PollConfig, RawStrategy, StrategyConfig, StrategyKind, StrategyTemplate,
    TemplateKind, TransactionRequest, WalletError,
  };

  const ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";

  #[derive(Default)]
  struct MockNotifier {
    logins: Mutex<usize>,
    errors: Mutex<Vec<String>>,
    submitted: Mutex<Vec<String>>,
  }

  impl Notifier for MockNotifier {
    fn request_login(&self) {
      *self.logins.lock().unwrap() += 1;
    }

    fn error(&self, message: &str) {
      self.errors.lock().unwrap().push(message.to_string());
    }

    fn submitted(&self, _network: &NetworkId, tx_id: &str, _link: Option<&str>) {
      self.submitted.lock().unwrap().push(tx_id.to_string());
    }
  }

  struct Fixture {
    orchestrator: Orchestrator,
    notifier: Arc<MockNotifier>,
    pinner: Arc<MockPinner>,
    space: Space,
  }

  fn fixture(cid: &str) -> Fixture {
    let manifest: NetworksManifest = serde_json::from_slice(include_bytes!("../networks/networks.json")).unwrap();
    let pinner = Arc::new(MockPinner::new(cid));
    let deps = NetworkDeps { pinner: pinner.clone(), poll: PollConfig::default() };
    let config = |id: &str| manifest.networks.iter().find(|network| network.id.as_str() == id).unwrap();

    let provider = MockProvider { contracts: vec![ACCOUNT.to_string()], ..MockProvider::default() };
    let sep = EvmNetwork::with_provider(config("sep"), &deps, Arc::new(provider)).unwrap();
    let mut space = space("sep");
    space.id = "0x00000000000000000000000000000000000005aa".to_string();
    let eth_tx = sep.descriptor().authenticator_of_kind(AuthenticatorKind::EthTx).unwrap().address.clone();
    space.authenticators = vec![eth_tx];

    let offchain = OffchainNetwork::new(config("s"), &deps);
    let networks: [Arc<dyn Network>; 2] = [Arc::new(sep), Arc::new(offchain)];
    let registry = NetworkRegistry::from_networks(networks);
    let notifier = Arc::new(MockNotifier::default());
    let orchestrator = Orchestrator::new(registry, PendingTransactions::new(), notifier.clone());
    Fixture { orchestrator, notifier, pinner, space }
  }

  fn sep_proposal() -> Proposal {
    let mut proposal = proposal("sep");
    proposal.space = "0x00000000000000000000000000000000000005aa".to_string();
    proposal
  }

  #[tokio::test]
  async fn test_login_gate_defers_action() {
    let fixture = fixture("bafy");

    let result = fixture.orchestrator.vote(&fixture.space, &sep_proposal(), 1).await;

    assert!(matches!(result, Ok(None)));
    assert_eq!(*fixture.notifier.logins.lock().unwrap(), 1);
    assert!(fixture.notifier.errors.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_user_abort_is_not_notified() {
    let fixture = fixture("bafy");
    let wallet = MockWallet::failing(ACCOUNT, Connector::Gnosis, WalletError::new(Some("4001"), "rejected"));
    fixture.orchestrator.connect(Arc::new(wallet)).await;

    let result = fixture.orchestrator.vote(&fixture.space, &sep_proposal(), 1).await;

    assert!(matches!(result, Err(ActionError::UserAbort(_))));
    assert!(fixture.notifier.errors.lock().unwrap().is_empty());
    assert!(fixture.orchestrator.pending().is_empty());
  }

  #[tokio::test]
  async fn test_other_errors_are_notified_and_returned() {
    let fixture = fixture("bafy");
    fixture.orchestrator.connect(Arc::new(MockWallet::new(ACCOUNT, Connector::Gnosis))).await;

    let result = fixture.orchestrator.vote(&fixture.space, &sep_proposal(), 7).await;
    assert!(matches!(result, Err(ActionError::InvalidChoice(7))));

    let mut read_only = fixture.space.clone();
    read_only.network = NetworkId::from("s");
    let result = fixture.orchestrator.vote(&read_only, &sep_proposal(), 1).await;
    assert!(matches!(result, Err(ActionError::ReadOnlyNetwork(_))));

    assert_eq!(fixture.notifier.errors.lock().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_submitted_transaction_is_tracked_until_resolved() {
    let fixture = fixture("bafy");
    fixture.orchestrator.connect(Arc::new(MockWallet::new(ACCOUNT, Connector::Gnosis))).await;

    let envelope = fixture.orchestrator.vote(&fixture.space, &sep_proposal(), 2).await.unwrap().unwrap();
    let tx_id = envelope.tx_id().unwrap().to_string();

    assert!(fixture.orchestrator.pending().contains(&NetworkId::from("sep"), &tx_id));
    assert_eq!(*fixture.notifier.submitted.lock().unwrap(), vec![tx_id]);

    for _ in 0 .. 10 {
      tokio::task::yield_now().await;
    }
    assert!(fixture.orchestrator.pending().is_empty());
  }

  #[tokio::test]
  async fn test_propose_pins_first() {
    let fixture = fixture("bafy");
    let wallet = Arc::new(MockWallet::new(ACCOUNT, Connector::Gnosis));
    fixture.orchestrator.connect(wallet.clone()).await;
    let draft = ProposalDraft { title: "Fund grants".to_string(), ..ProposalDraft::default() };

    let envelope = fixture.orchestrator.propose(&fixture.space, &draft).await.unwrap();

    assert!(matches!(envelope, Some(Envelope::Transaction { .. })));
    assert_eq!(fixture.pinner.pinned.lock().unwrap()[0]["title"], "Fund grants");
    assert_eq!(wallet.sent.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_empty_cid_short_circuits() {
    let fixture = fixture("");
    let wallet = Arc::new(MockWallet::new(ACCOUNT, Connector::Gnosis));
    fixture.orchestrator.connect(wallet.clone()).await;

    let result = fixture.orchestrator.update_space_metadata(&fixture.space, &SpaceMetadata::default()).await;

    assert!(matches!(result, Ok(None)));
    assert!(wallet.sent.lock().unwrap().is_empty());
  }

  fn strategy(address: &str, kind: StrategyKind, params: Value) -> StrategyConfig {
    let template = StrategyTemplate {
      address: address.to_string(),
      name: kind.to_string(),
      kind: TemplateKind::Strategy(kind),
      family: NetworkFamily::Evm,
      params_schema: None,
    };
    StrategyConfig { template, params }
  }

  #[tokio::test]
  async fn test_create_space_pins_strategy_metadata() {
    let fixture = fixture("bafywhitelist");
    let wallet = Arc::new(MockWallet::new(ACCOUNT, Connector::Gnosis));
    fixture.orchestrator.connect(wallet.clone()).await;
    let whitelist = json!({ "whitelist": format!("{ACCOUNT}:3") });
    let params = CreateSpaceParams {
      controller: ACCOUNT.to_string(),
      voting_delay: 0,
      min_voting_duration: 0,
      max_voting_duration: 86400,
      validation_strategy: RawStrategy {
        address: "0x00000000000000000000000000000000000000c7".to_string(),
        params: Vec::new(),
      },
      metadata_uri: String::new(),
      validation_strategy_metadata: String::new(),
      dao_uri: String::new(),
      authenticators: Vec::new(),
      voting_strategies: vec![
        strategy("0xb3b5e53676453e39b269dd0139d1e8b79686e8bd", StrategyKind::Whitelist, whitelist),
        strategy("0xe37e5e33065a594d11d4ed2d09c75b8e2ef8b51b", StrategyKind::Vanilla, json!({})),
      ],
      voting_strategies_metadata: Vec::new(),
      execution_strategies: Vec::new(),
    };

    let sep = NetworkId::from("sep");
    let envelope = fixture.orchestrator.create_space(&sep, "1", &SpaceMetadata::default(), &params).await.unwrap();
    assert!(matches!(envelope, Some(Envelope::Transaction { .. })));

    let pinned = fixture.pinner.pinned.lock().unwrap();
    assert_eq!(pinned.len(), 3);
    assert_eq!(pinned[1]["properties"]["tree"][0]["votingPower"], "3");
    assert_eq!(pinned[2]["strategies_metadata"], json!(["ipfs://bafywhitelist", ""]));

    let sent = wallet.sent.lock().unwrap();
    let TransactionRequest::Evm { data, .. } = &sent[0] else {
      panic!("expected an evm transaction");
    };
    // space metadata, validation strategy metadata and the whitelist tree
    assert_eq!(data.matches(&hex::encode("ipfs://bafywhitelist")).count(), 3);
  }
}
