use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  ActionError, Choice, Connector, CreateSpaceParams, Envelope, MetaTransaction, NetworkDescriptor, NetworkFamily,
  NetworkId, Pinned, Proposal, Receipt, Space, SpaceSettings, User, Vote, VotingPower, Wallet,
};

/// `Ok(None)` means the protocol has no such action; it is not an error.
pub type ActionResult = Result<Option<Envelope>, ActionError>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
  #[serde(default = "Paging::default_limit")]
  pub limit: u32,
  #[serde(default)]
  pub skip: u32,
}

impl Paging {
  pub const MAX_LIMIT: u32 = 1000;

  fn default_limit() -> u32 {
    20
  }

  pub fn clamped(self) -> Self {
    Self { limit: self.limit.min(Self::MAX_LIMIT), skip: self.skip }
  }
}

impl Default for Paging {
  fn default() -> Self {
    Self { limit: Self::default_limit(), skip: 0 }
  }
}

/// Read accessors. Missing resources are `None` or an empty list, never an error.
#[async_trait]
pub trait NetworkApi: Send + Sync {
  async fn load_space(&self, id: &str) -> Result<Option<Space>>;

  async fn load_spaces(&self, paging: Paging) -> Result<Vec<Space>>;

  async fn load_proposal(&self, space: &str, proposal_id: &str) -> Result<Option<Proposal>>;

  async fn load_proposals(&self, space: &str, paging: Paging) -> Result<Vec<Proposal>>;

  async fn load_proposal_votes(&self, proposal: &Proposal, paging: Paging) -> Result<Vec<Vote>>;

  async fn load_user_votes(&self, spaces: &[String], voter: &str) -> Result<Vec<Vote>>;

  async fn load_user(&self, id: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait NetworkHelpers: Send + Sync {
  async fn pin(&self, content: &Value) -> Result<Pinned>;

  async fn wait_for_transaction(&self, tx_id: &str) -> Result<Receipt>;

  fn get_transaction_link(&self, tx_id: &str) -> Option<String>;

  /// Now, in the unit proposals on this network are timed in.
  async fn current(&self) -> Result<u64>;
}

/// Proposal content after pinning, plus its optional execution.
#[derive(Debug, Clone, Copy)]
pub struct ProposeParams<'a> {
  pub space: &'a Space,
  pub cid: &'a str,
  pub execution_strategy: Option<&'a str>,
  pub transactions: &'a [MetaTransaction],
}

#[derive(Debug, Clone, Copy)]
pub struct VotingPowerQuery<'a> {
  pub strategies: &'a [String],
  pub params: &'a [String],
  pub metadata: &'a [Value],
  pub voter: &'a str,
  pub at: Option<u64>,
}

/// Write half of a network. Only chains implement it.
#[async_trait]
pub trait NetworkActions: Send + Sync {
  async fn create_space(&self, wallet: &dyn Wallet, salt: &str, params: &CreateSpaceParams) -> ActionResult;

  async fn propose(&self, wallet: &dyn Wallet, params: ProposeParams<'_>) -> ActionResult;

  async fn update_proposal(&self, wallet: &dyn Wallet, proposal_id: &str, params: ProposeParams<'_>) -> ActionResult;

  async fn cancel_proposal(&self, wallet: &dyn Wallet, space: &Space, proposal: &Proposal) -> ActionResult;

  async fn vote(&self, wallet: &dyn Wallet, space: &Space, proposal: &Proposal, choice: Choice) -> ActionResult;

  async fn finalize_proposal(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult;

  async fn receive_proposal(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult;

  async fn execute_transactions(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult;

  async fn execute_queued_proposal(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult;

  async fn veto_proposal(&self, wallet: &dyn Wallet, proposal: &Proposal) -> ActionResult;

  async fn update_settings(&self, wallet: &dyn Wallet, space: &Space, settings: &SpaceSettings) -> ActionResult;

  async fn transfer_ownership(&self, wallet: &dyn Wallet, space: &Space, owner: &str) -> ActionResult;

  async fn delegate(&self, wallet: &dyn Wallet, space: &Space, token: &str, delegatee: &str) -> ActionResult;

  async fn get_voting_power(&self, query: VotingPowerQuery<'_>) -> Result<Vec<VotingPower>>;

  /// Relays a signature envelope and returns the resulting transaction.
  async fn send(&self, envelope: &Envelope) -> ActionResult;

  /// Registers the L2 half of a commit envelope with this network's relayer.
  async fn register_commit(&self, sender: &str, envelope: &Envelope) -> Result<(), ActionError>;
}

/// A configured network: descriptor, read api, helpers and, for chains, actions.
pub trait Network: Send + Sync {
  fn id(&self) -> &NetworkId;

  fn name(&self) -> &str;

  fn descriptor(&self) -> &NetworkDescriptor;

  fn family(&self) -> NetworkFamily {
    self.descriptor().family()
  }

  /// Connectors that can drive authenticators with no relayer.
  fn manager_connectors(&self) -> &'static [Connector];

  fn api(&self) -> &dyn NetworkApi;

  fn helpers(&self) -> &dyn NetworkHelpers;

  fn actions(&self) -> Option<&dyn NetworkActions>;

  fn is_read_only(&self) -> bool {
    self.actions().is_none()
  }
}
