use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{unix_now, NetworkConfig, NetworkDeps};
use crate::{
  Connector, GraphqlClient, Network, NetworkActions, NetworkApi, NetworkDescriptor, NetworkHelpers, NetworkId, Paging,
  Pinned, Pinner, Proposal, Receipt, Space, User, Vote, EVM_CONNECTORS,
};

#[derive(Deserialize, Debug)]
struct HubStrategy {
  name: String,
  #[serde(default)]
  params: Value,
}

#[derive(Deserialize, Debug, Default)]
struct HubVoting {
  #[serde(default)]
  delay: Option<u64>,
  #[serde(default)]
  period: Option<u64>,
  #[serde(default)]
  quorum: Option<Decimal>,
}

#[derive(Deserialize, Debug)]
struct HubSpace {
  id: String,
  #[serde(default)]
  name: String,
  #[serde(default)]
  about: Option<String>,
  #[serde(default)]
  admins: Vec<String>,
  #[serde(default)]
  strategies: Vec<HubStrategy>,
  #[serde(default)]
  voting: Option<HubVoting>,
  #[serde(rename = "proposalsCount", default)]
  proposals_count: u64,
  #[serde(rename = "votesCount", default)]
  votes_count: u64,
}

impl HubSpace {
  fn into_space(self, network: &NetworkId) -> Space {
    let voting = self.voting.unwrap_or_default();
    let count = self.strategies.len();
    Space {
      id: self.id,
      network: network.clone(),
      name: self.name,
      about: self.about.unwrap_or_default(),
      controller: self.admins.into_iter().next().unwrap_or_default(),
      voting_delay: voting.delay.unwrap_or_default(),
      min_voting_period: voting.period.unwrap_or_default(),
      max_voting_period: voting.period.unwrap_or_default(),
      proposal_threshold: Decimal::ZERO,
      quorum: voting.quorum.unwrap_or_default(),
      strategies_indices: (0 .. count as u32).collect(),
      strategies_params: self.strategies.iter().map(|strategy| strategy.params.to_string()).collect(),
      strategies_metadata: vec![Value::Null; count],
      strategies: self.strategies.into_iter().map(|strategy| strategy.name).collect(),
      authenticators: Vec::new(),
      executors: Vec::new(),
      executors_types: Vec::new(),
      executors_destinations: Vec::new(),
      proposal_count: self.proposals_count,
      vote_count: self.votes_count,
    }
  }
}

#[derive(Deserialize, Debug)]
struct HubSpaceRef {
  id: String,
}

#[derive(Deserialize, Debug)]
struct HubProposal {
  id: String,
  space: HubSpaceRef,
  author: String,
  #[serde(default)]
  title: String,
  #[serde(default)]
  body: String,
  start: u64,
  end: u64,
  #[serde(default)]
  snapshot: Option<String>,
  #[serde(default)]
  scores: Vec<Decimal>,
  #[serde(default)]
  scores_total: Option<Decimal>,
  #[serde(default)]
  quorum: Option<Decimal>,
  created: u64,
  #[serde(default)]
  votes: u64,
}

impl HubProposal {
  fn into_proposal(self, network: &NetworkId) -> Proposal {
    let score = |index: usize| self.scores.get(index).copied().unwrap_or_default();
    let (scores_1, scores_2, scores_3) = (score(0), score(1), score(2));
    Proposal {
      proposal_id: self.id.clone(),
      id: self.id,
      network: network.clone(),
      space: self.space.id,
      author: self.author,
      title: self.title,
      body: self.body,
      execution: Vec::new(),
      execution_strategy: String::new(),
      execution_strategy_type: String::new(),
      execution_hash: String::new(),
      execution_destination: None,
      start: self.start,
      min_end: self.end,
      max_end: self.end,
      snapshot: self.snapshot.and_then(|snapshot| snapshot.parse().ok()).unwrap_or_default(),
      scores_1,
      scores_2,
      scores_3,
      scores_total: self.scores_total.unwrap_or_default(),
      quorum: self.quorum.unwrap_or_default(),
      created: self.created,
      vote_count: self.votes,
      cancelled: false,
      executed: false,
      vetoed: false,
      execution_tx: None,
    }
  }
}

#[derive(Deserialize, Debug)]
struct HubVote {
  id: String,
  voter: String,
  space: HubSpaceRef,
  proposal: HubSpaceRef,
  /// Only basic single choice votes map onto `Vote`; weighted and ranked choices become 0.
  choice: Value,
  vp: Decimal,
  created: u64,
}

impl From<HubVote> for Vote {
  fn from(vote: HubVote) -> Self {
    let choice = vote.choice.as_u64().and_then(|choice| u8::try_from(choice).ok()).unwrap_or_default();
    Vote::new(vote.id, vote.voter, vote.space.id, vote.proposal.id, choice, vote.vp, vote.created)
  }
}

#[derive(Deserialize, Debug)]
struct HubUser {
  id: String,
  #[serde(default)]
  created: u64,
  #[serde(rename = "proposalsCount", default)]
  proposals_count: u64,
  #[serde(rename = "votesCount", default)]
  votes_count: u64,
}

const SPACE_FIELDS: &str =
  "id name about admins strategies { name params } voting { delay period quorum } proposalsCount votesCount";
const PROPOSAL_FIELDS: &str =
  "id space { id } author title body start end snapshot scores scores_total quorum created votes";
const VOTE_FIELDS: &str = "id voter space { id } proposal { id } choice vp created";

fn belongs_to(proposal: &Proposal, space: &str) -> bool {
  proposal.space.eq_ignore_ascii_case(space)
}

/// Read api over the off-chain hub schema, mapped into the shared types.
pub struct HubApi {
  client: GraphqlClient,
  network: NetworkId,
}

impl HubApi {
  pub fn new(api_url: &str, network: NetworkId) -> Self {
    Self { client: GraphqlClient::new(api_url), network }
  }
}

#[async_trait]
impl NetworkApi for HubApi {
  async fn load_space(&self, id: &str) -> Result<Option<Space>> {
    #[derive(Deserialize)]
    struct Data {
      space: Option<HubSpace>,
    }
    let query = format!("query ($id: String!) {{ space(id: $id) {{ {SPACE_FIELDS} }} }}");
    let data: Data = self.client.query(&query, json!({ "id": id })).await?;
    Ok(data.space.map(|space| space.into_space(&self.network)))
  }

  async fn load_spaces(&self, paging: Paging) -> Result<Vec<Space>> {
    #[derive(Deserialize)]
    struct Data {
      spaces: Vec<HubSpace>,
    }
    let query = format!(
      "query ($first: Int!, $skip: Int!) {{
        spaces(first: $first, skip: $skip, orderBy: \"created\", orderDirection: desc) {{ {SPACE_FIELDS} }}
      }}"
    );
    let data: Data = self.client.query(&query, json!({ "first": paging.limit, "skip": paging.skip })).await?;
    Ok(data.spaces.into_iter().map(|space| space.into_space(&self.network)).collect())
  }

  async fn load_proposal(&self, space: &str, proposal_id: &str) -> Result<Option<Proposal>> {
    #[derive(Deserialize)]
    struct Data {
      proposal: Option<HubProposal>,
    }
    let query = format!("query ($id: String!) {{ proposal(id: $id) {{ {PROPOSAL_FIELDS} }} }}");
    let data: Data = self.client.query(&query, json!({ "id": proposal_id })).await?;
    // hub proposal ids are global, scope them to the space asked for
    let proposal = data.proposal.map(|proposal| proposal.into_proposal(&self.network));
    Ok(proposal.filter(|proposal| belongs_to(proposal, space)))
  }

  async fn load_proposals(&self, space: &str, paging: Paging) -> Result<Vec<Proposal>> {
    #[derive(Deserialize)]
    struct Data {
      proposals: Vec<HubProposal>,
    }
    let query = format!(
      "query ($space: String!, $first: Int!, $skip: Int!) {{
        proposals(first: $first, skip: $skip, where: {{ space: $space }}, orderBy: \"created\", orderDirection: desc) {{
          {PROPOSAL_FIELDS}
        }}
      }}"
    );
    let variables = json!({ "space": space, "first": paging.limit, "skip": paging.skip });
    let data: Data = self.client.query(&query, variables).await?;
    Ok(data.proposals.into_iter().map(|proposal| proposal.into_proposal(&self.network)).collect())
  }

  async fn load_proposal_votes(&self, proposal: &Proposal, paging: Paging) -> Result<Vec<Vote>> {
    #[derive(Deserialize)]
    struct Data {
      votes: Vec<HubVote>,
    }
    let query = format!(
      "query ($proposal: String!, $first: Int!, $skip: Int!) {{
        votes(first: $first, skip: $skip, where: {{ proposal: $proposal }}, orderBy: \"vp\", orderDirection: desc) {{
          {VOTE_FIELDS}
        }}
      }}"
    );
    let variables = json!({ "proposal": proposal.id, "first": paging.limit, "skip": paging.skip });
    let data: Data = self.client.query(&query, variables).await?;
    Ok(data.votes.into_iter().map(Vote::from).collect())
  }

  async fn load_user_votes(&self, spaces: &[String], voter: &str) -> Result<Vec<Vote>> {
    #[derive(Deserialize)]
    struct Data {
      votes: Vec<HubVote>,
    }
    let query = format!(
      "query ($spaces: [String], $voter: String!) {{
        votes(first: 1000, where: {{ space_in: $spaces, voter: $voter }}) {{ {VOTE_FIELDS} }}
      }}"
    );
    let data: Data = self.client.query(&query, json!({ "spaces": spaces, "voter": voter })).await?;
    Ok(data.votes.into_iter().map(Vote::from).collect())
  }

  async fn load_user(&self, id: &str) -> Result<Option<User>> {
    #[derive(Deserialize)]
    struct Data {
      user: Option<HubUser>,
    }
    let query = "query ($id: String!) { user(id: $id) { id created proposalsCount votesCount } }";
    let data: Data = self.client.query(query, json!({ "id": id })).await?;
    Ok(data.user.map(|user| User {
      id: user.id,
      proposal_count: user.proposals_count,
      vote_count: user.votes_count,
      created: user.created,
    }))
  }
}

pub struct OffchainHelpers {
  pinner: Arc<dyn Pinner>,
}

#[async_trait]
impl NetworkHelpers for OffchainHelpers {
  async fn pin(&self, content: &Value) -> Result<Pinned> {
    self.pinner.pin(content).await
  }

  async fn wait_for_transaction(&self, tx_id: &str) -> Result<Receipt> {
    bail!("off-chain networks have no transaction {tx_id} to wait for")
  }

  fn get_transaction_link(&self, _tx_id: &str) -> Option<String> {
    None
  }

  async fn current(&self) -> Result<u64> {
    Ok(unix_now())
  }
}

/// The off-chain hub. Read only: votes and proposals are signed messages handled by the hub itself.
pub struct OffchainNetwork {
  id: NetworkId,
  name: String,
  descriptor: NetworkDescriptor,
  api: HubApi,
  helpers: OffchainHelpers,
}

impl OffchainNetwork {
  pub fn new(config: &NetworkConfig, deps: &NetworkDeps) -> Self {
    Self {
      id: config.id.clone(),
      name: config.name.clone(),
      descriptor: config.descriptor(),
      api: HubApi::new(&config.api_url, config.id.clone()),
      helpers: OffchainHelpers { pinner: deps.pinner.clone() },
    }
  }
}

impl Network for OffchainNetwork {
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
    EVM_CONNECTORS
  }

  fn api(&self) -> &dyn NetworkApi {
    &self.api
  }

  fn helpers(&self) -> &dyn NetworkHelpers {
    &self.helpers
  }

  fn actions(&self) -> Option<&dyn NetworkActions> {
    None
  }
}
