use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{GraphqlClient, NetworkApi, NetworkId, Paging, Proposal, Space, Transaction, User, Vote};

const SPACE_FIELDS: &str = "
  id
  metadata { name about executors executors_types executors_destinations }
  controller
  voting_delay
  min_voting_period
  max_voting_period
  proposal_threshold
  strategies_indicies
  strategies
  strategies_params
  strategies_parsed_metadata { index data { name decimals symbol token } }
  authenticators
  proposal_count
  vote_count
";

const PROPOSAL_FIELDS: &str = "
  id
  proposal_id
  space { id }
  author { id }
  metadata { title body execution }
  execution_hash
  execution_strategy
  execution_strategy_type
  execution_destination
  start
  min_end
  max_end
  snapshot
  scores_1
  scores_2
  scores_3
  scores_total
  quorum
  created
  vote_count
  cancelled
  executed
  vetoed
  execution_tx
";

const VOTE_FIELDS: &str = "id voter { id } space { id } proposal choice vp created tx";

#[derive(Deserialize, Debug, Default)]
struct SpaceMetadataRow {
  #[serde(default)]
  name: String,
  #[serde(default)]
  about: String,
  #[serde(default)]
  executors: Vec<String>,
  #[serde(default)]
  executors_types: Vec<String>,
  #[serde(default)]
  executors_destinations: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct StrategyMetadataRow {
  index: u32,
  data: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct SpaceRow {
  id: String,
  metadata: Option<SpaceMetadataRow>,
  controller: String,
  voting_delay: u64,
  min_voting_period: u64,
  max_voting_period: u64,
  proposal_threshold: Decimal,
  // the indexer schema spells it this way
  #[serde(rename = "strategies_indicies")]
  strategies_indices: Vec<u32>,
  strategies: Vec<String>,
  strategies_params: Vec<String>,
  #[serde(default)]
  strategies_parsed_metadata: Vec<StrategyMetadataRow>,
  authenticators: Vec<String>,
  proposal_count: u64,
  vote_count: u64,
}

impl SpaceRow {
  fn into_space(self, network: &NetworkId) -> Space {
    let metadata = self.metadata.unwrap_or_default();
    let strategies_metadata = self
      .strategies_indices
      .iter()
      .map(|index| {
        self
          .strategies_parsed_metadata
          .iter()
          .find(|row| row.index == *index)
          .and_then(|row| row.data.as_ref())
          .map(|data| {
            json!({
              "name": data.get("name"),
              "properties": {
                "decimals": data.get("decimals"),
                "symbol": data.get("symbol"),
                "token": data.get("token"),
              }
            })
          })
          .unwrap_or(Value::Null)
      })
      .collect();

    Space {
      id: self.id,
      network: network.clone(),
      name: metadata.name,
      about: metadata.about,
      controller: self.controller,
      voting_delay: self.voting_delay,
      min_voting_period: self.min_voting_period,
      max_voting_period: self.max_voting_period,
      proposal_threshold: self.proposal_threshold,
      quorum: Decimal::ZERO,
      strategies: self.strategies,
      strategies_indices: self.strategies_indices,
      strategies_params: self.strategies_params,
      strategies_metadata,
      authenticators: self.authenticators,
      executors: metadata.executors,
      executors_types: metadata.executors_types,
      executors_destinations: metadata.executors_destinations,
      proposal_count: self.proposal_count,
      vote_count: self.vote_count,
    }
  }
}

#[derive(Deserialize, Debug)]
struct IdRow {
  id: String,
}

#[derive(Deserialize, Debug, Default)]
struct ProposalMetadataRow {
  #[serde(default)]
  title: String,
  #[serde(default)]
  body: String,
  execution: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ProposalRow {
  id: String,
  proposal_id: u64,
  space: IdRow,
  author: IdRow,
  metadata: Option<ProposalMetadataRow>,
  execution_hash: String,
  execution_strategy: String,
  execution_strategy_type: String,
  execution_destination: Option<String>,
  start: u64,
  min_end: u64,
  max_end: u64,
  snapshot: u64,
  scores_1: Decimal,
  scores_2: Decimal,
  scores_3: Decimal,
  scores_total: Decimal,
  quorum: Decimal,
  created: u64,
  vote_count: u64,
  cancelled: bool,
  executed: bool,
  vetoed: bool,
  execution_tx: Option<String>,
}

impl ProposalRow {
  fn into_proposal(self, network: &NetworkId) -> Proposal {
    let metadata = self.metadata.unwrap_or_default();
    let execution = match metadata.execution.as_deref() {
      None | Some("") => Vec::new(),
      Some(raw) => serde_json::from_str::<Vec<Transaction>>(raw).unwrap_or_else(|err| {
        tracing::warn!("proposal {} has unreadable execution: {}", self.id, err);
        Vec::new()
      }),
    };

    Proposal {
      id: self.id,
      proposal_id: self.proposal_id.to_string(),
      network: network.clone(),
      space: self.space.id,
      author: self.author.id,
      title: metadata.title,
      body: metadata.body,
      execution,
      execution_strategy: self.execution_strategy,
      execution_strategy_type: self.execution_strategy_type,
      execution_hash: self.execution_hash,
      execution_destination: self.execution_destination,
      start: self.start,
      min_end: self.min_end,
      max_end: self.max_end,
      snapshot: self.snapshot,
      scores_1: self.scores_1,
      scores_2: self.scores_2,
      scores_3: self.scores_3,
      scores_total: self.scores_total,
      quorum: self.quorum,
      created: self.created,
      vote_count: self.vote_count,
      cancelled: self.cancelled,
      executed: self.executed,
      vetoed: self.vetoed,
      execution_tx: self.execution_tx,
    }
  }
}

#[derive(Deserialize, Debug)]
struct VoteRow {
  id: String,
  voter: IdRow,
  space: IdRow,
  proposal: u64,
  choice: u8,
  vp: Decimal,
  created: u64,
  tx: Option<String>,
}

impl From<VoteRow> for Vote {
  fn from(row: VoteRow) -> Self {
    Vote {
      id: row.id,
      voter: row.voter.id,
      space: row.space.id,
      proposal: row.proposal.to_string(),
      choice: row.choice,
      vp: row.vp,
      created: row.created,
      tx: row.tx,
    }
  }
}

#[derive(Deserialize, Debug)]
struct UserRow {
  id: String,
  proposal_count: u64,
  vote_count: u64,
  created: u64,
}

#[derive(Deserialize)]
struct SpaceData {
  space: Option<SpaceRow>,
}

#[derive(Deserialize)]
struct SpacesData {
  spaces: Vec<SpaceRow>,
}

#[derive(Deserialize)]
struct ProposalData {
  proposal: Option<ProposalRow>,
}

#[derive(Deserialize)]
struct ProposalsData {
  proposals: Vec<ProposalRow>,
}

#[derive(Deserialize)]
struct VotesData {
  votes: Vec<VoteRow>,
}

#[derive(Deserialize)]
struct UserData {
  user: Option<UserRow>,
}

/// Read api over the indexer shared by the EVM and Starknet deployments. One endpoint
/// serves several networks, selected with the `indexer` argument.
pub struct SxApi {
  client: GraphqlClient,
  network: NetworkId,
}

impl SxApi {
  pub fn new(api_url: &str, network: NetworkId) -> Self {
    Self { client: GraphqlClient::new(api_url), network }
  }

  fn indexer(&self) -> &str {
    self.network.as_str()
  }
}

#[async_trait]
impl NetworkApi for SxApi {
  async fn load_space(&self, id: &str) -> Result<Option<Space>> {
    let query = format!(
      "query ($indexer: String!, $id: String!) {{
        space(indexer: $indexer, id: $id) {{ {SPACE_FIELDS} }}
      }}"
    );
    let data: SpaceData = self.client.query(&query, json!({ "indexer": self.indexer(), "id": id })).await?;
    Ok(data.space.map(|row| row.into_space(&self.network)))
  }

  async fn load_spaces(&self, paging: Paging) -> Result<Vec<Space>> {
    let query = format!(
      "query ($indexer: String!, $first: Int!, $skip: Int!) {{
        spaces(indexer: $indexer, first: $first, skip: $skip, orderBy: vote_count, orderDirection: desc) {{
          {SPACE_FIELDS}
        }}
      }}"
    );
    let variables = json!({ "indexer": self.indexer(), "first": paging.limit, "skip": paging.skip });
    let data: SpacesData = self.client.query(&query, variables).await?;
    Ok(data.spaces.into_iter().map(|row| row.into_space(&self.network)).collect())
  }

  async fn load_proposal(&self, space: &str, proposal_id: &str) -> Result<Option<Proposal>> {
    let query = format!(
      "query ($indexer: String!, $id: String!) {{
        proposal(indexer: $indexer, id: $id) {{ {PROPOSAL_FIELDS} }}
      }}"
    );
    let variables = json!({ "indexer": self.indexer(), "id": format!("{space}/{proposal_id}") });
    let data: ProposalData = self.client.query(&query, variables).await?;
    Ok(data.proposal.map(|row| row.into_proposal(&self.network)))
  }

  async fn load_proposals(&self, space: &str, paging: Paging) -> Result<Vec<Proposal>> {
    let query = format!(
      "query ($indexer: String!, $space: String!, $first: Int!, $skip: Int!) {{
        proposals(
          indexer: $indexer, first: $first, skip: $skip, orderBy: created, orderDirection: desc,
          where: {{ space: $space, metadata_: {{ title_not: \"\" }} }}
        ) {{ {PROPOSAL_FIELDS} }}
      }}"
    );
    let variables = json!({ "indexer": self.indexer(), "space": space, "first": paging.limit, "skip": paging.skip });
    let data: ProposalsData = self.client.query(&query, variables).await?;
    Ok(data.proposals.into_iter().map(|row| row.into_proposal(&self.network)).collect())
  }

  async fn load_proposal_votes(&self, proposal: &Proposal, paging: Paging) -> Result<Vec<Vote>> {
    let query = format!(
      "query ($indexer: String!, $space: String!, $proposal: Int!, $first: Int!, $skip: Int!) {{
        votes(
          indexer: $indexer, first: $first, skip: $skip, orderBy: vp, orderDirection: desc,
          where: {{ space: $space, proposal: $proposal }}
        ) {{ {VOTE_FIELDS} }}
      }}"
    );
    let variables = json!({
      "indexer": self.indexer(),
      "space": proposal.space,
      "proposal": proposal.proposal_id.parse::<u64>()?,
      "first": paging.limit,
      "skip": paging.skip,
    });
    let data: VotesData = self.client.query(&query, variables).await?;
    Ok(data.votes.into_iter().map(Vote::from).collect())
  }

  async fn load_user_votes(&self, spaces: &[String], voter: &str) -> Result<Vec<Vote>> {
    let query = format!(
      "query ($indexer: String!, $spaces: [String], $voter: String!) {{
        votes(indexer: $indexer, first: 1000, where: {{ space_in: $spaces, voter: $voter }}) {{ {VOTE_FIELDS} }}
      }}"
    );
    let variables = json!({ "indexer": self.indexer(), "spaces": spaces, "voter": voter });
    let data: VotesData = self.client.query(&query, variables).await?;
    Ok(data.votes.into_iter().map(Vote::from).collect())
  }

  async fn load_user(&self, id: &str) -> Result<Option<User>> {
    let query = "query ($indexer: String!, $id: String!) {
      user(indexer: $indexer, id: $id) { id proposal_count vote_count created }
    }";
    let data: UserData = self.client.query(query, json!({ "indexer": self.indexer(), "id": id })).await?;
    Ok(data.user.map(|row| User {
      id: row.id,
      proposal_count: row.proposal_count,
      vote_count: row.vote_count,
      created: row.created,
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_space_row_mapping() {
    let row: SpaceRow = serde_json::from_value(json!({
      "id": "0x5a",
      "metadata": {
        "name": "Test",
        "about": "",
        "executors": ["0xe1"],
        "executors_types": ["SimpleQuorumAvatar"],
        "executors_destinations": [""]
      },
      "controller": "0xc0",
      "voting_delay": 0,
      "min_voting_period": 0,
      "max_voting_period": 86400,
      "proposal_threshold": "1000000000000000000",
      "strategies_indicies": [0, 2],
      "strategies": ["0xb1", "0xb2"],
      "strategies_params": ["0x", "0xd7"],
      "strategies_parsed_metadata": [{ "index": 2, "data": { "name": "Token", "decimals": 18, "symbol": "GOV" } }],
      "authenticators": ["0xa1"],
      "proposal_count": 3,
      "vote_count": 10
    }))
    .unwrap();

    let space = row.into_space(&NetworkId::from("sep"));
    assert!(space.validate().is_ok());
    assert_eq!(space.strategies_indices, vec![0, 2]);
    assert_eq!(space.strategy_metadata(0), Value::Null);
    assert_eq!(space.strategy_metadata(2)["properties"]["symbol"], "GOV");
    assert_eq!(space.proposal_threshold, Decimal::from(1_000_000_000_000_000_000u64));
  }

  #[test]
  fn test_proposal_row_tolerates_bad_execution() {
    let row: ProposalRow = serde_json::from_value(json!({
      "id": "0x5a/4",
      "proposal_id": 4,
      "space": { "id": "0x5a" },
      "author": { "id": "0xa0" },
      "metadata": { "title": "Hello", "body": "", "execution": "not json" },
      "execution_hash": "0x0",
      "execution_strategy": "0xe1",
      "execution_strategy_type": "SimpleQuorumAvatar",
      "execution_destination": null,
      "start": 10,
      "min_end": 20,
      "max_end": 30,
      "snapshot": 10,
      "scores_1": "5",
      "scores_2": "1",
      "scores_3": "0",
      "scores_total": "6",
      "quorum": "1",
      "created": 9,
      "vote_count": 2,
      "cancelled": false,
      "executed": false,
      "vetoed": false,
      "execution_tx": null
    }))
    .unwrap();

    let proposal = row.into_proposal(&NetworkId::from("sep"));
    assert_eq!(proposal.proposal_id, "4");
    assert!(proposal.execution.is_empty());
    assert!(proposal.has_passed());
  }
}
