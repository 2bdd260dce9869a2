use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{NetworkId, Transaction};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Proposal {
  /// Indexer id, unique per network.
  pub id: String,
  /// Id local to the space; only `(network, space, proposal_id)` is globally unique.
  pub proposal_id: String,
  pub network: NetworkId,
  pub space: String,
  pub author: String,
  pub title: String,
  pub body: String,
  pub execution: Vec<Transaction>,
  pub execution_strategy: String,
  pub execution_strategy_type: String,
  pub execution_hash: String,
  pub execution_destination: Option<String>,
  pub start: u64,
  pub min_end: u64,
  pub max_end: u64,
  pub snapshot: u64,
  pub scores_1: Decimal,
  pub scores_2: Decimal,
  pub scores_3: Decimal,
  pub scores_total: Decimal,
  pub quorum: Decimal,
  pub created: u64,
  pub vote_count: u64,
  pub cancelled: bool,
  pub executed: bool,
  pub vetoed: bool,
  pub execution_tx: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Display, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProposalState {
  #[display("pending")]
  Pending,
  #[display("active")]
  Active,
  #[display("passed")]
  Passed,
  #[display("rejected")]
  Rejected,
  #[display("executed")]
  Executed,
  #[display("cancelled")]
  Cancelled,
  #[display("vetoed")]
  Vetoed,
}

impl Proposal {
  pub fn scores_for(&self) -> Decimal {
    self.scores_1
  }

  pub fn scores_against(&self) -> Decimal {
    self.scores_2
  }

  pub fn has_passed(&self) -> bool {
    self.scores_for() > self.scores_against() && self.scores_total >= self.quorum
  }

  /// Derives the lifecycle state at `now`, in the same clock unit as `start`/`max_end`
  /// (block number on EVM, unix seconds elsewhere).
  pub fn state(&self, now: u64) -> ProposalState {
    if self.cancelled {
      return ProposalState::Cancelled;
    }
    if self.vetoed {
      return ProposalState::Vetoed;
    }
    if self.start > now {
      return ProposalState::Pending;
    }
    if now < self.max_end {
      return ProposalState::Active;
    }
    match (self.has_passed(), self.executed) {
      (true, true) => ProposalState::Executed,
      (true, false) => ProposalState::Passed,
      (false, _) => ProposalState::Rejected,
    }
  }
}

/// A proposal and its state as of the time it was served.
#[derive(Serialize, Debug, Clone)]
pub struct ProposalWithState {
  #[serde(flatten)]
  pub proposal: Proposal,
  pub state: ProposalState,
}

#[cfg(test)]
pub(crate) mod fixtures {
  use super::*;

  pub(crate) fn proposal(network: &str) -> Proposal {
    Proposal {
      id: "0x5a/1".to_string(),
      proposal_id: "1".to_string(),
      network: NetworkId::from(network),
      space: "0x5a".to_string(),
      author: "0x00000000000000000000000000000000000000a0".to_string(),
      title: "Fund the grants program".to_string(),
      body: String::new(),
      execution: Vec::new(),
      execution_strategy: String::new(),
      execution_strategy_type: String::new(),
      execution_hash: String::new(),
      execution_destination: None,
      start: 100,
      min_end: 150,
      max_end: 200,
      snapshot: 100,
      scores_1: Decimal::ZERO,
      scores_2: Decimal::ZERO,
      scores_3: Decimal::ZERO,
      scores_total: Decimal::ZERO,
      quorum: Decimal::from(10),
      created: 90,
      vote_count: 0,
      cancelled: false,
      executed: false,
      vetoed: false,
      execution_tx: None,
    }
  }
}
