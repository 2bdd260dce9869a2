use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ActionError;

/// Basic vote choice as submitted by the UI.
#[derive(Debug, Display, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[repr(u8)]
pub enum Choice {
  #[display("for")]
  For = 1,
  #[display("against")]
  Against = 2,
  #[display("abstain")]
  Abstain = 3,
}

impl TryFrom<u8> for Choice {
  type Error = ActionError;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    match value {
      1 => Ok(Choice::For),
      2 => Ok(Choice::Against),
      3 => Ok(Choice::Abstain),
      other => Err(ActionError::InvalidChoice(other)),
    }
  }
}

impl Choice {
  pub fn ordinal(self) -> u8 {
    self as u8
  }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Vote {
  pub id: String,
  pub voter: String,
  pub space: String,
  pub proposal: String,
  pub choice: u8,
  pub vp: Decimal,
  pub created: u64,
  pub tx: Option<String>,
}

impl Vote {
  pub fn new(
    id: impl Into<String>,
    voter: impl Into<String>,
    space: impl Into<String>,
    proposal: impl Into<String>,
    choice: u8,
    vp: Decimal,
    created: u64,
  ) -> Self {
    Self {
      id: id.into(),
      voter: voter.into(),
      space: space.into(),
      proposal: proposal.into(),
      choice,
      vp,
      created,
      tx: None,
    }
  }

  pub fn is_newer_than(&self, other: &Vote) -> bool {
    self.created > other.created
  }
}

#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub proposal_count: u64,
  pub vote_count: u64,
  pub created: u64,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VotingPower {
  pub address: String,
  pub value: Decimal,
  pub decimals: u32,
  pub token: Option<String>,
  pub symbol: String,
}

impl VotingPower {
  pub fn zero(address: impl Into<String>) -> Self {
    Self { address: address.into(), value: Decimal::ZERO, decimals: 0, token: None, symbol: String::new() }
  }
}

/// Sums voting power, normalising every entry to whole units.
pub fn total_voting_power(powers: &[VotingPower]) -> Decimal {
  powers.iter().fold(Decimal::ZERO, |acc, vp| {
    let scale = Decimal::from(10u64.pow(vp.decimals.min(18)));
    acc + vp.value / scale
  })
}
