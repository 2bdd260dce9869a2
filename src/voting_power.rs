use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
  abi::{self, Token},
  normalize_address, ChainProvider, NetworkDescriptor, NetworkFamily, StrategyKind, VotingPower,
};

/// One voting power oracle. `params` is what the space stores for the strategy,
/// `metadata` is its pinned metadata or `null`.
#[async_trait]
pub trait VotingPowerStrategy: Send + Sync {
  async fn get_voting_power(
    &self,
    strategy: &str,
    voter: &str,
    params: &str,
    metadata: &Value,
    at: Option<u64>,
  ) -> Result<VotingPower>;
}

fn decimals_of(metadata: &Value) -> u32 {
  metadata.pointer("/properties/decimals").and_then(Value::as_u64).map_or(0, |decimals| decimals as u32)
}

fn symbol_of(metadata: &Value) -> String {
  metadata.pointer("/properties/symbol").and_then(Value::as_str).unwrap_or("VOTE").to_string()
}

pub struct VanillaStrategy;

#[async_trait]
impl VotingPowerStrategy for VanillaStrategy {
  async fn get_voting_power(
    &self,
    strategy: &str,
    _voter: &str,
    _params: &str,
    metadata: &Value,
    _at: Option<u64>,
  ) -> Result<VotingPower> {
    Ok(VotingPower {
      address: strategy.to_string(),
      value: Decimal::ONE,
      decimals: 0,
      token: None,
      symbol: symbol_of(metadata),
    })
  }
}

/// Looks the voter up in the whitelist the space stores as strategy params. Spaces that keep
/// the list off chain are resolved from the pinned `address → power` tree instead.
pub struct WhitelistStrategy {
  family: NetworkFamily,
}

impl WhitelistStrategy {
  pub fn new(family: NetworkFamily) -> Self {
    Self { family }
  }

  fn members(&self, params: &str, metadata: &Value) -> Result<Vec<(String, Decimal)>> {
    if !params.trim().is_empty() && params.trim() != "0x" {
      return match self.family {
        NetworkFamily::Evm => evm_whitelist(params),
        _ => felt_whitelist(params),
      };
    }

    let tree = metadata.pointer("/properties/tree").and_then(Value::as_array).cloned().unwrap_or_default();
    tree
      .iter()
      .filter_map(|leaf| {
        let address = leaf.get("address").and_then(Value::as_str)?;
        let power = leaf.get("votingPower").and_then(Value::as_str)?;
        Some(power.parse::<Decimal>().map(|power| (address.to_string(), power)))
      })
      .collect::<Result<Vec<_>, _>>()
      .context("invalid whitelist voting power")
  }
}

#[async_trait]
impl VotingPowerStrategy for WhitelistStrategy {
  async fn get_voting_power(
    &self,
    strategy: &str,
    voter: &str,
    params: &str,
    metadata: &Value,
    _at: Option<u64>,
  ) -> Result<VotingPower> {
    let voter = normalize_address(voter);
    let value = self
      .members(params, metadata)?
      .into_iter()
      .find(|(address, _)| normalize_address(address) == voter)
      .map_or(Decimal::ZERO, |(_, power)| power);

    Ok(VotingPower {
      address: strategy.to_string(),
      value,
      decimals: decimals_of(metadata),
      token: None,
      symbol: symbol_of(metadata),
    })
  }
}

fn word_at(bytes: &[u8], offset: usize) -> Result<&[u8]> {
  let end = offset.checked_add(32);
  end.and_then(|end| bytes.get(offset .. end)).ok_or_else(|| anyhow!("whitelist params truncated at byte {offset}"))
}

fn word_usize(word: &[u8]) -> Result<usize> {
  if word[.. 24].iter().any(|b| *b != 0) {
    bail!("whitelist offset out of range");
  }
  let mut low = [0u8; 8];
  low.copy_from_slice(&word[24 ..]);
  Ok(usize::try_from(u64::from_be_bytes(low))?)
}

/// ABI encoded `(address,uint256)[]`.
fn evm_whitelist(params: &str) -> Result<Vec<(String, Decimal)>> {
  let bytes = abi::parse_hex(params)?;
  let start = word_usize(word_at(&bytes, 0)?)?;
  let len = word_usize(word_at(&bytes, start)?)?;
  (0 .. len)
    .map(|i| {
      let entry = start.saturating_add(32).saturating_add(i.saturating_mul(64));
      let address = format!("0x{}", hex::encode(&word_at(&bytes, entry)?[12 ..]));
      Ok((address, word_to_decimal(word_at(&bytes, entry.saturating_add(32))?)))
    })
    .collect()
}

/// Comma separated felts as the indexer serves them: `len, (address, power.low, power.high)*`.
fn felt_whitelist(params: &str) -> Result<Vec<(String, Decimal)>> {
  let felts: Vec<&str> = params.split(',').map(str::trim).filter(|felt| !felt.is_empty()).collect();
  let Some((len, entries)) = felts.split_first() else {
    return Ok(Vec::new());
  };
  let len = usize::try_from(felt_u128(len)?)?;
  if entries.len() / 3 < len {
    bail!("whitelist params hold {} felts for {} members", entries.len(), len);
  }
  entries
    .chunks(3)
    .take(len)
    .map(|entry| {
      let (low, high) = (felt_u128(entry[1])?, felt_u128(entry[2])?);
      let power = if high == 0 { u128_to_decimal(low) } else { saturated() };
      Ok((entry[0].to_string(), power))
    })
    .collect()
}

fn felt_u128(felt: &str) -> Result<u128> {
  let body = felt.strip_prefix("0x").unwrap_or(felt);
  u128::from_str_radix(body, 16).with_context(|| format!("invalid felt {felt}"))
}

fn saturated() -> Decimal {
  tracing::warn!("voting power above {} clamped", Decimal::MAX);
  Decimal::MAX
}

fn u128_to_decimal(value: u128) -> Decimal {
  i128::try_from(value)
    .ok()
    .and_then(|value| Decimal::try_from_i128_with_scale(value, 0).ok())
    .unwrap_or_else(saturated)
}

/// A `uint256` word as a `Decimal`, clamped to `Decimal::MAX`.
fn word_to_decimal(word: &[u8]) -> Decimal {
  if word[.. 16].iter().any(|b| *b != 0) {
    return saturated();
  }
  let mut low = [0u8; 16];
  low.copy_from_slice(&word[16 ..]);
  u128_to_decimal(u128::from_be_bytes(low))
}

/// Delegated token votes read from the chain: OpenZeppelin `Votes` or Compound `Comp`.
pub struct TokenVotesStrategy {
  provider: Arc<dyn ChainProvider>,
  kind: StrategyKind,
}

impl TokenVotesStrategy {
  pub fn new(provider: Arc<dyn ChainProvider>, kind: StrategyKind) -> Self {
    Self { provider, kind }
  }

  fn calldata(&self, voter: &str, at: Option<u64>) -> Result<String> {
    let voter = Token::address(voter)?;
    Ok(match (self.kind, at) {
      (StrategyKind::Comp, Some(block)) => {
        abi::encode_call("getPriorVotes(address,uint256)", &[voter, Token::Uint(u128::from(block))])
      }
      (StrategyKind::Comp, None) => abi::encode_call("getCurrentVotes(address)", &[voter]),
      (_, Some(timepoint)) => {
        abi::encode_call("getPastVotes(address,uint256)", &[voter, Token::Uint(u128::from(timepoint))])
      }
      (_, None) => abi::encode_call("getVotes(address)", &[voter]),
    })
  }
}

#[async_trait]
impl VotingPowerStrategy for TokenVotesStrategy {
  async fn get_voting_power(
    &self,
    strategy: &str,
    voter: &str,
    params: &str,
    metadata: &Value,
    at: Option<u64>,
  ) -> Result<VotingPower> {
    let token = abi::parse_address(params).context("strategy params are not a token address")?;
    let token = format!("0x{}", hex::encode(token));
    let result = self.provider.call(&token, &self.calldata(voter, at)?).await?;
    let value = parse_uint(&result)?;

    Ok(VotingPower {
      address: strategy.to_string(),
      value,
      decimals: decimals_of(metadata),
      token: Some(token),
      symbol: symbol_of(metadata),
    })
  }
}

/// Reads a single `uint256` return word. Balances past the `Decimal` range are clamped.
fn parse_uint(word: &str) -> Result<Decimal> {
  let bytes = abi::parse_hex(word)?;
  if bytes.len() != 32 {
    return Err(anyhow!("unexpected uint256 return value {word}"));
  }
  Ok(word_to_decimal(&bytes))
}

/// The voting power oracles a network can resolve locally, keyed by strategy kind.
#[derive(Clone, Default)]
pub struct VotingPowerStrategies {
  strategies: HashMap<StrategyKind, Arc<dyn VotingPowerStrategy>>,
}

impl VotingPowerStrategies {
  pub fn for_family(family: NetworkFamily, provider: Arc<dyn ChainProvider>) -> Self {
    let mut strategies: HashMap<StrategyKind, Arc<dyn VotingPowerStrategy>> = HashMap::new();
    strategies.insert(StrategyKind::Vanilla, Arc::new(VanillaStrategy));
    strategies.insert(StrategyKind::Whitelist, Arc::new(WhitelistStrategy::new(family)));
    if family == NetworkFamily::Evm {
      let oz_votes = TokenVotesStrategy::new(provider.clone(), StrategyKind::OzVotes);
      strategies.insert(StrategyKind::OzVotes, Arc::new(oz_votes));
      strategies.insert(StrategyKind::Comp, Arc::new(TokenVotesStrategy::new(provider, StrategyKind::Comp)));
    }
    Self { strategies }
  }

  /// Queries every strategy concurrently. A strategy with no local implementation counts as
  /// zero; any other failure fails the whole batch.
  pub async fn get_voting_power(
    &self,
    descriptor: &NetworkDescriptor,
    strategies: &[String],
    params: &[String],
    metadata: &[Value],
    voter: &str,
    at: Option<u64>,
  ) -> Result<Vec<VotingPower>> {
    let queries = strategies.iter().enumerate().map(|(i, address)| async move {
      let implementation = descriptor.strategy_kind(address).and_then(|kind| self.strategies.get(&kind));
      let Some(implementation) = implementation else {
        tracing::warn!("no voting power implementation for strategy {}", address);
        return Ok(VotingPower::zero(address.as_str()));
      };

      let params = params.get(i).map(String::as_str).unwrap_or_default();
      let metadata = metadata.get(i).unwrap_or(&Value::Null);
      implementation.get_voting_power(address, voter, params, metadata, at).await
    });

    try_join_all(queries).await
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::{rpc::mock::MockProvider, StrategyEntry, StrategyTemplate, TemplateKind};

  const VANILLA: &str = "0x00000000000000000000000000000000000000b1";
  const WHITELIST: &str = "0x00000000000000000000000000000000000000b2";
  const OZ_VOTES: &str = "0x00000000000000000000000000000000000000b3";
  const TOKEN: &str = "0x00000000000000000000000000000000000000d7";
  const VOTER: &str = "0x00000000000000000000000000000000000000aa";

  fn descriptor() -> NetworkDescriptor {
    NetworkDescriptor::new(
      NetworkFamily::Evm,
      &[],
      &[
        StrategyEntry { address: VANILLA.to_string(), kind: StrategyKind::Vanilla },
        StrategyEntry { address: WHITELIST.to_string(), kind: StrategyKind::Whitelist },
        StrategyEntry { address: OZ_VOTES.to_string(), kind: StrategyKind::OzVotes },
      ],
      &[],
    )
  }

  fn whitelist_metadata() -> Value {
    let address = VOTER.to_uppercase().replace("0X", "0x");
    json!({ "properties": { "decimals": 0, "tree": [{ "address": address, "votingPower": "42" }] } })
  }

  #[tokio::test]
  async fn test_missing_strategy_counts_as_zero() {
    let provider = Arc::new(MockProvider::default());
    let strategies = VotingPowerStrategies::for_family(NetworkFamily::Evm, provider);
    let addresses = vec![VANILLA.to_string(), "0xunknown".to_string(), WHITELIST.to_string()];

    let metadata = vec![Value::Null, Value::Null, whitelist_metadata()];

    let powers = strategies.get_voting_power(&descriptor(), &addresses, &[], &metadata, VOTER, None).await.unwrap();

    assert_eq!(powers.len(), 3);
    assert_eq!(powers[0].value, Decimal::ONE);
    assert_eq!(powers[1], VotingPower::zero("0xunknown"));
    assert_eq!(powers[2].value, Decimal::from(42));
  }

  #[tokio::test]
  async fn test_strategy_failure_fails_batch() {
    let provider = Arc::new(MockProvider::default());
    let strategies = VotingPowerStrategies::for_family(NetworkFamily::Evm, provider);
    let addresses = vec![VANILLA.to_string(), OZ_VOTES.to_string()];
    let params = vec!["0x".to_string(), TOKEN.to_string()];

    let result = strategies.get_voting_power(&descriptor(), &addresses, &params, &[], VOTER, Some(10)).await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_token_votes_reads_chain() {
    let provider = MockProvider::default();
    provider.calls.lock().unwrap().insert(TOKEN.to_string(), format!("0x{:064x}", 1_500u64));
    let strategies = VotingPowerStrategies::for_family(NetworkFamily::Evm, Arc::new(provider));
    let metadata = json!({ "properties": { "decimals": 2, "symbol": "GOV" } });

    let addresses = vec![OZ_VOTES.to_string()];
    let params = vec![TOKEN.to_string()];

    let powers =
      strategies.get_voting_power(&descriptor(), &addresses, &params, &[metadata], VOTER, Some(10)).await.unwrap();

    assert_eq!(powers[0].value, Decimal::from(1_500));
    assert_eq!(powers[0].decimals, 2);
    assert_eq!(powers[0].symbol, "GOV");
    assert_eq!(powers[0].token.as_deref(), Some(TOKEN));
  }

  #[test]
  fn test_parse_uint_clamps_large_balances() {
    assert_eq!(parse_uint(&format!("0x{}", "ff".repeat(32))).unwrap(), Decimal::MAX);
    assert_eq!(parse_uint(&format!("0x{:064x}", u128::MAX)).unwrap(), Decimal::MAX);
    assert_eq!(parse_uint(&format!("0x{:064x}", 7)).unwrap(), Decimal::from(7));
    assert!(parse_uint("0x07").is_err());
  }

  #[tokio::test]
  async fn test_large_balance_does_not_fail_batch() {
    let provider = MockProvider::default();
    provider.calls.lock().unwrap().insert(TOKEN.to_string(), format!("0x{}", "ff".repeat(32)));
    let strategies = VotingPowerStrategies::for_family(NetworkFamily::Evm, Arc::new(provider));
    let addresses = vec![VANILLA.to_string(), OZ_VOTES.to_string()];
    let params = vec!["0x".to_string(), TOKEN.to_string()];

    let powers = strategies.get_voting_power(&descriptor(), &addresses, &params, &[], VOTER, None).await.unwrap();

    assert_eq!(powers[0].value, Decimal::ONE);
    assert_eq!(powers[1].value, Decimal::MAX);
  }

  fn whitelist_template(family: NetworkFamily) -> StrategyTemplate {
    StrategyTemplate {
      address: WHITELIST.to_string(),
      name: "Whitelist".to_string(),
      kind: TemplateKind::Strategy(StrategyKind::Whitelist),
      family,
      params_schema: None,
    }
  }

  #[tokio::test]
  async fn test_whitelist_reads_evm_params() {
    let whitelist = json!({ "whitelist": format!("0x00000000000000000000000000000000000000bb:7\n{VOTER}:42") });
    let params = whitelist_template(NetworkFamily::Evm).generate_params(&whitelist).unwrap();
    // what the indexer serves for the strategy, no tree
    let metadata = json!({ "name": "Whitelist", "properties": { "decimals": 0, "symbol": null } });
    let strategy = WhitelistStrategy::new(NetworkFamily::Evm);

    let power = strategy.get_voting_power(WHITELIST, VOTER, &params[0], &metadata, None).await.unwrap();
    assert_eq!(power.value, Decimal::from(42));

    let outsider = "0x00000000000000000000000000000000000000cc";
    let power = strategy.get_voting_power(WHITELIST, outsider, &params[0], &metadata, None).await.unwrap();
    assert_eq!(power.value, Decimal::ZERO);
  }

  #[tokio::test]
  async fn test_whitelist_reads_starknet_felts() {
    let voter = "0x06a2f1e0e6a3e9c6bd1a2f3c8e5ab0d5a3a0c1d4f1a7b0f3e8e6f4d1c0b1a2e3";
    let whitelist = json!({ "whitelist": format!("{voter}:9") });
    let felts = whitelist_template(NetworkFamily::Starknet).generate_params(&whitelist).unwrap();
    let strategy = WhitelistStrategy::new(NetworkFamily::Starknet);

    let power = strategy.get_voting_power(WHITELIST, voter, &felts.join(","), &Value::Null, None).await.unwrap();
    assert_eq!(power.value, Decimal::from(9));
    assert!(strategy.get_voting_power(WHITELIST, voter, "0x2,0x1", &Value::Null, None).await.is_err());
  }
}
