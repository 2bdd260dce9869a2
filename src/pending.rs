use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{unix_now, Network, NetworkHelpers, NetworkId, Receipt};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
  pub network: NetworkId,
  pub tx_id: String,
  pub submitted_at: u64,
}

/// Links an L1 commit transaction to the L2 call it unlocks.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CommitCorrelation {
  pub network: NetworkId,
  pub commit_hash: String,
}

type Key = (NetworkId, String);

/// Transactions submitted by this process that have not resolved yet. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct PendingTransactions {
  entries: Arc<DashMap<Key, PendingTransaction>>,
  commits: Arc<DashMap<String, CommitCorrelation>>,
}

impl PendingTransactions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&self, network: &NetworkId, tx_id: &str) {
    let entry = PendingTransaction { network: network.clone(), tx_id: tx_id.to_string(), submitted_at: unix_now() };
    self.entries.insert((network.clone(), tx_id.to_string()), entry);
  }

  /// Records that `commit_tx` on L1 settles `commit_hash` on `network`.
  pub fn correlate(&self, commit_tx: &str, network: &NetworkId, commit_hash: &str) {
    let correlation = CommitCorrelation { network: network.clone(), commit_hash: commit_hash.to_string() };
    self.commits.insert(commit_tx.to_string(), correlation);
  }

  pub fn correlation(&self, commit_tx: &str) -> Option<CommitCorrelation> {
    self.commits.get(commit_tx).map(|entry| entry.value().clone())
  }

  pub fn contains(&self, network: &NetworkId, tx_id: &str) -> bool {
    self.entries.contains_key(&(network.clone(), tx_id.to_string()))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn list(&self) -> Vec<PendingTransaction> {
    let mut pending: Vec<PendingTransaction> = self.entries.iter().map(|entry| entry.value().clone()).collect();
    pending.sort_by_key(|entry| entry.submitted_at);
    pending
  }

  fn remove(&self, network: &NetworkId, tx_id: &str) {
    self.entries.remove(&(network.clone(), tx_id.to_string()));
    self.commits.remove(tx_id);
  }

  /// Waits for `tx_id` and drops it from the ledger however the wait ends.
  pub async fn watch(&self, helpers: &dyn NetworkHelpers, network: &NetworkId, tx_id: &str) -> Result<Receipt> {
    let _guard = Removal { ledger: self, network, tx_id };
    helpers.wait_for_transaction(tx_id).await
  }

  pub fn spawn_watch(&self, network: Arc<dyn Network>, tx_id: String) -> JoinHandle<()> {
    let ledger = self.clone();
    tokio::spawn(async move {
      let correlation = ledger.correlation(&tx_id);
      match ledger.watch(network.helpers(), network.id(), &tx_id).await {
        Ok(receipt) => {
          tracing::info!("transaction {} confirmed on {} at {:?}", tx_id, network.id(), receipt.block_number);
          if let Some(correlation) = correlation {
            tracing::info!("commit {} can now be settled on {}", correlation.commit_hash, correlation.network);
          }
        }
        Err(err) => tracing::warn!("transaction {} on {} failed: {}", tx_id, network.id(), err),
      }
    })
  }
}

struct Removal<'a> {
  ledger: &'a PendingTransactions,
  network: &'a NetworkId,
  tx_id: &'a str,
}

impl Drop for Removal<'_> {
  fn drop(&mut self) {
    self.ledger.remove(self.network, self.tx_id);
  }
}
