use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::{
  util::Caches, Network, NetworkFamily, NetworkId, NetworkRegistry, Notifier, NotFound, Orchestrator, Paging,
  PendingTransactions, Proposal, ProposalWithState, Space, StrategyTemplate, Vote,
};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NetworkSummary {
  pub id: NetworkId,
  pub name: String,
  pub family: NetworkFamily,
  pub read_only: bool,
}

/// What a space on a network can be configured with.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NetworkTemplates {
  pub authenticators: Vec<StrategyTemplate>,
  pub strategies: Vec<StrategyTemplate>,
  pub executors: Vec<StrategyTemplate>,
}

/// Process-wide state: the registry, the read caches and the pending ledger.
#[derive(Clone)]
pub struct Hub {
  pub caches: Caches,
  pub registry: NetworkRegistry,
  pub pending: PendingTransactions,
}

impl Hub {
  pub fn new(registry: NetworkRegistry) -> Self {
    Self { caches: Caches::build(), registry, pending: PendingTransactions::new() }
  }

  /// Write side sharing this hub's networks and pending ledger.
  pub fn orchestrator(&self, notifier: Arc<dyn Notifier>) -> Orchestrator {
    Orchestrator::new(self.registry.clone(), self.pending.clone(), notifier)
  }

  pub fn networks(&self) -> Vec<NetworkSummary> {
    self
      .registry
      .networks()
      .map(|network| NetworkSummary {
        id: network.id().clone(),
        name: network.name().to_string(),
        family: network.family(),
        read_only: network.is_read_only(),
      })
      .collect()
  }

  pub fn templates(&self, network: &NetworkId) -> Result<NetworkTemplates> {
    let network = self.registry.get(network)?;
    let descriptor = network.descriptor();
    Ok(NetworkTemplates {
      authenticators: descriptor.editor_authenticators().to_vec(),
      strategies: descriptor.editor_strategies().to_vec(),
      executors: descriptor.editor_executors().to_vec(),
    })
  }

  pub async fn spaces(&self, network: &NetworkId, paging: Paging) -> Result<Vec<Space>> {
    let paging = paging.clamped();
    let key = format!("{}:{}:{}", network, paging.skip, paging.limit);
    if let Some(cached) = self.caches.spaces.get(&key).await {
      return Ok(cached.to_vec());
    }

    let spaces = self.registry.get(network)?.api().load_spaces(paging).await?;
    self.caches.spaces.insert(key, Arc::new(spaces.clone())).await;
    Ok(spaces)
  }

  pub async fn space(&self, network: &NetworkId, id: &str) -> Result<Space> {
    let key = format!("{}:{}", network, id);
    if let Some(cached) = self.caches.space.get(&key).await {
      return Ok(cached.as_ref().clone());
    }

    let space = self
      .registry
      .get(network)?
      .api()
      .load_space(id)
      .await?
      .ok_or_else(|| NotFound(format!("space {id} on {network}")))?;
    if let Err(err) = space.validate() {
      tracing::warn!("{}", err);
    }
    self.caches.space.insert(key, Arc::new(space.clone())).await;
    Ok(space)
  }

  pub async fn proposals(&self, network: &NetworkId, space: &str, paging: Paging) -> Result<Vec<ProposalWithState>> {
    let paging = paging.clamped();
    let network = self.registry.get(network)?;
    let key = format!("{}:{}:{}:{}", network.id(), space, paging.skip, paging.limit);

    let proposals = match self.caches.proposals.get(&key).await {
      Some(cached) => cached.to_vec(),
      None => {
        let proposals = network.api().load_proposals(space, paging).await?;
        self.caches.proposals.insert(key, Arc::new(proposals.clone())).await;
        proposals
      }
    };
    with_state(network.as_ref(), proposals).await
  }

  pub async fn proposal(&self, network: &NetworkId, space: &str, proposal_id: &str) -> Result<ProposalWithState> {
    let network = self.registry.get(network)?;
    let proposal = self.load_proposal(network.as_ref(), space, proposal_id).await?;
    let mut proposals = with_state(network.as_ref(), vec![proposal]).await?;
    proposals.pop().ok_or_else(|| NotFound(format!("proposal {proposal_id} in {space}")).into())
  }

  pub async fn votes(&self, network: &NetworkId, space: &str, proposal_id: &str, paging: Paging) -> Result<Vec<Vote>> {
    let paging = paging.clamped();
    let network = self.registry.get(network)?;
    let key = format!("{}:{}:{}:{}:{}", network.id(), space, proposal_id, paging.skip, paging.limit);
    if let Some(cached) = self.caches.votes.get(&key).await {
      return Ok(cached.to_vec());
    }

    let proposal = self.load_proposal(network.as_ref(), space, proposal_id).await?;
    let votes = network.api().load_proposal_votes(&proposal, paging).await?;
    self.caches.votes.insert(key, Arc::new(votes.clone())).await;
    Ok(votes)
  }

  async fn load_proposal(&self, network: &dyn Network, space: &str, proposal_id: &str) -> Result<Proposal> {
    let proposal = network.api().load_proposal(space, proposal_id).await?;
    Ok(proposal.ok_or_else(|| NotFound(format!("proposal {proposal_id} in {space} on {}", network.id())))?)
  }
}

async fn with_state(network: &dyn Network, proposals: Vec<Proposal>) -> Result<Vec<ProposalWithState>> {
  let now = network.helpers().current().await?;
  Ok(proposals.into_iter().map(|proposal| ProposalWithState { state: proposal.state(now), proposal }).collect())
}
