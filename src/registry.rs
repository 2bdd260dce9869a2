use std::{collections::BTreeMap, sync::Arc};

use anyhow::{bail, Result};

use crate::{build_network, ActionError, Network, NetworkDeps, NetworkId, NetworksManifest};

/// Every enabled network, built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct NetworkRegistry {
  networks: BTreeMap<NetworkId, Arc<dyn Network>>,
}

impl NetworkRegistry {
  /// Builds the networks in `enabled`, or every network in the manifest when `enabled` is empty.
  pub fn build(manifest: &NetworksManifest, enabled: &[NetworkId], deps: &NetworkDeps) -> Result<Self> {
    if let Some(unknown) = enabled.iter().find(|id| !manifest.networks.iter().any(|network| &network.id == *id)) {
      bail!("enabled network {} is not in the manifest", unknown);
    }

    let mut networks = BTreeMap::new();
    for config in &manifest.networks {
      if !enabled.is_empty() && !enabled.contains(&config.id) {
        continue;
      }
      networks.insert(config.id.clone(), build_network(config, manifest, deps)?);
    }
    tracing::info!("enabled networks: {}", networks.keys().map(NetworkId::as_str).collect::<Vec<_>>().join(", "));
    Ok(Self { networks })
  }

  pub fn from_networks(networks: impl IntoIterator<Item = Arc<dyn Network>>) -> Self {
    Self { networks: networks.into_iter().map(|network| (network.id().clone(), network)).collect() }
  }

  pub fn get(&self, id: &NetworkId) -> Result<Arc<dyn Network>, ActionError> {
    self.networks.get(id).cloned().ok_or_else(|| ActionError::NetworkNotEnabled(id.clone()))
  }

  /// Like [`Self::get`], but only for networks that can write.
  pub fn get_read_write(&self, id: &NetworkId) -> Result<Arc<dyn Network>, ActionError> {
    let network = self.get(id)?;
    if network.is_read_only() {
      return Err(ActionError::ReadOnlyNetwork(id.clone()));
    }
    Ok(network)
  }

  pub fn ids(&self) -> impl Iterator<Item = &NetworkId> {
    self.networks.keys()
  }

  pub fn networks(&self) -> impl Iterator<Item = &Arc<dyn Network>> {
    self.networks.values()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{pin::mock::MockPinner, PollConfig};

  fn manifest() -> NetworksManifest {
    serde_json::from_slice(include_bytes!("../networks/networks.json")).unwrap()
  }

  fn deps() -> NetworkDeps {
    NetworkDeps { pinner: Arc::new(MockPinner::new("bafy")), poll: PollConfig::default() }
  }

  #[test]
  fn test_only_enabled_networks_resolve() {
    let enabled = [NetworkId::from("s"), NetworkId::from("sep")];
    let registry = NetworkRegistry::build(&manifest(), &enabled, &deps()).unwrap();

    assert_eq!(registry.ids().map(NetworkId::as_str).collect::<Vec<_>>(), vec!["s", "sep"]);
    assert!(registry.get(&NetworkId::from("sep")).is_ok());
    assert!(matches!(registry.get(&NetworkId::from("eth")), Err(ActionError::NetworkNotEnabled(_))));
  }

  #[test]
  fn test_read_only_network_is_rejected_for_writes() {
    let registry = NetworkRegistry::build(&manifest(), &[], &deps()).unwrap();

    assert!(registry.get(&NetworkId::from("s")).is_ok());
    assert!(matches!(registry.get_read_write(&NetworkId::from("s")), Err(ActionError::ReadOnlyNetwork(_))));
    assert!(registry.get_read_write(&NetworkId::from("sn")).is_ok());
    assert!(registry.get_read_write(&NetworkId::from("eth")).unwrap().actions().is_some());
  }

  #[test]
  fn test_unknown_enabled_network_fails() {
    assert!(NetworkRegistry::build(&manifest(), &[NetworkId::from("nope")], &deps()).is_err());
  }
}
