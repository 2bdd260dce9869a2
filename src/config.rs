use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Args;

use crate::{Hub, HttpPinner, NetworkDeps, NetworkId, NetworkRegistry, NetworksManifest, PollConfig};

#[derive(Clone, Args)]
pub struct HubConfig {
  /// Networks to enable, comma separated. Every network in the manifest when unset.
  #[clap(long, env = "ENABLED_NETWORKS", value_delimiter = ',')]
  pub enabled_networks: Vec<String>,
  /// The URL from which the `networks.json` should be fetched.
  #[clap(long = "networks-url", env = "NETWORKS_URL")]
  pub maybe_networks_url: Option<String>,
  /// Pinning service used for proposal and space metadata.
  #[clap(long, env, default_value = "https://pineapple.fyi")]
  pub pin_url: String,
  /// Delay between transaction receipt polls.
  #[clap(long, env, default_value = "2000")]
  pub poll_interval_ms: u64,
  /// Receipt polls before a transaction is reported as not found.
  #[clap(long, env, default_value = "90")]
  pub poll_attempts: u32,
}

impl HubConfig {
  pub async fn to_hub(&self) -> Result<Hub> {
    Ok(Hub::new(self.to_registry().await?))
  }

  pub async fn to_registry(&self) -> Result<NetworkRegistry> {
    let manifest = self.load_manifest().await?;
    let enabled: Vec<NetworkId> = self
      .enabled_networks
      .iter()
      .map(|id| id.trim())
      .filter(|id| !id.is_empty())
      .map(NetworkId::from)
      .collect();
    let deps = NetworkDeps {
      pinner: Arc::new(HttpPinner::new(&self.pin_url)),
      poll: PollConfig { interval: Duration::from_millis(self.poll_interval_ms), attempts: self.poll_attempts },
    };
    NetworkRegistry::build(&manifest, &enabled, &deps)
  }

  async fn load_manifest(&self) -> Result<NetworksManifest> {
    let manifest_bytes = match self.maybe_networks_url.as_deref().filter(|url| !url.is_empty()) {
      Some(url) => {
        tracing::info!("loading network manifest from {}", url);
        reqwest::Client::new().get(url).send().await?.error_for_status()?.bytes().await?
      }
      None => Bytes::from_static(include_bytes!("../networks/networks.json")),
    };
    serde_json::from_slice(manifest_bytes.as_ref()).context("invalid network manifest")
  }
}
