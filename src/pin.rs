use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Pinned {
  pub cid: String,
  pub provider: String,
}

impl Pinned {
  pub fn uri(&self) -> String {
    format!("ipfs://{}", self.cid)
  }
}

/// Content-addressed storage for proposal and space metadata.
#[async_trait]
pub trait Pinner: Send + Sync {
  async fn pin(&self, content: &Value) -> Result<Pinned>;
}

/// Posts the JSON document to a pinning gateway that answers `{ cid, provider }`.
#[derive(Clone, Debug)]
pub struct HttpPinner {
  url: String,
  client: Client,
}

impl HttpPinner {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into(), client: Client::new() }
  }
}

#[async_trait]
impl Pinner for HttpPinner {
  async fn pin(&self, content: &Value) -> Result<Pinned> {
    let response = self.client.post(&self.url).json(content).send().await?.error_for_status()?;
    let pinned: Pinned = response.json().await.with_context(|| format!("invalid response from {}", self.url))?;
    tracing::debug!("pinned {} via {}", pinned.cid, pinned.provider);
    Ok(pinned)
  }
}
