use std::{sync::Arc, time::Duration};

use moka::future::Cache as MokaCache;

use crate::{Proposal, Space, Vote};

/// Read-through caches in front of the indexers, keyed by network plus query.
#[derive(Clone)]
pub struct Caches {
  pub spaces: MokaCache<String, Arc<Vec<Space>>>,
  pub space: MokaCache<String, Arc<Space>>,
  pub proposals: MokaCache<String, Arc<Vec<Proposal>>>,
  pub votes: MokaCache<String, Arc<Vec<Vote>>>,
}

impl Caches {
  pub fn build() -> Self {
    Self {
      spaces: MokaCache::builder().time_to_live(Duration::from_secs(60 * 5)).build(),
      space: MokaCache::builder().time_to_live(Duration::from_secs(60 * 5)).build(),
      proposals: MokaCache::builder().time_to_live(Duration::from_secs(60)).build(),
      votes: MokaCache::builder().time_to_live(Duration::from_secs(30)).build(),
    }
  }
}
