use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

#[derive(Deserialize)]
struct GraphqlResponse<T> {
  data: Option<T>,
  #[serde(default)]
  errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
  message: String,
}

/// Client for one GraphQL indexer endpoint.
#[derive(Clone, Debug)]
pub struct GraphqlClient {
  url: String,
  client: Client,
}

impl GraphqlClient {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into(), client: Client::new() }
  }

  pub async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
    let response = self
      .client
      .post(&self.url)
      .json(&json!({ "query": query, "variables": variables }))
      .send()
      .await
      .with_context(|| format!("failed to query {}", self.url))?
      .error_for_status()?;

    let body = response.bytes().await?;
    decode(&body)
  }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
  let response: GraphqlResponse<T> = serde_json::from_slice(body).context("invalid graphql response")?;
  if let Some(error) = response.errors.first() {
    return Err(anyhow!("graphql error: {}", error.message));
  }
  response.data.ok_or_else(|| anyhow!("graphql response has no data"))
}
