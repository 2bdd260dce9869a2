use std::sync::Arc;

use anyhow::Result;
use axum::{
  debug_handler,
  extract::{Path, Query, State},
  response::IntoResponse,
  routing::get,
  serve as axum_serve, Json, Router,
};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{shutdown_signal, Hub, HubConfig, NetworkId, Paging, Wrapper};

#[derive(Clone, Parser)]
pub struct ServeArgs {
  /// API Host.
  #[clap(long, env, default_value = "0.0.0.0")]
  pub host: String,
  /// API Port.
  #[clap(long, env, default_value = "8080")]
  pub port: u16,
  /// Hub Args.
  #[command(flatten)]
  pub config: HubConfig,
}

impl ServeArgs {
  pub async fn serve(&self) -> Result<()> {
    let listener = TcpListener::bind(format!("{}:{}", self.host, self.port)).await?;
    tracing::info!("Starting server at http://{}.", listener.local_addr()?);

    let hub = self.config.to_hub().await?;
    axum_serve(listener, router(hub)).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
  }
}

pub fn router(hub: Hub) -> Router {
  Router::new()
    .route("/api/networks", get(get_networks))
    .route("/api/pending", get(get_pending))
    .route("/api/:network/templates", get(get_templates))
    .route("/api/:network/spaces", get(get_spaces))
    .route("/api/:network/space/:id", get(get_space))
    .route("/api/:network/space/:id/proposals", get(get_proposals))
    .route("/api/:network/space/:id/proposal/:proposal_id", get(get_proposal))
    .route("/api/:network/space/:id/proposal/:proposal_id/votes", get(get_votes))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(Arc::new(hub))
}

#[debug_handler]
async fn get_networks(ctx: State<Arc<Hub>>) -> impl IntoResponse {
  tracing::info!("get_networks");
  Json(ctx.networks())
}

#[debug_handler]
async fn get_pending(ctx: State<Arc<Hub>>) -> impl IntoResponse {
  tracing::info!("get_pending");
  Json(ctx.pending.list())
}

#[debug_handler]
async fn get_templates(ctx: State<Arc<Hub>>, Path(network): Path<String>) -> impl IntoResponse {
  tracing::info!("get_templates {}", network);
  Wrapper(ctx.templates(&NetworkId::new(network)))
}

#[debug_handler]
async fn get_spaces(
  ctx: State<Arc<Hub>>,
  Path(network): Path<String>,
  Query(paging): Query<Paging>,
) -> impl IntoResponse {
  tracing::info!("get_spaces {} {:?}", network, paging);
  Wrapper(ctx.spaces(&NetworkId::new(network), paging).await)
}

#[debug_handler]
async fn get_space(ctx: State<Arc<Hub>>, Path((network, id)): Path<(String, String)>) -> impl IntoResponse {
  tracing::info!("get_space {} {}", network, id);
  Wrapper(ctx.space(&NetworkId::new(network), &id).await)
}

#[debug_handler]
async fn get_proposals(
  ctx: State<Arc<Hub>>,
  Path((network, id)): Path<(String, String)>,
  Query(paging): Query<Paging>,
) -> impl IntoResponse {
  tracing::info!("get_proposals {} {} {:?}", network, id, paging);
  Wrapper(ctx.proposals(&NetworkId::new(network), &id, paging).await)
}

#[debug_handler]
async fn get_proposal(
  ctx: State<Arc<Hub>>,
  Path((network, id, proposal_id)): Path<(String, String, String)>,
) -> impl IntoResponse {
  tracing::info!("get_proposal {} {} {}", network, id, proposal_id);
  Wrapper(ctx.proposal(&NetworkId::new(network), &id, &proposal_id).await)
}

#[debug_handler]
async fn get_votes(
  ctx: State<Arc<Hub>>,
  Path((network, id, proposal_id)): Path<(String, String, String)>,
  Query(paging): Query<Paging>,
) -> impl IntoResponse {
  tracing::info!("get_votes {} {} {} {:?}", network, id, proposal_id, paging);
  Wrapper(ctx.votes(&NetworkId::new(network), &id, &proposal_id, paging).await)
}
