use tokio::{select, signal};

pub async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(err) = signal::ctrl_c().await {
      tracing::error!("failed to install ctrl-c handler: {}", err);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut stream) => {
        stream.recv().await;
      }
      Err(err) => {
        tracing::error!("failed to install terminate handler: {}", err);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  select! {
    () = ctrl_c => {},
    () = terminate => {},
  }

  tracing::info!("signal received, starting graceful shutdown");
}
