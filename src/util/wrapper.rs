use anyhow::Result;
use axum::{
  extract::Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::ActionError;

/// Lookup of something the indexer does not know about.
#[derive(Error, Debug)]
#[error("{0} not found")]
pub struct NotFound(pub String);

pub struct Wrapper<T>(pub T);

impl<T: Serialize> IntoResponse for Wrapper<Result<T>> {
  fn into_response(self) -> Response {
    match self.0 {
      Ok(v) => Json(v).into_response(),
      Err(e) => {
        let disabled = matches!(e.downcast_ref::<ActionError>(), Some(ActionError::NetworkNotEnabled(_)));
        let status = if disabled || e.is::<NotFound>() {
          StatusCode::NOT_FOUND
        } else {
          tracing::warn!("request failed: {:#}", e);
          StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, e.to_string()).into_response()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use anyhow::anyhow;

  use super::*;
  use crate::NetworkId;

  #[test]
  fn test_status_codes() {
    let ok: Result<u32> = Ok(1);
    assert_eq!(Wrapper(ok).into_response().status(), StatusCode::OK);

    let missing: Result<u32> = Err(NotFound("space 0x1".to_string()).into());
    assert_eq!(Wrapper(missing).into_response().status(), StatusCode::NOT_FOUND);

    let disabled: Result<u32> = Err(ActionError::NetworkNotEnabled(NetworkId::from("eth")).into());
    assert_eq!(Wrapper(disabled).into_response().status(), StatusCode::NOT_FOUND);

    let failed: Result<u32> = Err(anyhow!("indexer down"));
    assert_eq!(Wrapper(failed).into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
