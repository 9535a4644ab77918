use crate::message::{Request, Response};
use crate::middleware::{Middleware, Next};
use crate::render::{SharedRenderer, DEFAULT_RENDERER};
use crate::router::dispatcher::DispatchError;
use crate::status::StatusCode;
use async_trait::async_trait;

/// Turns handler failures into an HTML 500 page.
///
/// Only [`DispatchError::Handler`] is recovered; empty responses and
/// middleware failures still reach the caller. Stages registered before this
/// one see the rendered page, stages after it see the original error.
pub struct RecoverErrors {
    renderer: SharedRenderer,
}

impl RecoverErrors {
    pub const NAME: &'static str = "recover";

    pub fn new(renderer: SharedRenderer) -> Self {
        Self { renderer }
    }
}

impl Default for RecoverErrors {
    fn default() -> Self {
        Self::new(DEFAULT_RENDERER.clone())
    }
}

#[async_trait]
impl Middleware for RecoverErrors {
    async fn process(&self, request: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        let request_id = *request.id();
        match next.run(request).await {
            Err(DispatchError::Handler { source }) => {
                log::error!("[{}] Handler failed: {}", request_id, source);
                Ok(Response::new().into_html(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    self.renderer.internal_error_html(),
                ))
            }
            other => other,
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Endpoint, MiddlewareChain, SharedMiddleware};
    use std::sync::Arc;

    struct Failing(bool);

    #[async_trait]
    impl Endpoint for Failing {
        async fn call(&self, _request: Request) -> Result<Response, DispatchError> {
            if self.0 {
                Err(DispatchError::handler("disk full"))
            } else {
                Err(DispatchError::empty_response("r"))
            }
        }
    }

    #[tokio::test]
    async fn test_handler_failure_becomes_500() {
        let stages: Vec<SharedMiddleware> = vec![Arc::new(RecoverErrors::default())];
        let response = MiddlewareChain::run(&stages, Request::new("GET", "/"), &Failing(true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body_text().contains("500 | Internal Server Error"));
    }

    #[tokio::test]
    async fn test_empty_response_is_not_recovered() {
        let stages: Vec<SharedMiddleware> = vec![Arc::new(RecoverErrors::default())];
        let result = MiddlewareChain::run(&stages, Request::new("GET", "/"), &Failing(false)).await;
        assert!(matches!(result, Err(DispatchError::EmptyResponse { .. })));
    }
}
