pub mod action;
pub mod resolver;

use crate::message::{Reply, Request, Response};
use crate::router::params::Params;
use async_trait::async_trait;
use std::error::Error;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Failure type returned by handlers and middleware stages.
pub type HandlerError = Box<dyn Error + Send + Sync>;

pub type SharedHandler = Arc<dyn Handler>;

/// The terminal step of a dispatch.
///
/// A handler receives the request, the response prototype the router was
/// configured with and the arguments bound for this dispatch (path
/// placeholders first, then query-string values).
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        request: &Request,
        response: Response,
        params: &Params,
    ) -> Result<Reply, HandlerError>;
}

/// A [`Handler`] backed by an async closure.
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, R, E> Handler for FnHandler<F>
where
    F: Fn(Request, Response, Params) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send,
    R: Into<Reply> + Send,
    E: Into<HandlerError> + Send,
{
    async fn handle(
        &self,
        request: &Request,
        response: Response,
        params: &Params,
    ) -> Result<Reply, HandlerError> {
        (self.f)(request.clone(), response, params.clone())
            .await
            .map(Into::into)
            .map_err(Into::into)
    }
}

/// Wraps an async closure into a shareable handler.
///
/// # Examples
/// ```rust
/// use routeline::handler::{handler_fn, HandlerError};
///
/// let show_user = handler_fn(|_request, _response, params| async move {
///     let id = params.get("id").unwrap_or_default().to_string();
///     Ok::<_, HandlerError>(format!("<p>user {id}</p>"))
/// });
/// ```
pub fn handler_fn<F, Fut, R, E>(f: F) -> SharedHandler
where
    F: Fn(Request, Response, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Into<Reply> + Send + 'static,
    E: Into<HandlerError> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// A handler bound to a controller instance.
pub struct MethodHandler<C, F> {
    instance: Arc<C>,
    f: F,
    _marker: PhantomData<fn() -> C>,
}

#[async_trait]
impl<C, F, Fut, R, E> Handler for MethodHandler<C, F>
where
    C: Send + Sync,
    F: Fn(Arc<C>, Request, Response, Params) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send,
    R: Into<Reply> + Send,
    E: Into<HandlerError> + Send,
{
    async fn handle(
        &self,
        request: &Request,
        response: Response,
        params: &Params,
    ) -> Result<Reply, HandlerError> {
        (self.f)(self.instance.clone(), request.clone(), response, params.clone())
            .await
            .map(Into::into)
            .map_err(Into::into)
    }
}

/// Binds `f` to a controller instance, producing a handler that passes the
/// instance as the first argument on every call.
pub fn method_handler<C, F, Fut, R, E>(instance: Arc<C>, f: F) -> SharedHandler
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Request, Response, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Into<Reply> + Send + 'static,
    E: Into<HandlerError> + Send + 'static,
{
    Arc::new(MethodHandler {
        instance,
        f,
        _marker: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;

    struct Greeter {
        greeting: &'static str,
    }

    #[tokio::test]
    async fn test_handler_fn_receives_arguments() {
        let handler = handler_fn(|request, _response, params| async move {
            Ok::<_, HandlerError>(format!(
                "{} {}",
                request.method(),
                params.get("id").unwrap_or_default()
            ))
        });
        let mut params = Params::new();
        params.bind("id", "9");
        let reply = handler
            .handle(&Request::new("GET", "/users/9"), Response::new(), &params)
            .await
            .unwrap();
        assert_eq!(reply, Reply::Text("GET 9".to_string()));
    }

    #[tokio::test]
    async fn test_handler_fn_error_is_boxed() {
        let handler = handler_fn(|_request, _response, _params| async move {
            Err::<String, _>("database offline")
        });
        let error = handler
            .handle(&Request::new("GET", "/"), Response::new(), &Params::new())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "database offline");
    }

    #[tokio::test]
    async fn test_method_handler_uses_instance() {
        let instance = Arc::new(Greeter { greeting: "hello" });
        let handler = method_handler(instance, |this, _request, response, params| async move {
            let body = format!("{} {}", this.greeting, params.get("name").unwrap_or("nobody"));
            Ok::<_, HandlerError>(response.with_status(StatusCode::OK).with_body(body))
        });
        let reply = handler
            .handle(&Request::new("GET", "/"), Response::new(), &Params::new())
            .await
            .unwrap();
        match reply {
            Reply::Response(response) => assert_eq!(response.body_text(), "hello nobody"),
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
