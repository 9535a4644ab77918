use crate::handler::action::ActionResolver;
use crate::handler::{HandlerError, SharedHandler};
use crate::message::{Reply, Request, Response, CONTENT_TYPE, HTML_CONTENT_TYPE};
use crate::middleware::{Endpoint, MiddlewareChain, SharedMiddleware};
use crate::render::{SharedRenderer, DEFAULT_RENDERER};
use crate::router::params::Params;
use crate::router::table::RouteTable;
use crate::status::StatusCode;
use async_trait::async_trait;
use thiserror::Error;

const NOT_FOUND_ROUTE: &str = "not_found";
const INTERNAL_ERROR_ROUTE: &str = "internal_error";

/// Failures that escape a dispatch.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Handler for route '{route}' returned no response.")]
    EmptyResponse { route: String },

    #[error("Handler failed.")]
    Handler {
        #[source]
        source: HandlerError,
    },

    #[error("Middleware '{name}' failed.")]
    Middleware {
        name: String,
        #[source]
        source: HandlerError,
    },
}

impl DispatchError {
    #[inline]
    pub fn empty_response(route: impl Into<String>) -> Self {
        Self::EmptyResponse {
            route: route.into(),
        }
    }

    #[inline]
    pub fn handler(source: impl Into<HandlerError>) -> Self {
        Self::Handler {
            source: source.into(),
        }
    }

    #[inline]
    pub fn middleware(name: impl Into<String>, source: impl Into<HandlerError>) -> Self {
        Self::Middleware {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Turns a handler reply into the final response.
///
/// Text becomes a 200 HTML page built on `prototype`; an empty reply is an error.
fn normalize(reply: Reply, prototype: Response, route: &str) -> Result<Response, DispatchError> {
    match reply {
        Reply::Response(response) => Ok(response),
        Reply::Text(text) if !text.is_empty() => Ok(prototype
            .with_status(StatusCode::OK)
            .with_body(text)
            .with_header(CONTENT_TYPE, HTML_CONTENT_TYPE)),
        _ => Err(DispatchError::empty_response(route)),
    }
}

/// The resolved handler of a matched route, run at the end of the middleware chain.
struct BoundAction<'a> {
    route: &'a str,
    handler: SharedHandler,
    params: Params,
    prototype: &'a Response,
}

#[async_trait]
impl Endpoint for BoundAction<'_> {
    async fn call(&self, request: Request) -> Result<Response, DispatchError> {
        log::trace!("[{}] Invoking handler of route '{}'", request.id(), self.route);
        let reply = self
            .handler
            .handle(&request, self.prototype.clone(), &self.params)
            .await
            .map_err(DispatchError::handler)?;
        normalize(reply, self.prototype.clone(), self.route)
    }
}

/// Runs the lookup, resolution, middleware and invocation steps of a request.
///
/// # Behavior
/// - A request without a matching route, or whose action yields no handler,
///   is answered by the not-found policy. Middleware does not run for it.
/// - Global middleware runs first, followed by the matched route's own
///   middleware, both in registration order.
/// - Handler and middleware failures are returned to the caller untouched.
pub struct Dispatcher {
    resolver: ActionResolver,
    global: MiddlewareChain,
    not_found: Option<SharedHandler>,
    internal_error: Option<SharedHandler>,
    renderer: SharedRenderer,
    prototype: Response,
}

impl Dispatcher {
    pub fn new(resolver: ActionResolver) -> Self {
        Self {
            resolver,
            global: MiddlewareChain::new(),
            not_found: None,
            internal_error: None,
            renderer: DEFAULT_RENDERER.clone(),
            prototype: Response::new(),
        }
    }

    pub fn global(&self) -> &MiddlewareChain {
        &self.global
    }

    pub fn push_global(&mut self, stage: SharedMiddleware) {
        log::debug!("Registered global middleware '{}'", stage.name());
        self.global.push(stage);
    }

    pub fn set_not_found(&mut self, handler: SharedHandler) {
        self.not_found = Some(handler);
    }

    pub fn set_internal_error(&mut self, handler: SharedHandler) {
        self.internal_error = Some(handler);
    }

    pub fn set_renderer(&mut self, renderer: SharedRenderer) {
        self.renderer = renderer;
    }

    pub fn renderer(&self) -> &SharedRenderer {
        &self.renderer
    }

    /// Sets the response every handler starts from.
    pub fn set_prototype(&mut self, prototype: Response) {
        self.prototype = prototype;
    }

    pub async fn dispatch(&self, table: &RouteTable, request: Request) -> Result<Response, DispatchError> {
        let Some(found) = table.find(request.method(), request.path()) else {
            log::debug!("[{}] No route for {} {}", request.id(), request.method(), request.path());
            let params = request.query_params().into_iter().collect();
            return self.not_found(&request, params).await;
        };

        let route = found.route;
        let mut params = found.params;
        params.merge_query(request.query_params());

        let handler = match self.resolver.resolve(route.action()) {
            Ok(Some(handler)) => handler,
            Ok(None) => {
                log::debug!("[{}] Route '{}' has no handler", request.id(), route.id());
                return self.not_found(&request, params).await;
            }
            Err(e) => {
                log::warn!("[{}] Could not resolve action of route '{}': {}", request.id(), route.id(), e);
                return self.not_found(&request, params).await;
            }
        };

        let stages: Vec<SharedMiddleware> = self
            .global
            .stages()
            .iter()
            .chain(route.middleware().stages())
            .cloned()
            .collect();
        log::debug!(
            "[{}] {} {} matched route '{}' with {} middleware",
            request.id(),
            request.method(),
            request.path(),
            route.id(),
            stages.len()
        );
        let endpoint = BoundAction {
            route: route.id(),
            handler,
            params,
            prototype: &self.prototype,
        };
        MiddlewareChain::run(&stages, request, &endpoint).await
    }

    /// Renders the not-found response for `request`.
    ///
    /// # Behavior
    /// A custom handler receives `params` and its reply is normalized like a
    /// route handler's; text therefore yields status 200. Without a custom
    /// handler the renderer's 404 page is returned.
    pub async fn not_found(&self, request: &Request, params: Params) -> Result<Response, DispatchError> {
        match &self.not_found {
            Some(handler) => {
                let reply = handler
                    .handle(request, self.prototype.clone(), &params)
                    .await
                    .map_err(DispatchError::handler)?;
                normalize(reply, self.prototype.clone(), NOT_FOUND_ROUTE)
            }
            None => Ok(self
                .prototype
                .clone()
                .into_html(StatusCode::NOT_FOUND, self.renderer.not_found_html())),
        }
    }

    /// Renders the internal-error response for `request`.
    pub async fn internal_error(&self, request: &Request) -> Result<Response, DispatchError> {
        match &self.internal_error {
            Some(handler) => {
                let params = request.query_params().into_iter().collect();
                let reply = handler
                    .handle(request, self.prototype.clone(), &params)
                    .await
                    .map_err(DispatchError::handler)?;
                normalize(reply, self.prototype.clone(), INTERNAL_ERROR_ROUTE)
            }
            None => Ok(self
                .prototype
                .clone()
                .into_html(StatusCode::INTERNAL_SERVER_ERROR, self.renderer.internal_error_html())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::resolver::ClassRegistry;
    use crate::handler::{handler_fn, HandlerError};
    use crate::message::Method;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(ActionResolver::new(Arc::new(ClassRegistry::new())))
    }

    #[test]
    fn test_normalize_text() {
        let response = normalize(Reply::from("<p>ok</p>"), Response::new().with_status(StatusCode::FORBIDDEN), "r").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header(CONTENT_TYPE), Some(HTML_CONTENT_TYPE));
        assert_eq!(response.body_text(), "<p>ok</p>");
    }

    #[test]
    fn test_normalize_empty() {
        assert!(matches!(
            normalize(Reply::Empty, Response::new(), "r"),
            Err(DispatchError::EmptyResponse { route }) if route == "r"
        ));
        assert!(normalize(Reply::from(""), Response::new(), "r").is_err());
        assert_eq!(normalize(Reply::from("0"), Response::new(), "r").unwrap().body_text(), "0");
    }

    #[tokio::test]
    async fn test_prototype_is_passed_to_handlers() {
        let mut table = RouteTable::new();
        let handler = handler_fn(|_request, response: Response, _params| async move {
            Ok::<_, HandlerError>(response.with_body("built"))
        });
        table.register(Method::Get, "/", handler.into()).unwrap();
        let mut dispatcher = dispatcher();
        dispatcher.set_prototype(Response::new().with_header("X-Powered-By", "routeline"));
        let response = dispatcher.dispatch(&table, Request::new("GET", "/")).await.unwrap();
        assert_eq!(response.header("x-powered-by"), Some("routeline"));
        assert_eq!(response.body_text(), "built");
    }

    #[tokio::test]
    async fn test_unresolvable_action_is_not_found() {
        let mut table = RouteTable::new();
        table
            .register(Method::Get, "/reports", "ReportController@index".into())
            .unwrap();
        let response = dispatcher()
            .dispatch(&table, Request::new("GET", "/reports"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_default_internal_error_page() {
        let response = dispatcher()
            .internal_error(&Request::new("GET", "/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body_text().contains("Internal Server Error"));
    }
}
