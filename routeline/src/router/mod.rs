pub mod config;
pub mod dispatcher;
pub mod params;
pub mod pattern;
pub mod table;

use crate::config::{Config, ConfigProvider, ConfigProviderError};
use crate::handler::action::{Action, ActionResolver};
use crate::handler::resolver::{ClassRegistry, ControllerResolver};
use crate::handler::SharedHandler;
use crate::message::{Method, Request, Response, UnknownMethod};
use crate::middleware::registry::{MiddlewareRegistry, MiddlewareRegistryError};
use crate::middleware::{Middleware, SharedMiddleware};
use crate::render::SharedRenderer;
use crate::router::config::{MiddlewareMode, RouterConfig, ANY_METHOD};
use crate::router::dispatcher::{DispatchError, Dispatcher};
use crate::router::pattern::{Pattern, PatternError, UnboundPlaceholder};
use crate::router::table::{RouteDescriptor, RouteHandle, RouteMatch, RouteTable, UnknownRouteHandle};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Route pattern is invalid.")]
    InvalidPattern {
        #[source]
        source: PatternError,
    },

    #[error("Route method is invalid.")]
    InvalidMethod {
        #[source]
        source: UnknownMethod,
    },

    #[error("No route has been registered yet.")]
    NoRecentRoute,

    #[error("Route handle does not belong to this router.")]
    UnknownRoute {
        #[source]
        source: UnknownRouteHandle,
    },

    #[error("Middleware could not be attached.")]
    MiddlewareRegistry {
        #[source]
        source: MiddlewareRegistryError,
    },

    #[error("No route is named '{name}'.")]
    UnknownRouteName { name: String },

    #[error("Route '{name}' cannot be built from the given parameters.")]
    MissingParameter {
        name: String,
        #[source]
        source: UnboundPlaceholder,
    },

    #[error("Router configuration could not be loaded.")]
    Config {
        #[source]
        source: ConfigProviderError,
    },
}

impl From<PatternError> for RouterError {
    fn from(source: PatternError) -> Self {
        RouterError::InvalidPattern { source }
    }
}

impl From<UnknownMethod> for RouterError {
    fn from(source: UnknownMethod) -> Self {
        RouterError::InvalidMethod { source }
    }
}

impl From<UnknownRouteHandle> for RouterError {
    fn from(source: UnknownRouteHandle) -> Self {
        RouterError::UnknownRoute { source }
    }
}

impl From<MiddlewareRegistryError> for RouterError {
    fn from(source: MiddlewareRegistryError) -> Self {
        RouterError::MiddlewareRegistry { source }
    }
}

impl From<ConfigProviderError> for RouterError {
    fn from(source: ConfigProviderError) -> Self {
        RouterError::Config { source }
    }
}

/// The router facade: registration, configuration and dispatch.
///
/// # Behavior
/// Routes are registered first and dispatched afterwards; dispatch only needs
/// `&self`, so a configured router can be shared behind an `Arc` and serve any
/// number of concurrent requests.
///
/// Registration calls return `Result<&mut Self, RouterError>` and can be
/// chained with `?`. `name` and `middleware` apply to every route created by
/// the latest registration call (all six routes for [`Router::any`]).
///
/// # Examples
/// ```rust
/// use routeline::handler::{handler_fn, HandlerError};
/// use routeline::router::Router;
///
/// let mut router = Router::default();
/// router
///     .get("/users/{id}", handler_fn(|_request, _response, params| async move {
///         Ok::<_, HandlerError>(format!("<p>user {}</p>", params.get("id").unwrap_or_default()))
///     }))
///     .unwrap()
///     .name("users.show")
///     .unwrap();
/// assert_eq!(router.url_for("users.show", &[("id", "7")]).unwrap(), "/users/7");
/// ```
pub struct Router {
    table: RouteTable,
    dispatcher: Dispatcher,
    middleware_registry: Arc<MiddlewareRegistry>,
    mode: MiddlewareMode,
    recent: Vec<RouteHandle>,
}

impl Router {
    pub fn new(resolver: Arc<dyn ControllerResolver>) -> Self {
        Self {
            table: RouteTable::new(),
            dispatcher: Dispatcher::new(ActionResolver::new(resolver)),
            middleware_registry: Arc::new(MiddlewareRegistry::new()),
            mode: MiddlewareMode::default(),
            recent: Vec::new(),
        }
    }

    /// Builds a router from configuration.
    ///
    /// # Behavior
    /// Routes are registered in configuration order, their middleware names are
    /// looked up in `middleware_registry`, and the prefix is applied last so it
    /// covers every configured route.
    pub fn from_config(
        config: &RouterConfig,
        resolver: Arc<dyn ControllerResolver>,
        middleware_registry: Arc<MiddlewareRegistry>,
    ) -> Result<Self, RouterError> {
        let mut router = Router::new(resolver)
            .with_middleware_registry(middleware_registry)
            .with_middleware_mode(config.middleware_mode);

        for name in &config.global_middleware {
            let stage = router.middleware_registry.find(name)?;
            router.dispatcher.push_global(stage);
        }
        for route in &config.routes {
            router.register(&route.method, &route.pattern, Action::from(&route.action))?;
            if let Some(name) = &route.name {
                router.name(name.as_str())?;
            }
            for middleware in &route.middleware {
                let stage = router.middleware_registry.find(middleware)?;
                router.attach_to_recent(stage)?;
            }
        }
        if let Some(prefix) = &config.prefix {
            router.set_pre_route(prefix)?;
        }
        log::info!("Loaded {} routes from configuration", router.table.len());
        Ok(router)
    }

    pub fn from_provider(
        provider: &impl ConfigProvider<RouterConfig>,
        resolver: Arc<dyn ControllerResolver>,
        middleware_registry: Arc<MiddlewareRegistry>,
    ) -> Result<Self, RouterError> {
        let config = Config::new(provider)?;
        Router::from_config(config.get(), resolver, middleware_registry)
    }

    pub fn with_middleware_mode(mut self, mode: MiddlewareMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_middleware_registry(mut self, middleware_registry: Arc<MiddlewareRegistry>) -> Self {
        self.middleware_registry = middleware_registry;
        self
    }

    pub fn with_renderer(mut self, renderer: SharedRenderer) -> Self {
        self.dispatcher.set_renderer(renderer);
        self
    }

    /// Sets the response handlers receive as their starting point.
    pub fn with_response(mut self, response: Response) -> Self {
        self.dispatcher.set_prototype(response);
        self
    }

    pub fn middleware_mode(&self) -> MiddlewareMode {
        self.mode
    }

    pub fn middleware_registry(&self) -> &Arc<MiddlewareRegistry> {
        &self.middleware_registry
    }

    /// Registers `action` for `method` (case-insensitive, or `"any"`).
    pub fn register(
        &mut self,
        method: &str,
        pattern: &str,
        action: impl Into<Action>,
    ) -> Result<&mut Self, RouterError> {
        if method.trim().eq_ignore_ascii_case(ANY_METHOD) {
            return self.any(pattern, action);
        }
        let method = method.parse::<Method>()?;
        self.add(method, pattern, action)?;
        Ok(self)
    }

    /// Registers one route and returns its handle.
    pub fn add(
        &mut self,
        method: Method,
        pattern: &str,
        action: impl Into<Action>,
    ) -> Result<RouteHandle, RouterError> {
        let handle = self.table.register(method, pattern, action.into())?;
        self.recent = vec![handle];
        Ok(handle)
    }

    pub fn get(&mut self, pattern: &str, action: impl Into<Action>) -> Result<&mut Self, RouterError> {
        self.add(Method::Get, pattern, action)?;
        Ok(self)
    }

    pub fn post(&mut self, pattern: &str, action: impl Into<Action>) -> Result<&mut Self, RouterError> {
        self.add(Method::Post, pattern, action)?;
        Ok(self)
    }

    pub fn put(&mut self, pattern: &str, action: impl Into<Action>) -> Result<&mut Self, RouterError> {
        self.add(Method::Put, pattern, action)?;
        Ok(self)
    }

    pub fn delete(&mut self, pattern: &str, action: impl Into<Action>) -> Result<&mut Self, RouterError> {
        self.add(Method::Delete, pattern, action)?;
        Ok(self)
    }

    pub fn patch(&mut self, pattern: &str, action: impl Into<Action>) -> Result<&mut Self, RouterError> {
        self.add(Method::Patch, pattern, action)?;
        Ok(self)
    }

    pub fn options(&mut self, pattern: &str, action: impl Into<Action>) -> Result<&mut Self, RouterError> {
        self.add(Method::Options, pattern, action)?;
        Ok(self)
    }

    /// Registers `action` for every supported method.
    ///
    /// The pattern is validated once up front, so either all six routes are
    /// registered or none.
    pub fn any(&mut self, pattern: &str, action: impl Into<Action>) -> Result<&mut Self, RouterError> {
        Pattern::parse(pattern)?;
        let action = action.into();
        let mut handles = Vec::with_capacity(Method::ALL.len());
        for method in Method::ALL {
            handles.push(self.table.register(method, pattern, action.clone())?);
        }
        self.recent = handles;
        Ok(self)
    }

    /// Names the route(s) created by the latest registration call.
    pub fn name(&mut self, name: impl Into<String>) -> Result<&mut Self, RouterError> {
        if self.recent.is_empty() {
            return Err(RouterError::NoRecentRoute);
        }
        let name = name.into();
        for handle in &self.recent {
            self.table.set_name(*handle, name.clone())?;
        }
        Ok(self)
    }

    /// Attaches `stage` according to the middleware mode.
    ///
    /// # Errors
    /// [`RouterError::NoRecentRoute`] in per-route mode before any route was
    /// registered.
    pub fn middleware(&mut self, stage: impl Middleware + 'static) -> Result<&mut Self, RouterError> {
        self.middleware_shared(Arc::new(stage))
    }

    pub fn middleware_shared(&mut self, stage: SharedMiddleware) -> Result<&mut Self, RouterError> {
        match self.mode {
            MiddlewareMode::Global => self.dispatcher.push_global(stage),
            MiddlewareMode::PerRoute => self.attach_to_recent(stage)?,
        }
        Ok(self)
    }

    /// Like [`Router::middleware`], taking the stage from the middleware registry.
    pub fn middleware_named(&mut self, name: &str) -> Result<&mut Self, RouterError> {
        let stage = self.middleware_registry.find(name)?;
        self.middleware_shared(stage)
    }

    /// Attaches `stage` to one specific route.
    pub fn attach_middleware(
        &mut self,
        handle: RouteHandle,
        stage: impl Middleware + 'static,
    ) -> Result<&mut Self, RouterError> {
        self.table.attach_middleware(handle, Arc::new(stage))?;
        Ok(self)
    }

    /// Appends `stage` to the chain that runs before every route's own middleware.
    pub fn global_middleware(&mut self, stage: impl Middleware + 'static) -> &mut Self {
        self.dispatcher.push_global(Arc::new(stage));
        self
    }

    /// Prefixes every route registered so far, replacing any earlier prefix.
    pub fn set_pre_route(&mut self, prefix: &str) -> Result<&mut Self, RouterError> {
        self.table.apply_prefix(prefix)?;
        Ok(self)
    }

    pub fn set_not_found(&mut self, handler: SharedHandler) -> &mut Self {
        self.dispatcher.set_not_found(handler);
        self
    }

    pub fn set_internal_server_error(&mut self, handler: SharedHandler) -> &mut Self {
        self.dispatcher.set_internal_error(handler);
        self
    }

    /// Dispatches `request` and produces its response.
    ///
    /// # Errors
    /// - [`DispatchError::EmptyResponse`] when a handler returns nothing.
    /// - [`DispatchError::Handler`] / [`DispatchError::Middleware`] when a
    ///   handler or middleware stage fails; these are never turned into a
    ///   response here (see [`Router::internal_error`]).
    pub async fn dispatch(&self, request: Request) -> Result<Response, DispatchError> {
        self.dispatcher.dispatch(&self.table, request).await
    }

    /// Renders the internal-error response configured with
    /// [`Router::set_internal_server_error`], or the default 500 page.
    pub async fn internal_error(&self, request: &Request) -> Result<Response, DispatchError> {
        self.dispatcher.internal_error(request).await
    }

    pub fn routes(&self) -> Vec<RouteDescriptor> {
        self.table.describe()
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        self.table.find(method, path)
    }

    /// Builds the path of the route named `name`.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, RouterError> {
        let route = self
            .table
            .named(name)
            .ok_or_else(|| RouterError::UnknownRouteName {
                name: name.to_string(),
            })?;
        route
            .pattern()
            .expand(|placeholder| {
                params
                    .iter()
                    .find(|(key, _)| *key == placeholder)
                    .map(|(_, value)| *value)
            })
            .map_err(|source| RouterError::MissingParameter {
                name: name.to_string(),
                source,
            })
    }

    fn attach_to_recent(&mut self, stage: SharedMiddleware) -> Result<(), RouterError> {
        if self.recent.is_empty() {
            return Err(RouterError::NoRecentRoute);
        }
        for handle in &self.recent {
            self.table.attach_middleware(*handle, stage.clone())?;
        }
        Ok(())
    }
}

impl Default for Router {
    fn default() -> Self {
        Router::new(Arc::new(ClassRegistry::new()))
    }
}
