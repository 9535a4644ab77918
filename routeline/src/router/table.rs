use crate::handler::action::Action;
use crate::message::Method;
use crate::middleware::{MiddlewareChain, SharedMiddleware};
use crate::router::params::Params;
use crate::router::pattern::{Pattern, PatternError, RequestPath};
use fnv::{FnvBuildHasher, FnvHasher};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Key for the exact-match index of placeholder-free routes.
///
/// # Behavior
/// Only the FNV hashes of the method and the normalized path are stored, so a
/// hit must still be confirmed against the route itself.
#[derive(Clone, PartialEq, Eq, Hash)]
struct StaticPathMethodKey {
    method_hash: u64,
    path_hash: u64,
}

impl StaticPathMethodKey {
    fn new(method: Method, path: impl AsRef<str>) -> Self {
        let mut path_hasher = FnvHasher::default();
        path.as_ref().hash(&mut path_hasher);
        let path_hash = path_hasher.finish();
        let mut method_hasher = FnvHasher::default();
        method.as_str().hash(&mut method_hasher);
        let method_hash = method_hasher.finish();
        Self {
            method_hash,
            path_hash,
        }
    }
}

/// Identifies a route inside the [`RouteTable`] that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteHandle(usize);

impl RouteHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No route is registered for handle {index}.")]
pub struct UnknownRouteHandle {
    pub index: usize,
}

/// Derives the identifier of a route from its method and pattern.
///
/// Placeholder names are erased and every non-alphanumeric character is
/// removed, so `get` + `/users/{id}` yields `getusers`.
pub fn route_id(method: Method, pattern: &Pattern) -> String {
    let erased = pattern
        .segments()
        .iter()
        .map(|segment| match segment {
            crate::router::pattern::Segment::Literal(literal) => literal.as_str(),
            crate::router::pattern::Segment::Placeholder(_) => "_",
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("{}_{}", method.as_str(), erased)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// A registered route.
pub struct Route {
    id: String,
    method: Method,
    pattern: Pattern,
    prefix: Option<String>,
    effective: Pattern,
    action: Action,
    name: Option<String>,
    middleware: MiddlewareChain,
}

impl Route {
    fn new(method: Method, pattern: Pattern, action: Action) -> Self {
        Self {
            id: route_id(method, &pattern),
            method,
            effective: pattern.clone(),
            pattern,
            prefix: None,
            action,
            name: None,
            middleware: MiddlewareChain::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The pattern requests are matched against, prefix included.
    pub fn pattern(&self) -> &Pattern {
        &self.effective
    }

    /// The pattern as it was registered, without prefix.
    pub fn registered_pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn param_names(&self) -> &[String] {
        self.effective.param_names()
    }

    pub fn segment_count(&self) -> usize {
        self.effective.segment_count()
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    pub fn describe(&self) -> RouteDescriptor {
        RouteDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            method: self.method,
            pattern: self.effective.as_str().to_string(),
            prefix: self.prefix.clone(),
            param_names: self.param_names().to_vec(),
            segment_count: self.segment_count(),
            action: self.action.kind(),
            target: self.action.label(),
            middleware: self.middleware.names(),
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("pattern", &self.effective.as_str())
            .field("action", &self.action)
            .field("name", &self.name)
            .field("middleware", &self.middleware)
            .finish()
    }
}

/// Serializable view of a route, as returned by route listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescriptor {
    pub id: String,
    pub name: Option<String>,
    pub method: Method,
    pub pattern: String,
    pub prefix: Option<String>,
    pub param_names: Vec<String>,
    pub segment_count: usize,
    pub action: &'static str,
    pub target: Option<String>,
    pub middleware: Vec<String>,
}

/// The route selected for a request together with its bound placeholders.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: Params,
}

/// Ordered collection of routes.
///
/// # Behavior
/// Registration order is matching order: when several routes match a request
/// the one registered first wins. Placeholder-free routes are additionally
/// indexed by method and path, which turns most static lookups into a single
/// hash probe; routes with placeholders are scanned linearly, and only those
/// registered before the static candidate need to be checked.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    static_index: HashMap<StaticPathMethodKey, usize, FnvBuildHasher>,
    dynamic: Vec<usize>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `pattern` and appends a route with no middleware.
    ///
    /// # Errors
    /// [`PatternError`] when the pattern is empty or malformed. The table is
    /// left unchanged in that case.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        action: Action,
    ) -> Result<RouteHandle, PatternError> {
        let pattern = Pattern::parse(pattern)?;
        let index = self.routes.len();
        log::debug!("Registering route {} {} ({:?})", method, pattern, action);
        self.routes.push(Route::new(method, pattern, action));
        self.index_route(index);
        Ok(RouteHandle(index))
    }

    pub fn attach_middleware(
        &mut self,
        handle: RouteHandle,
        stage: SharedMiddleware,
    ) -> Result<(), UnknownRouteHandle> {
        let route = self.route_mut(handle)?;
        log::debug!("Attaching middleware '{}' to route '{}'", stage.name(), route.id);
        route.middleware.push(stage);
        Ok(())
    }

    pub fn set_name(&mut self, handle: RouteHandle, name: impl Into<String>) -> Result<(), UnknownRouteHandle> {
        self.route_mut(handle)?.name = Some(name.into());
        Ok(())
    }

    /// Replaces the prefix of every registered route.
    ///
    /// # Behavior
    /// Each effective pattern becomes `normalize(prefix + "/" + pattern)`
    /// where `pattern` is the pattern the route was registered with, so
    /// applying a prefix twice replaces it rather than stacking. Routes
    /// registered afterwards are not affected.
    pub fn apply_prefix(&mut self, prefix: &str) -> Result<(), PatternError> {
        let prefix = prefix.trim_end_matches(['/', '\\']);
        let prefixed = self
            .routes
            .iter()
            .map(|route| route.pattern.with_prefix(prefix))
            .collect::<Result<Vec<_>, _>>()?;
        for (route, effective) in self.routes.iter_mut().zip(prefixed) {
            route.id = route_id(route.method, &effective);
            route.prefix = (!prefix.is_empty()).then(|| prefix.to_string());
            route.effective = effective;
        }
        self.reindex();
        log::info!("Applied prefix '{}' to {} routes", prefix, self.routes.len());
        Ok(())
    }

    /// Finds the first route matching `method` and `path`.
    ///
    /// # Returns
    /// `None` when the method is not a supported method or no route matches.
    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let method = method.parse::<Method>().ok()?;
        let path = RequestPath::parse(path);

        let candidate = match self.static_index.get(&StaticPathMethodKey::new(method, path.as_str())) {
            None => None,
            Some(&index) if self.is_exact(index, method, &path) => Some(index),
            Some(_) => return self.scan(method, &path, self.routes.len()),
        };

        let limit = candidate.unwrap_or(self.routes.len());
        if let Some(found) = self.scan_dynamic(method, &path, limit) {
            return Some(found);
        }
        candidate.map(|index| RouteMatch {
            route: &self.routes[index],
            params: Params::new(),
        })
    }

    pub fn get(&self, handle: RouteHandle) -> Option<&Route> {
        self.routes.get(handle.0)
    }

    /// First route registered under `name`.
    pub fn named(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.name() == Some(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn describe(&self) -> Vec<RouteDescriptor> {
        self.routes.iter().map(Route::describe).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn route_mut(&mut self, handle: RouteHandle) -> Result<&mut Route, UnknownRouteHandle> {
        self.routes
            .get_mut(handle.0)
            .ok_or(UnknownRouteHandle { index: handle.0 })
    }

    fn is_exact(&self, index: usize, method: Method, path: &RequestPath) -> bool {
        let route = &self.routes[index];
        route.method == method && route.effective.as_str() == path.as_str()
    }

    fn index_route(&mut self, index: usize) {
        let route = &self.routes[index];
        if route.effective.is_static() {
            // Keep the earliest route for a key; later duplicates never win.
            self.static_index
                .entry(StaticPathMethodKey::new(route.method, route.effective.as_str()))
                .or_insert(index);
        } else {
            self.dynamic.push(index);
        }
    }

    fn reindex(&mut self) {
        self.static_index.clear();
        self.dynamic.clear();
        for index in 0..self.routes.len() {
            self.index_route(index);
        }
    }

    fn scan_dynamic(&self, method: Method, path: &RequestPath, limit: usize) -> Option<RouteMatch<'_>> {
        self.dynamic
            .iter()
            .take_while(|&&index| index < limit)
            .map(|&index| &self.routes[index])
            .filter(|route| route.method == method && route.segment_count() == path.segment_count())
            .find_map(|route| {
                route
                    .effective
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    fn scan(&self, method: Method, path: &RequestPath, limit: usize) -> Option<RouteMatch<'_>> {
        log::trace!("Static index collision for '{}', scanning all routes", path.as_str());
        self.routes[..limit]
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                route
                    .effective
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(routes: &[(Method, &str, &str)]) -> RouteTable {
        let mut table = RouteTable::new();
        for (method, pattern, action) in routes {
            table.register(*method, pattern, Action::classify(action)).unwrap();
        }
        table
    }

    fn target(found: Option<RouteMatch<'_>>) -> Option<String> {
        found.and_then(|found| found.route.action().label())
    }

    #[test]
    fn test_register_normalizes_pattern() {
        let table = table(&[(Method::Get, "users//{id}/", "Users@show")]);
        let route = table.get(RouteHandle(0)).unwrap();
        assert_eq!(route.pattern().as_str(), "/users/{id}");
        assert_eq!(route.param_names(), &["id".to_string()]);
        assert_eq!(route.segment_count(), 2);
        assert_eq!(route.id(), "getusers");
        assert!(route.middleware().is_empty());
    }

    #[test]
    fn test_register_rejects_invalid_patterns() {
        let mut table = RouteTable::new();
        assert!(table.register(Method::Get, "", Action::classify("A")).is_err());
        assert!(table.register(Method::Get, "/users/{id", Action::classify("A")).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let table = table(&[(Method::Post, "/users", "Users@store")]);
        assert!(table.find("POST", "/users").is_some());
        assert!(table.find("post", "/users/").is_some());
        assert!(table.find("GET", "/users").is_none());
        assert!(table.find("HEAD", "/users").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let table = table(&[
            (Method::Get, "/users/{id}", "First"),
            (Method::Get, "/users/{id}", "Second"),
            (Method::Get, "/about", "AboutOne"),
            (Method::Get, "/about", "AboutTwo"),
        ]);
        assert_eq!(target(table.find("GET", "/users/1")).as_deref(), Some("First"));
        assert_eq!(target(table.find("GET", "/about")).as_deref(), Some("AboutOne"));
    }

    #[test]
    fn test_earlier_placeholder_route_beats_later_static_route() {
        let table = table(&[
            (Method::Get, "/users/{id}", "Dynamic"),
            (Method::Get, "/users/me", "Static"),
            (Method::Get, "/posts/latest", "LatestPost"),
            (Method::Get, "/posts/{slug}", "Post"),
        ]);
        assert_eq!(target(table.find("GET", "/users/me")).as_deref(), Some("Dynamic"));
        assert_eq!(target(table.find("GET", "/posts/latest")).as_deref(), Some("LatestPost"));
        let found = table.find("GET", "/posts/hello").unwrap();
        assert_eq!(found.params.get("slug"), Some("hello"));
    }

    #[test]
    fn test_root_route() {
        let table = table(&[(Method::Get, "{anything}", "Anything"), (Method::Get, "/", "Home")]);
        assert_eq!(target(table.find("GET", "/")).as_deref(), Some("Home"));
        assert_eq!(target(table.find("GET", "")).as_deref(), Some("Home"));
        assert_eq!(target(table.find("GET", "/x")).as_deref(), Some("Anything"));
    }

    #[test]
    fn test_apply_prefix() {
        let mut table = table(&[(Method::Get, "/users/{id}", "Users@show"), (Method::Get, "/", "Home")]);
        table.apply_prefix("/api/").unwrap();

        let found = table.find("GET", "/api/users/42").unwrap();
        assert_eq!(found.params.get("id"), Some("42"));
        assert_eq!(found.route.id(), "getapiusers");
        assert_eq!(found.route.prefix(), Some("/api"));
        assert!(table.find("GET", "/users/42").is_none());
        assert_eq!(target(table.find("GET", "/api")).as_deref(), Some("Home"));
        assert!(table.find("GET", "/").is_none());

        table.apply_prefix("/v2").unwrap();
        assert!(table.find("GET", "/v2/users/42").is_some());
        assert!(table.find("GET", "/api/users/42").is_none());
        assert!(table.find("GET", "/v2/api/users/42").is_none());
    }

    #[test]
    fn test_unknown_handle() {
        let mut table = table(&[(Method::Get, "/", "Home")]);
        assert_eq!(
            table.set_name(RouteHandle(3), "missing"),
            Err(UnknownRouteHandle { index: 3 })
        );
        assert!(table.get(RouteHandle(3)).is_none());
    }

    #[test]
    fn test_describe() {
        let mut table = table(&[(Method::Delete, "/posts/{post}", "Posts@destroy")]);
        table.set_name(RouteHandle(0), "posts.destroy").unwrap();
        let descriptors = table.describe();
        assert_eq!(descriptors.len(), 1);
        let json = serde_json::to_value(&descriptors[0]).unwrap();
        assert_eq!(json["method"], "delete");
        assert_eq!(json["pattern"], "/posts/{post}");
        assert_eq!(json["name"], "posts.destroy");
        assert_eq!(json["action"], "class_method_string");
        assert_eq!(json["target"], "Posts@destroy");
        assert_eq!(json["segment_count"], 2);
        assert_eq!(table.named("posts.destroy").unwrap().id(), "deleteposts");
    }
}
