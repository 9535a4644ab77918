use crate::handler::action::Action;
use serde::{Deserialize, Serialize};

/// Method name that registers a route for every supported method.
pub const ANY_METHOD: &str = "any";

/// Where a positional `middleware(..)` call attaches its stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MiddlewareMode {
    /// Attach to the route(s) created by the latest registration call.
    #[default]
    #[serde(rename = "route", alias = "Route", alias = "ROUTE")]
    PerRoute,

    /// Append to the global chain.
    #[serde(rename = "global", alias = "Global", alias = "GLOBAL")]
    Global,
}

/// Declarative router setup.
///
/// # Structure
/// ```text
/// {
///   "prefix": "/api",
///   "middleware_mode": "route",
///   "global_middleware": ["access_log"],
///   "routes": [
///     { "method": "get", "pattern": "/users/{id}", "action": "UserController@show",
///       "name": "users.show", "middleware": ["auth"] },
///     { "method": "any", "pattern": "/ping", "action": ["HealthController", "ping"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default)]
    pub middleware_mode: MiddlewareMode,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_middleware: Vec<String>,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl RouterConfig {
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub method: String,

    pub pattern: String,

    pub action: ActionConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<String>,
}

impl RouteConfig {
    pub fn new(method: impl Into<String>, pattern: impl Into<String>, action: impl Into<ActionConfig>) -> Self {
        Self {
            method: method.into(),
            pattern: pattern.into(),
            action: action.into(),
            name: None,
            middleware: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.middleware.push(name.into());
        self
    }
}

/// An action as written in configuration.
///
/// Strings are classified like textual actions, a two element array is a
/// `[class, method]` pair and any other value is kept as an unsupported
/// action, which dispatches to not-found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionConfig {
    Reference(String),
    Pair(String, String),
    Other(serde_json::Value),
}

impl From<&str> for ActionConfig {
    fn from(value: &str) -> Self {
        ActionConfig::Reference(value.to_string())
    }
}

impl From<(&str, &str)> for ActionConfig {
    fn from((class, method): (&str, &str)) -> Self {
        ActionConfig::Pair(class.to_string(), method.to_string())
    }
}

impl From<&ActionConfig> for Action {
    fn from(value: &ActionConfig) -> Self {
        match value {
            ActionConfig::Reference(reference) => Action::classify(reference),
            ActionConfig::Pair(class, method) => Action::pair(class.as_str(), method.as_str()),
            ActionConfig::Other(other) => Action::Unsupported(other.to_string()),
        }
    }
}

pub struct RouterConfigBuilder {
    config: RouterConfig,
}

impl RouterConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RouterConfig::default(),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    pub fn middleware_mode(mut self, mode: MiddlewareMode) -> Self {
        self.config.middleware_mode = mode;
        self
    }

    pub fn global_middleware(mut self, name: impl Into<String>) -> Self {
        self.config.global_middleware.push(name.into());
        self
    }

    pub fn route(mut self, route: RouteConfig) -> Self {
        self.config.routes.push(route);
        self
    }

    pub fn build(self) -> RouterConfig {
        self.config
    }
}

impl Default for RouterConfigBuilder {
    fn default() -> Self {
        RouterConfigBuilder::new()
    }
}
