use crate::handler::resolver::{Controller, ControllerResolver, ResolveError};
use crate::handler::SharedHandler;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use thiserror::Error;

/// Method used when a bare class exposes no entry point.
pub const DEFAULT_METHOD: &str = "index";

/// What a route runs when it matches.
///
/// # Behavior
/// Actions are classified once, when the route is registered:
/// - a handler value becomes [`Action::Invocable`];
/// - a `(class, method)` pair becomes [`Action::ClassMethodPair`];
/// - a string containing `@` after at least one character, such as
///   `"UserController@show"`, becomes [`Action::ClassMethodString`] split at
///   the first `@`;
/// - any other non-empty string is a bare class name ([`Action::ClassOnly`]);
/// - an empty string or one starting with `@` is [`Action::Unsupported`].
#[derive(Clone)]
pub enum Action {
    Invocable(SharedHandler),
    ClassMethodPair { class: String, method: String },
    ClassMethodString { class: String, method: String },
    ClassOnly(String),
    Unsupported(String),
}

impl Action {
    /// Classifies a textual action reference.
    pub fn classify(reference: &str) -> Self {
        match reference.find('@') {
            Some(0) => Action::Unsupported(reference.to_string()),
            Some(index) => Action::ClassMethodString {
                class: reference[..index].to_string(),
                method: reference[index + 1..].to_string(),
            },
            None if reference.is_empty() => Action::Unsupported(String::new()),
            None => Action::ClassOnly(reference.to_string()),
        }
    }

    pub fn pair(class: impl Into<String>, method: impl Into<String>) -> Self {
        Action::ClassMethodPair {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Short name of the variant, used in route listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Invocable(_) => "invocable",
            Action::ClassMethodPair { .. } => "class_method_pair",
            Action::ClassMethodString { .. } => "class_method_string",
            Action::ClassOnly(_) => "class_only",
            Action::Unsupported(_) => "unsupported",
        }
    }

    /// Human readable reference, `None` for closures.
    pub fn label(&self) -> Option<String> {
        match self {
            Action::Invocable(_) => None,
            Action::ClassMethodPair { class, method } => Some(format!("{class}::{method}")),
            Action::ClassMethodString { class, method } => Some(format!("{class}@{method}")),
            Action::ClassOnly(class) => Some(class.clone()),
            Action::Unsupported(reference) => Some(reference.clone()),
        }
    }
}

impl Debug for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.label() {
            Some(label) => write!(f, "Action::{}({:?})", self.kind(), label),
            None => write!(f, "Action::{}", self.kind()),
        }
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        Action::classify(value)
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        Action::classify(&value)
    }
}

impl From<(&str, &str)> for Action {
    fn from((class, method): (&str, &str)) -> Self {
        Action::pair(class, method)
    }
}

impl From<(String, String)> for Action {
    fn from((class, method): (String, String)) -> Self {
        Action::pair(class, method)
    }
}

impl From<SharedHandler> for Action {
    fn from(value: SharedHandler) -> Self {
        Action::Invocable(value)
    }
}

/// Raised when a class-based action cannot be turned into a handler.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Class '{class}' could not be found.")]
    UnknownClass { class: String },

    #[error("Class '{class}' has no method '{method}'.")]
    MissingMethod { class: String, method: String },

    #[error("Class '{class}' is neither invocable nor exposes an '{}' method.", DEFAULT_METHOD)]
    NoEntryPoint { class: String },

    #[error("Class '{class}' could not be resolved.")]
    Resolve {
        class: String,
        #[source]
        source: ResolveError,
    },
}

impl ActionError {
    #[inline]
    pub(crate) fn missing_method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MissingMethod {
            class: class.into(),
            method: method.into(),
        }
    }

    #[inline]
    pub(crate) fn no_entry_point(class: impl Into<String>) -> Self {
        Self::NoEntryPoint {
            class: class.into(),
        }
    }

    #[inline]
    pub(crate) fn resolve(class: impl Into<String>, source: ResolveError) -> Self {
        match source {
            ResolveError::UnknownClass { class } => Self::UnknownClass { class },
            source => Self::Resolve {
                class: class.into(),
                source,
            },
        }
    }
}

/// Turns stored actions into handlers using a [`ControllerResolver`].
#[derive(Clone)]
pub struct ActionResolver {
    resolver: Arc<dyn ControllerResolver>,
}

impl ActionResolver {
    pub fn new(resolver: Arc<dyn ControllerResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<dyn ControllerResolver> {
        &self.resolver
    }

    /// Produces the handler for `action`.
    ///
    /// # Returns
    /// - `Ok(Some(handler))` when the action yields a handler.
    /// - `Ok(None)` for [`Action::Unsupported`]; this is not an error.
    ///
    /// # Errors
    /// [`ActionError`] when the class is unknown, cannot be built, or lacks
    /// the requested method or an entry point.
    pub fn resolve(&self, action: &Action) -> Result<Option<SharedHandler>, ActionError> {
        match action {
            Action::Invocable(handler) => Ok(Some(handler.clone())),
            Action::ClassMethodPair { class, method }
            | Action::ClassMethodString { class, method } => {
                let instance = self.instantiate(class)?;
                instance
                    .bind(method)
                    .map(Some)
                    .ok_or_else(|| ActionError::missing_method(class, method))
            }
            Action::ClassOnly(class) => {
                let instance = self.instantiate(class)?;
                if let Some(handler) = instance.clone().entry_point() {
                    return Ok(Some(handler));
                }
                log::trace!("Class '{class}' is not invocable, trying '{DEFAULT_METHOD}'");
                instance
                    .bind(DEFAULT_METHOD)
                    .map(Some)
                    .ok_or_else(|| ActionError::no_entry_point(class))
            }
            Action::Unsupported(reference) => {
                log::debug!("Action '{reference}' has no handler");
                Ok(None)
            }
        }
    }

    fn instantiate(&self, class: &str) -> Result<Arc<dyn Controller>, ActionError> {
        self.resolver
            .resolve(class)
            .map_err(|source| ActionError::resolve(class, source))
    }
}
