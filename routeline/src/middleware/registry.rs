use crate::middleware::{Middleware, SharedMiddleware};
use dashmap::{DashMap, Entry};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareRegistryError {
    #[error("Middleware with name '{name}' not found.")]
    MissingMiddleware { name: String },

    #[error("Middleware with name '{name}' already exists.")]
    ConflictingMiddlewareName { name: String },
}

impl MiddlewareRegistryError {
    #[inline]
    pub(crate) fn missing_middleware(name: impl Into<String>) -> Self {
        Self::MissingMiddleware { name: name.into() }
    }

    #[inline]
    pub(crate) fn conflicting_middleware_name(name: impl Into<String>) -> Self {
        Self::ConflictingMiddlewareName { name: name.into() }
    }
}

/// Named middleware stages that routes and configuration can refer to.
///
/// Stages are stored under the value returned by [`Middleware::name`].
#[derive(Default)]
pub struct MiddlewareRegistry {
    stages: DashMap<String, SharedMiddleware, fnv::FnvBuildHasher>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self {
            stages: DashMap::with_hasher(fnv::FnvBuildHasher::default()),
        }
    }

    /// Registers a stage under its own name.
    ///
    /// # Errors
    /// [`MiddlewareRegistryError::ConflictingMiddlewareName`] if a stage with
    /// the same name is already registered.
    pub fn register(&self, stage: impl Middleware + 'static) -> Result<(), MiddlewareRegistryError> {
        self.register_shared(Arc::new(stage))
    }

    pub fn register_shared(&self, stage: SharedMiddleware) -> Result<(), MiddlewareRegistryError> {
        let name = stage.name().to_string();
        match self.stages.entry(name.clone()) {
            Entry::Occupied(_) => Err(MiddlewareRegistryError::conflicting_middleware_name(name)),
            Entry::Vacant(entry) => {
                log::debug!("Registered middleware '{name}'");
                entry.insert(stage);
                Ok(())
            }
        }
    }

    pub fn find(&self, name: &str) -> Result<SharedMiddleware, MiddlewareRegistryError> {
        match self.stages.get(name) {
            None => Err(MiddlewareRegistryError::missing_middleware(name)),
            Some(stage) => Ok(stage.value().clone()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
