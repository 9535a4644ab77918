use crate::handler::SharedHandler;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;
use thiserror::Error;

pub use routeline_macro::ClassName;

/// A class whose methods can be used as route actions.
///
/// # Behavior
/// Methods are looked up by name at dispatch time. `bind` returns `None` when
/// the controller has no method with that name. A controller that can be
/// invoked directly (a bare class action) exposes it through `entry_point`.
pub trait Controller: Send + Sync + 'static {
    fn bind(self: Arc<Self>, method: &str) -> Option<SharedHandler>;

    fn entry_point(self: Arc<Self>) -> Option<SharedHandler> {
        None
    }
}

/// Stable identifier a controller type is registered under.
pub trait ClassName {
    fn class_name() -> &'static str;
}

/// Errors raised while turning a class identifier into an instance.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Class '{class}' is not registered.")]
    UnknownClass { class: String },

    #[error("Class '{class}' could not be built.")]
    UnsatisfiedDependency {
        class: String,
        #[source]
        source: MissingDependency,
    },
}

impl ResolveError {
    #[inline]
    pub(crate) fn unknown_class(class: impl Into<String>) -> Self {
        Self::UnknownClass {
            class: class.into(),
        }
    }

    #[inline]
    pub(crate) fn unsatisfied_dependency(class: impl Into<String>, source: MissingDependency) -> Self {
        Self::UnsatisfiedDependency {
            class: class.into(),
            source,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No service of type '{type_name}' was provided.")]
pub struct MissingDependency {
    pub type_name: &'static str,
}

/// Strategy that turns class identifiers into controller instances.
pub trait ControllerResolver: Send + Sync {
    fn resolve(&self, class: &str) -> Result<Arc<dyn Controller>, ResolveError>;

    fn contains(&self, class: &str) -> bool;
}

/// Typed services made available to controller factories.
#[derive(Default)]
pub struct Services {
    services: DashMap<TypeId, Arc<dyn Any + Send + Sync>, fnv::FnvBuildHasher>,
}

impl Services {
    pub fn new() -> Self {
        Self {
            services: DashMap::with_hasher(fnv::FnvBuildHasher::default()),
        }
    }

    /// Stores `service`, replacing any previous service of the same type.
    pub fn provide<T>(&self, service: T)
    where
        T: Send + Sync + 'static,
    {
        self.provide_shared(Arc::new(service));
    }

    pub fn provide_shared<T>(&self, service: Arc<T>)
    where
        T: Send + Sync + 'static,
    {
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Fetches the service of type `T`.
    ///
    /// # Errors
    /// [`MissingDependency`] when no service of that type was provided.
    pub fn require<T>(&self) -> Result<Arc<T>, MissingDependency>
    where
        T: Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
            .ok_or(MissingDependency {
                type_name: std::any::type_name::<T>(),
            })
    }

    pub fn contains<T>(&self) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.services.contains_key(&TypeId::of::<T>())
    }
}

type Factory = Arc<dyn Fn(&Services) -> Result<Arc<dyn Controller>, MissingDependency> + Send + Sync>;

#[derive(Clone)]
enum Registration {
    Fresh(Factory),
    Shared(Arc<dyn Controller>),
}

/// Default [`ControllerResolver`] backed by a concurrent class table.
///
/// # Behavior
/// Classes registered with [`ClassRegistry::register`] or
/// [`ClassRegistry::register_factory`] are constructed anew on every
/// resolution. [`ClassRegistry::register_shared`] stores one instance that is
/// handed out to every caller. Registering a name twice replaces the earlier
/// registration.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use routeline::handler::SharedHandler;
/// use routeline::handler::resolver::{ClassName, ClassRegistry, Controller, ControllerResolver};
///
/// #[derive(Default, ClassName)]
/// struct HomeController;
///
/// impl Controller for HomeController {
///     fn bind(self: Arc<Self>, _method: &str) -> Option<SharedHandler> {
///         None
///     }
/// }
///
/// let registry = ClassRegistry::new();
/// registry.register::<HomeController>();
/// assert!(registry.contains("HomeController"));
/// ```
pub struct ClassRegistry {
    classes: DashMap<String, Registration, fnv::FnvBuildHasher>,
    services: Services,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self {
            classes: DashMap::with_hasher(fnv::FnvBuildHasher::default()),
            services: Services::new(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Registers a class that is built with `Default` on every resolution.
    pub fn register<C>(&self)
    where
        C: ClassName + Controller + Default,
    {
        let factory: Factory = Arc::new(|_: &Services| {
            Ok::<_, MissingDependency>(Arc::new(C::default()) as Arc<dyn Controller>)
        });
        self.insert(C::class_name(), Registration::Fresh(factory));
    }

    /// Registers a class whose instances are built from the provided services.
    pub fn register_factory<C, F>(&self, factory: F)
    where
        C: ClassName + Controller,
        F: Fn(&Services) -> Result<C, MissingDependency> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |services: &Services| {
            factory(services).map(|controller| Arc::new(controller) as Arc<dyn Controller>)
        });
        self.insert(C::class_name(), Registration::Fresh(factory));
    }

    /// Registers a single instance shared by every resolution.
    pub fn register_shared<C>(&self, instance: C)
    where
        C: ClassName + Controller,
    {
        self.insert(C::class_name(), Registration::Shared(Arc::new(instance)));
    }

    /// Registers a shared instance under an explicit name.
    pub fn register_named(&self, class: impl Into<String>, instance: Arc<dyn Controller>) {
        self.insert(class, Registration::Shared(instance));
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn insert(&self, class: impl Into<String>, registration: Registration) {
        let class = class.into();
        if self.classes.insert(class.clone(), registration).is_some() {
            log::debug!("Replaced registration for class '{class}'");
        } else {
            log::debug!("Registered class '{class}'");
        }
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerResolver for ClassRegistry {
    fn resolve(&self, class: &str) -> Result<Arc<dyn Controller>, ResolveError> {
        // Clone the registration out so the map guard is released before
        // user code runs.
        let registration = match self.classes.get(class) {
            None => return Err(ResolveError::unknown_class(class)),
            Some(entry) => entry.value().clone(),
        };
        match registration {
            Registration::Shared(instance) => Ok(instance),
            Registration::Fresh(factory) => factory(&self.services)
                .map_err(|source| ResolveError::unsatisfied_dependency(class, source)),
        }
    }

    fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, HandlerError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Default for Counted {
        fn default() -> Self {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Counted
        }
    }

    impl ClassName for Counted {
        fn class_name() -> &'static str {
            "Counted"
        }
    }

    impl Controller for Counted {
        fn bind(self: Arc<Self>, _method: &str) -> Option<SharedHandler> {
            None
        }
    }

    struct Database {
        url: String,
    }

    #[derive(ClassName)]
    #[class(name = "App\\UserController")]
    struct UserController {
        database: Arc<Database>,
    }

    impl Controller for UserController {
        fn bind(self: Arc<Self>, method: &str) -> Option<SharedHandler> {
            let url = self.database.url.clone();
            (method == "show").then(|| {
                handler_fn(move |_request, _response, _params| {
                    let url = url.clone();
                    async move { Ok::<_, HandlerError>(url) }
                })
            })
        }
    }

    #[test]
    fn test_default_registration_builds_fresh_instances() {
        let registry = ClassRegistry::new();
        registry.register::<Counted>();
        let before = BUILT.load(Ordering::SeqCst);
        let first = registry.resolve("Counted").unwrap();
        let second = registry.resolve("Counted").unwrap();
        assert_eq!(BUILT.load(Ordering::SeqCst), before + 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_shared_registration_returns_same_instance() {
        let registry = ClassRegistry::new();
        registry.register_shared(Counted);
        let first = registry.resolve("Counted").unwrap();
        let second = registry.resolve("Counted").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_class() {
        let registry = ClassRegistry::new();
        assert!(!registry.contains("Missing"));
        assert!(matches!(
            registry.resolve("Missing"),
            Err(ResolveError::UnknownClass { class }) if class == "Missing"
        ));
    }

    #[test]
    fn test_factory_reports_missing_dependency() {
        let registry = ClassRegistry::new();
        registry.register_factory::<UserController, _>(|services| {
            Ok(UserController {
                database: services.require::<Database>()?,
            })
        });
        assert!(registry.contains("App\\UserController"));

        match registry.resolve("App\\UserController") {
            Err(ResolveError::UnsatisfiedDependency { class, source }) => {
                assert_eq!(class, "App\\UserController");
                assert!(source.type_name.ends_with("Database"));
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }

        registry.services().provide(Database {
            url: "postgres://localhost".to_string(),
        });
        let controller = registry.resolve("App\\UserController").unwrap();
        assert!(controller.clone().bind("show").is_some());
        assert!(controller.bind("destroy").is_none());
    }

    #[test]
    fn test_services_replace_by_type() {
        let services = Services::new();
        services.provide(1u32);
        services.provide(2u32);
        assert_eq!(*services.require::<u32>().unwrap(), 2);
        assert!(services.contains::<u32>());
        assert!(services.require::<u64>().is_err());
    }
}
