//! Shared state for handlers.
//!
//! Shared state is the set of long-lived services (caches, database pools,
//! metric sinks) that handlers reference. Each service type is registered in
//! a [`StateRegistry`] with a factory that receives the application
//! configuration; the server runs every factory once at startup and keeps
//! the results in a [`SharedState`]. A factory that returns `None` omits the
//! service, which is only an error if some route needs it.
//!
//! Handlers declare the subset they need as their [`FromSharedState`] type,
//! using [`Shared<T>`] for each service:
//!
//! ```rust
//! use fathom_core::state::{FromSharedState, Shared, StateRegistry};
//!
//! struct AppConfig {
//!     cache_enabled: bool,
//! }
//!
//! #[derive(Default)]
//! struct Cache;
//! struct Database {
//!     url: String,
//! }
//!
//! let mut registry = StateRegistry::<AppConfig>::new();
//! registry.register(|config: &AppConfig| config.cache_enabled.then_some(Cache));
//! registry.register(|_: &AppConfig| Some(Database { url: "sqlite::memory:".into() }));
//!
//! let state = registry.initialize(&AppConfig { cache_enabled: false });
//! assert!(state.contains::<Database>());
//! assert!(!state.contains::<Cache>());
//!
//! let db = <Shared<Database>>::from_shared_state(&state).unwrap();
//! assert_eq!(db.url, "sqlite::memory:");
//! assert!(<(Shared<Database>, Shared<Cache>)>::from_shared_state(&state).is_err());
//! ```

use crate::StateError;
use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Service instances built at startup, keyed by type.
///
/// The collection is `Send + Sync` and shared by every worker. Services are
/// handed out as `Arc`s, so every handler sees the same instance; services
/// are responsible for their own interior synchronization.
#[derive(Default)]
pub struct SharedState {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    omitted: HashSet<TypeId>,
}

impl SharedState {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a service instance.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.omitted.remove(&TypeId::of::<T>());
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Records that a service's factory returned no value.
    pub fn mark_omitted<T: 'static>(&mut self) {
        if !self.services.contains_key(&TypeId::of::<T>()) {
            self.omitted.insert(TypeId::of::<T>());
        }
    }

    /// Returns a service instance.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|s| s.clone().downcast::<T>().ok())
    }

    /// Returns a service instance or an error naming the type.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, StateError> {
        self.get().ok_or_else(|| self.missing(TypeId::of::<T>(), type_name::<T>()))
    }

    /// Checks that a requirement is satisfied.
    pub fn check(&self, requirement: &StateRequirement) -> Result<(), StateError> {
        if self.services.contains_key(&requirement.type_id) {
            Ok(())
        } else {
            Err(self.missing(requirement.type_id, requirement.type_name))
        }
    }

    fn missing(&self, type_id: TypeId, type_name: &'static str) -> StateError {
        if self.omitted.contains(&type_id) {
            StateError::Omitted { type_name }
        } else {
            StateError::NotRegistered { type_name }
        }
    }

    /// Checks if a service is present.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of services present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("service_count", &self.services.len())
            .field("omitted_count", &self.omitted.len())
            .finish()
    }
}

type Factory<C> = Box<dyn Fn(&C, &mut SharedState) + Send + Sync>;

/// Ordered list of shared-state factories.
///
/// Generic over the application configuration type `C`.
pub struct StateRegistry<C> {
    factories: Vec<(&'static str, Factory<C>)>,
}

impl<C> Default for StateRegistry<C> {
    fn default() -> Self {
        Self {
            factories: Vec::new(),
        }
    }
}

impl<C: 'static> StateRegistry<C> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for `T`.
    ///
    /// The factory runs once at startup. Returning `None` omits the service.
    pub fn register<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&C) -> Option<T> + Send + Sync + 'static,
    {
        let name = type_name::<T>();
        let factory: Factory<C> = Box::new(move |config: &C, state: &mut SharedState| {
            match factory(config) {
                Some(service) => {
                    debug!(service = name, "Shared state initialized");
                    state.insert(Arc::new(service));
                }
                None => {
                    debug!(service = name, "Shared state factory returned no value; omitting");
                    state.mark_omitted::<T>();
                }
            }
        });
        self.factories.push((name, factory));
        self
    }

    /// Registers `T::default()` as the service, ignoring the configuration.
    pub fn register_default<T>(&mut self) -> &mut Self
    where
        T: Default + Send + Sync + 'static,
    {
        self.register(|_: &C| {
            warn!(
                service = type_name::<T>(),
                "Using default-constructed shared state; configuration is not consulted"
            );
            Some(T::default())
        })
    }

    /// Registers an already-built service instance.
    pub fn register_instance<T>(&mut self, service: Arc<T>) -> &mut Self
    where
        T: Send + Sync + 'static,
    {
        let factory: Factory<C> = Box::new(move |_: &C, state: &mut SharedState| {
            state.insert(Arc::clone(&service));
        });
        self.factories.push((type_name::<T>(), factory));
        self
    }

    /// Runs every factory in registration order.
    #[must_use]
    pub fn initialize(&self, config: &C) -> SharedState {
        let mut state = SharedState::new();
        for (_, factory) in &self.factories {
            factory(config, &mut state);
        }
        state
    }

    /// Returns the number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no factories are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<C> fmt::Debug for StateRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRegistry")
            .field(
                "factories",
                &self.factories.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// One shared-state type a handler depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRequirement {
    /// Type identity.
    pub type_id: TypeId,
    /// Type name, for error messages.
    pub type_name: &'static str,
}

impl StateRequirement {
    /// Creates the requirement for `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }
}

/// A handle to one shared-state service.
///
/// Dereferences to the service. Cloning shares the same instance.
pub struct Shared<T>(Arc<T>);

impl<T> Shared<T> {
    /// Wraps a service instance.
    pub fn new(inner: Arc<T>) -> Self {
        Self(inner)
    }

    /// Returns the underlying `Arc`.
    pub fn arc(&self) -> &Arc<T> {
        &self.0
    }

    /// Converts into the inner `Arc`.
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }

    /// Returns `true` if both handles point at the same instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> std::ops::Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&self.0).finish()
    }
}

/// A filtered view of shared state requested by a handler.
///
/// Implemented for `()`, [`Shared<T>`], `Option<Shared<T>>` and tuples of
/// up to eight of these.
pub trait FromSharedState: Sized + Send + 'static {
    /// Types that must be present for [`from_shared_state`](Self::from_shared_state) to succeed.
    fn requirements() -> Vec<StateRequirement>;

    /// Resolves the view.
    fn from_shared_state(state: &SharedState) -> Result<Self, StateError>;
}

impl FromSharedState for () {
    fn requirements() -> Vec<StateRequirement> {
        Vec::new()
    }

    fn from_shared_state(_state: &SharedState) -> Result<Self, StateError> {
        Ok(())
    }
}

impl<T: Send + Sync + 'static> FromSharedState for Shared<T> {
    fn requirements() -> Vec<StateRequirement> {
        vec![StateRequirement::of::<T>()]
    }

    fn from_shared_state(state: &SharedState) -> Result<Self, StateError> {
        state.require::<T>().map(Shared)
    }
}

impl<T: Send + Sync + 'static> FromSharedState for Option<Shared<T>> {
    fn requirements() -> Vec<StateRequirement> {
        Vec::new()
    }

    fn from_shared_state(state: &SharedState) -> Result<Self, StateError> {
        Ok(state.get::<T>().map(Shared))
    }
}

macro_rules! impl_from_shared_state_tuple {
    ($($name:ident),+) => {
        impl<$($name: FromSharedState),+> FromSharedState for ($($name,)+) {
            fn requirements() -> Vec<StateRequirement> {
                let mut requirements = Vec::new();
                $(requirements.extend($name::requirements());)+
                requirements
            }

            fn from_shared_state(state: &SharedState) -> Result<Self, StateError> {
                Ok(($($name::from_shared_state(state)?,)+))
            }
        }
    };
}

impl_from_shared_state_tuple!(A);
impl_from_shared_state_tuple!(A, B);
impl_from_shared_state_tuple!(A, B, C);
impl_from_shared_state_tuple!(A, B, C, D);
impl_from_shared_state_tuple!(A, B, C, D, E);
impl_from_shared_state_tuple!(A, B, C, D, E, F);
impl_from_shared_state_tuple!(A, B, C, D, E, F, G);
impl_from_shared_state_tuple!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestService {
        value: String,
    }

    #[derive(Debug, Default)]
    struct Counter;

    struct Config {
        name: &'static str,
        with_counter: bool,
    }

    fn registry() -> StateRegistry<Config> {
        let mut registry = StateRegistry::new();
        registry
            .register(|config: &Config| {
                Some(TestService {
                    value: config.name.to_string(),
                })
            })
            .register(|config: &Config| config.with_counter.then_some(Counter));
        registry
    }

    #[test]
    fn test_initialize_runs_factories_with_config() {
        let state = registry().initialize(&Config {
            name: "hello",
            with_counter: true,
        });
        assert_eq!(state.len(), 2);
        assert_eq!(state.get::<TestService>().unwrap().value, "hello");
    }

    #[test]
    fn test_absent_factory_omits_service() {
        let state = registry().initialize(&Config {
            name: "x",
            with_counter: false,
        });
        assert!(!state.contains::<Counter>());
        assert_eq!(
            state.require::<Counter>().unwrap_err(),
            StateError::Omitted {
                type_name: type_name::<Counter>()
            }
        );
    }

    #[test]
    fn test_unregistered_type() {
        let state = SharedState::new();
        let err = state.check(&StateRequirement::of::<TestService>()).unwrap_err();
        assert!(matches!(err, StateError::NotRegistered { .. }));
        assert!(err.to_string().contains("TestService"));
    }

    #[test]
    fn test_register_default() {
        let mut registry = StateRegistry::<()>::new();
        registry.register_default::<Counter>();
        let state = registry.initialize(&());
        assert!(state.contains::<Counter>());
    }

    #[test]
    fn test_views_preserve_identity() {
        let state = registry().initialize(&Config {
            name: "shared",
            with_counter: true,
        });
        let (a, _) = <(Shared<TestService>, Shared<Counter>)>::from_shared_state(&state).unwrap();
        let b = <Shared<TestService>>::from_shared_state(&state).unwrap();
        assert!(Shared::ptr_eq(&a, &b));
        assert_eq!(a.value, "shared");
    }

    #[test]
    fn test_tuple_requirements() {
        let requirements = <(Shared<TestService>, Option<Shared<Counter>>, ())>::requirements();
        assert_eq!(requirements, vec![StateRequirement::of::<TestService>()]);
    }

    #[test]
    fn test_optional_view() {
        let state = SharedState::new();
        let view = <Option<Shared<Counter>>>::from_shared_state(&state).unwrap();
        assert!(view.is_none());
    }

    #[test]
    fn test_register_instance_shares_arc() {
        let service = Arc::new(TestService {
            value: "instance".into(),
        });
        let mut registry = StateRegistry::<()>::new();
        registry.register_instance(Arc::clone(&service));
        let state = registry.initialize(&());
        assert!(Arc::ptr_eq(&state.get::<TestService>().unwrap(), &service));
    }

    #[test]
    fn test_shared_state_debug() {
        let debug = format!("{:?}", SharedState::new());
        assert!(debug.contains("service_count"));
    }
}
