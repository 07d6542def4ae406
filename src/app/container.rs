//! Typed service container.
//!
//! One value per type, shared as `Arc<T>`. Controller factories receive the
//! container so they can pull their dependencies when a route instantiates
//! them.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

#[derive(Default)]
pub struct Container {
    services: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value`, returning the service it replaced.
    pub fn provide<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
        self.provide_arc(Arc::new(value))
    }

    pub fn provide_arc<T: Any + Send + Sync>(&self, value: Arc<T>) -> Option<Arc<T>> {
        self.services
            .insert(TypeId::of::<T>(), value)
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    pub fn resolve<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    pub fn has<T: Any + Send + Sync>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.services
            .remove(&TypeId::of::<T>())
            .and_then(|(_, service)| service.downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.services.len())
            .finish()
    }
}
