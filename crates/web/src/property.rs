//! A typed key/value bag attached to every [`Request`](crate::Request).
//!
//! Middlewares use it to hand derived facts (decoded credentials, a session id) to
//! the handlers after them without widening the request type.
//!
//! ```
//! use cex_web::property::{Property, PropertyStore};
//!
//! let mut store = PropertyStore::new();
//! store.set("retries", 3);
//! store.set("retries", "many");
//!
//! assert_eq!(store.get_integer("retries"), None);
//! assert_eq!(store.get_str("retries"), Some("many"));
//! assert!(matches!(store.remove("retries"), Some(Property::String(_))));
//! assert!(!store.has("retries"));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// A single property value.
#[derive(Clone)]
pub enum Property {
    String(String),
    Integer(i64),
    Float(f64),
    /// A weak reference to an object owned elsewhere.
    ///
    /// The store never keeps the object alive: once its owner drops the last
    /// `Arc`, [`PropertyStore::get_handle`] returns `None`.
    Handle(Weak<dyn Any + Send + Sync>),
}

impl Property {
    /// Creates a handle property from a shared object without taking ownership of it.
    pub fn handle<T: Any + Send + Sync>(object: &Arc<T>) -> Self {
        let object: Arc<dyn Any + Send + Sync> = Arc::<T>::clone(object);
        Self::Handle(Arc::downgrade(&object))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Property::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Property::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::String(value) => f.debug_tuple("String").field(value).finish(),
            Property::Integer(value) => f.debug_tuple("Integer").field(value).finish(),
            Property::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Property::Handle(handle) => f.debug_tuple("Handle").field(&(handle.strong_count() > 0)).finish(),
        }
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Property::String(value)
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Property::String(value.to_owned())
    }
}

impl From<i64> for Property {
    fn from(value: i64) -> Self {
        Property::Integer(value)
    }
}

impl From<i32> for Property {
    fn from(value: i32) -> Self {
        Property::Integer(i64::from(value))
    }
}

impl From<f64> for Property {
    fn from(value: f64) -> Self {
        Property::Float(value)
    }
}

/// Per-request properties keyed by name.
///
/// `set` always overwrites, even when the previous value had a different type.
#[derive(Debug, Default, Clone)]
pub struct PropertyStore {
    inner: HashMap<String, Property>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Property>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.inner.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Property::as_str)
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Property::as_integer)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Property::as_float)
    }

    /// Resolves a handle property to its object, if it is still alive and of type `T`.
    pub fn get_handle<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        match self.get(key)? {
            Property::Handle(handle) => handle.upgrade()?.downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Property> {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
