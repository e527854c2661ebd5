//! Handler registration: maps a task `kind` tag to the computation that
//! services it.
//!
//! The registry is assembled before pool construction and frozen behind an
//! `Arc` for the pool's lifetime. One payload type `P` and one value type `V`
//! apply pool-wide; the `kind` string picks the handler.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::HandlerError;

/// Computation servicing one task kind.
pub type Handler<P, V> = dyn Fn(P) -> std::result::Result<V, HandlerError> + Send + Sync;

/// Table of registered task handlers, keyed by kind.
pub struct HandlerRegistry<P, V> {
    handlers: HashMap<String, Arc<Handler<P, V>>>,
}

impl<P, V> HandlerRegistry<P, V> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `kind`. Re-registering a kind replaces the
    /// previous handler.
    pub fn register<K, F>(&mut self, kind: K, handler: F)
    where
        K: Into<String>,
        F: Fn(P) -> std::result::Result<V, HandlerError> + Send + Sync + 'static,
    {
        self.handlers.insert(kind.into(), Arc::new(handler));
    }

    /// Chaining form of [`register`](Self::register) for building a registry
    /// in one expression.
    pub fn with<K, F>(mut self, kind: K, handler: F) -> Self
    where
        K: Into<String>,
        F: Fn(P) -> std::result::Result<V, HandlerError> + Send + Sync + 'static,
    {
        self.register(kind, handler);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<Handler<P, V>>> {
        self.handlers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, in no particular order.
    pub fn kinds(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<P, V> Default for HandlerRegistry<P, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, V> fmt::Debug for HandlerRegistry<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds = self.kinds();
        kinds.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_dispatch() {
        let mut registry: HandlerRegistry<i64, i64> = HandlerRegistry::new();
        registry.register("double", |p| Ok(p * 2));

        let handler = registry.get("double").unwrap();
        assert_eq!(handler(21).unwrap(), 42);
        assert!(registry.get("halve").is_none());
    }

    #[test]
    fn test_chaining_builds_full_table() {
        let registry: HandlerRegistry<i64, i64> = HandlerRegistry::new()
            .with("double", |p| Ok(p * 2))
            .with("square", |p| Ok(p * p));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("double"));
        assert!(registry.contains("square"));
    }

    #[test]
    fn test_reregistering_replaces() {
        let registry: HandlerRegistry<i64, i64> = HandlerRegistry::new()
            .with("op", |p| Ok(p + 1))
            .with("op", |p| Ok(p + 2));

        assert_eq!(registry.len(), 1);
        let handler = registry.get("op").unwrap();
        assert_eq!(handler(0).unwrap(), 2);
    }

    #[test]
    fn test_handler_errors_propagate() {
        let registry: HandlerRegistry<i64, i64> =
            HandlerRegistry::new().with("checked", |p| {
                if p < 0 {
                    Err("negative payload".into())
                } else {
                    Ok(p)
                }
            });

        let handler = registry.get("checked").unwrap();
        assert!(handler(-1).is_err());
        assert_eq!(handler(7).unwrap(), 7);
    }
}
