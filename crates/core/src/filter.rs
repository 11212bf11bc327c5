//! Event filters.
//!
//! The filter expression language lives with the bot; the bridge only looks
//! filters up by name and asks them for a verdict.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A compiled filter.
pub trait EventFilter: Send + Sync {
    /// `true` when the event should be delivered.
    fn eval(&self, event: &Value) -> bool;
}

impl<F> EventFilter for F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn eval(&self, event: &Value) -> bool {
        self(event)
    }
}

/// Name → filter lookup. An unknown name is not an error.
pub trait FilterRegistry: Send + Sync {
    fn find(&self, name: &str) -> Option<Arc<dyn EventFilter>>;
}

/// An in-memory registry of named filters.
#[derive(Default)]
pub struct FilterSet {
    filters: RwLock<HashMap<String, Arc<dyn EventFilter>>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter. Replaces any existing filter with the same name.
    pub fn register(&self, name: impl Into<String>, filter: Arc<dyn EventFilter>) {
        self.filters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), filter);
    }

    pub fn len(&self) -> usize {
        self.filters.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FilterRegistry for FilterSet {
    fn find(&self, name: &str) -> Option<Arc<dyn EventFilter>> {
        self.filters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}
