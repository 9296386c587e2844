//! Shared context handed to every store at construction.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{ConfigError, RuntimeConfig};
use crate::events::{EventStore, StoreId};
use crate::path::ComponentPath;

/// Event sink, component registry and configuration of one application or
/// test run.
///
/// Cloning is cheap; all clones share the same sink and registry.
#[derive(Clone)]
pub struct ComponentRuntime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    events: EventStore,
    graph: ComponentGraph,
    config: RuntimeConfig,
    suppress_global_events: bool,
}

impl ComponentRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self::build(config, false)
    }

    /// Runtime for test replay. Events stay out of the global sink when the
    /// testing config asks for it.
    pub fn for_testing(config: RuntimeConfig) -> Self {
        let suppress = config.testing.suppress_global_events;
        Self::build(config, suppress)
    }

    /// Runtime configured from the user config file.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::new(RuntimeConfig::load()?))
    }

    fn build(config: RuntimeConfig, suppress_global_events: bool) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                events: EventStore::new(config.events.capacity),
                graph: ComponentGraph::default(),
                config,
                suppress_global_events,
            }),
        }
    }

    pub fn events(&self) -> &EventStore {
        &self.inner.events
    }

    pub fn graph(&self) -> &ComponentGraph {
        &self.inner.graph
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn suppresses_global_events(&self) -> bool {
        self.inner.suppress_global_events
    }
}

impl Default for ComponentRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

/// Live stores indexed by path.
///
/// Stores register on construction and unregister on dispose.
#[derive(Default)]
pub struct ComponentGraph {
    stores: RwLock<HashMap<ComponentPath, Vec<StoreId>>>,
}

impl ComponentGraph {
    pub fn register(&self, path: &ComponentPath, id: StoreId) {
        self.stores.write().entry(path.clone()).or_default().push(id);
    }

    pub fn unregister(&self, path: &ComponentPath, id: StoreId) {
        let mut stores = self.stores.write();
        if let Some(ids) = stores.get_mut(path) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                stores.remove(path);
            }
        }
    }

    pub fn contains(&self, path: &ComponentPath) -> bool {
        self.stores.read().contains_key(path)
    }

    /// Number of live stores at `path`.
    pub fn count(&self, path: &ComponentPath) -> usize {
        self.stores.read().get(path).map_or(0, Vec::len)
    }

    pub fn paths(&self) -> Vec<ComponentPath> {
        let mut paths: Vec<ComponentPath> = self.stores.read().keys().cloned().collect();
        paths.sort_by_key(|path| path.string());
        paths
    }
}
