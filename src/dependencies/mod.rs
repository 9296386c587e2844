//! Scoped, overridable environment dependencies.
//!
//! A [`Dependencies`] container is created per store. Scoped stores merge
//! their parent's container so overrides flow down the tree, and every read
//! is recorded so the test engine can flag dependencies a test used without
//! controlling.

mod values;

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

pub use values::{Clock, Now, UuidGenerator};

/// Which flavour of default value an unset dependency resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyContext {
    #[default]
    Live,
    Preview,
    Test,
}

/// Declares a dependency and its default values.
pub trait DependencyKey: 'static {
    type Value: Clone + Send + Sync + 'static;

    /// Name used in coverage and test warnings.
    const NAME: &'static str;

    fn live_value() -> Self::Value;

    fn preview_value() -> Self::Value {
        Self::live_value()
    }

    fn test_value() -> Self::Value {
        Self::live_value()
    }
}

/// Thread-safe dependency bag with access and override tracking.
#[derive(Clone, Default)]
pub struct Dependencies {
    inner: Arc<Mutex<DependencyValues>>,
}

#[derive(Default)]
struct DependencyValues {
    context: DependencyContext,
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    overridden: BTreeSet<&'static str>,
    accessed: BTreeSet<&'static str>,
    parent: Option<Dependencies>,
}

impl Dependencies {
    pub fn new(context: DependencyContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DependencyValues {
                context,
                ..DependencyValues::default()
            })),
        }
    }

    pub fn context(&self) -> DependencyContext {
        self.inner.lock().context
    }

    /// Read a dependency, recording the access.
    ///
    /// Unset dependencies resolve through the merged parent, then to the
    /// default for this container's context. The resolved default is kept
    /// so later reads observe the same instance.
    pub fn get<K: DependencyKey>(&self) -> K::Value {
        self.record_access(K::NAME);

        if let Some(value) = self.lookup::<K>() {
            return value;
        }

        let mut values = self.inner.lock();
        let value = match values.context {
            DependencyContext::Live => K::live_value(),
            DependencyContext::Preview => K::preview_value(),
            DependencyContext::Test => K::test_value(),
        };
        values
            .values
            .insert(TypeId::of::<K>(), Arc::new(value.clone()));
        value
    }

    /// Override a dependency.
    pub fn set<K: DependencyKey>(&self, value: K::Value) {
        let mut values = self.inner.lock();
        values.values.insert(TypeId::of::<K>(), Arc::new(value));
        values.overridden.insert(K::NAME);
        tracing::trace!(dependency = K::NAME, "Dependency overridden");
    }

    /// Absorb a parent's values and overrides; reads made here are also
    /// recorded on the parent.
    pub fn merge(&self, parent: &Dependencies) {
        if Arc::ptr_eq(&self.inner, &parent.inner) {
            return;
        }
        let (parent_values, parent_overridden, parent_context) = {
            let parent = parent.inner.lock();
            (
                parent.values.clone(),
                parent.overridden.clone(),
                parent.context,
            )
        };

        let mut values = self.inner.lock();
        for (key, value) in parent_values {
            values.values.entry(key).or_insert(value);
        }
        values.overridden.extend(parent_overridden);
        values.context = parent_context;
        values.parent = Some(parent.clone());
    }

    /// Forget all values and tracking, keeping the context and parent link.
    pub fn reset(&self) {
        let mut values = self.inner.lock();
        values.values.clear();
        values.overridden.clear();
        values.accessed.clear();
    }

    pub fn accessed(&self) -> BTreeSet<&'static str> {
        self.inner.lock().accessed.clone()
    }

    pub fn overridden(&self) -> BTreeSet<&'static str> {
        self.inner.lock().overridden.clone()
    }

    /// Dependencies that were read but never explicitly set.
    pub fn uncontrolled(&self) -> BTreeSet<&'static str> {
        let values = self.inner.lock();
        values
            .accessed
            .difference(&values.overridden)
            .copied()
            .collect()
    }

    pub fn is_overridden(&self, name: &str) -> bool {
        self.inner.lock().overridden.contains(name)
    }

    fn lookup<K: DependencyKey>(&self) -> Option<K::Value> {
        let parent = {
            let values = self.inner.lock();
            if let Some(value) = values.values.get(&TypeId::of::<K>()) {
                return value.downcast_ref::<K::Value>().cloned();
            }
            values.parent.clone()
        };
        let value = parent?.lookup::<K>()?;
        self.inner
            .lock()
            .values
            .insert(TypeId::of::<K>(), Arc::new(value.clone()));
        Some(value)
    }

    fn record_access(&self, name: &'static str) {
        let parent = {
            let mut values = self.inner.lock();
            values.accessed.insert(name);
            values.parent.clone()
        };
        if let Some(parent) = parent {
            parent.record_access(name);
        }
    }
}
