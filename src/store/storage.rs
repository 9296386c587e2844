use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

type Updater<S> = Arc<dyn Fn(&mut dyn FnMut(&mut S)) + Send + Sync>;

/// Get/set pair into state owned elsewhere.
pub struct StateBinding<S> {
    get: Arc<dyn Fn() -> S + Send + Sync>,
    set: Arc<dyn Fn(S) + Send + Sync>,
    update: Option<Updater<S>>,
}

impl<S> StateBinding<S> {
    pub fn new(
        get: impl Fn() -> S + Send + Sync + 'static,
        set: impl Fn(S) + Send + Sync + 'static,
    ) -> Self {
        Self {
            get: Arc::new(get),
            set: Arc::new(set),
            update: None,
        }
    }

    /// Route read-modify-write through `update`, which must hand the
    /// current value to its argument exactly once while holding the
    /// owner's lock.
    pub(crate) fn with_update(
        mut self,
        update: impl Fn(&mut dyn FnMut(&mut S)) + Send + Sync + 'static,
    ) -> Self {
        self.update = Some(Arc::new(update));
        self
    }

    pub fn get(&self) -> S {
        (self.get)()
    }

    pub fn set(&self, value: S) {
        (self.set)(value)
    }

    /// Apply `f` to the bound value and write it back. Atomic when the
    /// owner installed an updater; a plain get then set otherwise.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut f = Some(f);
        if let Some(update) = &self.update {
            let mut output = None;
            update(&mut |value: &mut S| {
                if let Some(f) = f.take() {
                    output = Some(f(value));
                }
            });
            if let Some(output) = output {
                return output;
            }
        }
        match f {
            Some(f) => {
                let mut value = self.get();
                let output = f(&mut value);
                self.set(value);
                output
            }
            None => unreachable!("state updater consumed the write without a result"),
        }
    }
}

impl<S> Clone for StateBinding<S> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
            update: self.update.clone(),
        }
    }
}

impl<S> fmt::Debug for StateBinding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateBinding")
    }
}

/// Where a store's state lives.
///
/// Root stores own their state. Scoped stores hold a binding into exactly
/// one parent field and never keep a divergent copy.
pub(crate) enum StateStorage<S> {
    Root(RwLock<S>),
    Binding(StateBinding<S>),
}

impl<S: Clone> StateStorage<S> {
    pub(crate) fn root(state: S) -> Self {
        StateStorage::Root(RwLock::new(state))
    }

    pub(crate) fn get(&self) -> S {
        match self {
            StateStorage::Root(state) => state.read().clone(),
            StateStorage::Binding(binding) => binding.get(),
        }
    }

    pub(crate) fn set(&self, value: S) {
        match self {
            StateStorage::Root(state) => *state.write() = value,
            StateStorage::Binding(binding) => binding.set(value),
        }
    }

    /// Read-modify-write under one lock of the state's owner.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        match self {
            StateStorage::Root(state) => f(&mut state.write()),
            StateStorage::Binding(binding) => binding.update(f),
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        match self {
            StateStorage::Root(state) => f(&state.read()),
            StateStorage::Binding(binding) => f(&binding.get()),
        }
    }

    pub(crate) fn is_binding(&self) -> bool {
        matches!(self, StateStorage::Binding(_))
    }
}
