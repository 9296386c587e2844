//! View-facing facade over a store.

use std::fmt::{self, Debug};
use std::future::Future;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::component::Component;
use crate::events::{Event, Source};
use crate::key_path::KeyPath;
use crate::runtime::ComponentRuntime;
use crate::store::{ComponentStore, Connection};

/// What a view layer holds: state reads, dispatch entry points and a state
/// change feed. Cloning shares the underlying store.
pub struct ViewModel<C: Component> {
    store: ComponentStore<C>,
}

impl<C: Component> ViewModel<C> {
    pub fn new(store: ComponentStore<C>) -> Self {
        Self { store }
    }

    /// View model over a fresh root store.
    pub fn root(state: C::State, runtime: &ComponentRuntime) -> Self {
        Self::new(ComponentStore::new(state, runtime))
    }

    pub fn store(&self) -> &ComponentStore<C> {
        &self.store
    }

    pub fn state(&self) -> C::State {
        self.store.state()
    }

    pub fn read<R>(&self, f: impl FnOnce(&C::State) -> R) -> R {
        self.store.read(f)
    }

    /// Read one field.
    pub fn get<V: 'static>(&self, key_path: &KeyPath<C::State, V>) -> V {
        self.store.read(|state| key_path.get(state))
    }

    pub fn route(&self) -> Option<C::Route> {
        self.store.route()
    }

    /// Receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<C::State> {
        self.store.subscribe_state()
    }

    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.store.events()
    }

    #[track_caller]
    pub fn send(&self, action: C::Action) -> JoinHandle<()> {
        self.store.send(action)
    }

    #[track_caller]
    pub fn send_and_wait(&self, action: C::Action) -> impl Future<Output = ()> + Send + '_ {
        self.store.process_action(action)
    }

    pub fn binding<V>(&self, key_path: &KeyPath<C::State, V>) -> Binding<C, V>
    where
        V: Clone + PartialEq + Debug + Send + Sync + 'static,
    {
        self.store.binding(key_path)
    }

    #[track_caller]
    pub fn set_binding<V>(
        &self,
        key_path: &KeyPath<C::State, V>,
        value: V,
    ) -> impl Future<Output = ()> + Send + '_
    where
        V: Clone + PartialEq + Debug + Send + Sync + 'static,
    {
        self.store.set_binding(key_path, value)
    }

    #[track_caller]
    pub fn appear(&self, first: bool) -> JoinHandle<()> {
        self.store.appear(first)
    }

    #[track_caller]
    pub fn disappear(&self) -> impl Future<Output = ()> + Send + '_ {
        self.store.disappear()
    }

    /// Record a render of this view model's state.
    #[track_caller]
    pub fn body(&self) {
        self.store.record_body()
    }

    pub fn connect<Child: Component>(&self, connection: Connection<C, Child>) -> ViewModel<Child> {
        self.store.connect(connection)
    }

    pub fn dispose(&self) {
        self.store.dispose()
    }
}

impl<C: Component> Clone for ViewModel<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<C: Component> fmt::Debug for ViewModel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("path", self.store.path())
            .field("state", &self.store.state())
            .finish()
    }
}

/// Get/set pair for one state field, as handed to a text field or toggle.
pub struct Binding<C: Component, V> {
    store: ComponentStore<C>,
    key_path: KeyPath<C::State, V>,
}

impl<C, V> Binding<C, V>
where
    C: Component,
    V: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    pub(crate) fn new(store: ComponentStore<C>, key_path: KeyPath<C::State, V>) -> Self {
        Self { store, key_path }
    }

    pub fn name(&self) -> &str {
        self.key_path.name()
    }

    pub fn get(&self) -> V {
        self.store.read(|state| self.key_path.get(state))
    }

    /// Write in the background; see [`ComponentStore::set_binding`].
    #[track_caller]
    pub fn set(&self, value: V) -> JoinHandle<()> {
        let source = Source::capture();
        let store = self.store.clone();
        let key_path = self.key_path.clone();
        self.store.spawn_tracked(self.store.cancel_token(), async move {
            store.set_binding_at(key_path, value, source).await
        })
    }
}

impl<C: Component, V> Clone for Binding<C, V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key_path: self.key_path.clone(),
        }
    }
}
