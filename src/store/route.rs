use std::fmt;
use std::sync::{Arc, OnceLock};

use uuid::Uuid;

use super::scope::{Connection, OutputHandler, StateProjection};
use super::ComponentStore;
use crate::component::Component;
use crate::events::Source;
use crate::view_model::ViewModel;

/// Presentable child component carried in a parent's `Route` enum.
///
/// Holds the child's initial state until the parent connects it with
/// [`ComponentStore::connect_route`]; afterwards it reads through to the
/// connected store.
pub struct ComponentRoute<C: Component> {
    id: Uuid,
    initial: C::State,
    connected: Arc<OnceLock<ViewModel<C>>>,
}

impl<C: Component> ComponentRoute<C> {
    pub fn new(state: C::State) -> Self {
        Self {
            id: Uuid::new_v4(),
            initial: state,
            connected: Arc::new(OnceLock::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current child state: live once connected, the initial state before.
    pub fn state(&self) -> C::State {
        match self.connected.get() {
            Some(view_model) => view_model.state(),
            None => self.initial.clone(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get().is_some()
    }

    /// # Panics
    ///
    /// Panics if the presenting component never connected this route.
    pub fn view_model(&self) -> ViewModel<C> {
        match self.connected.get() {
            Some(view_model) => view_model.clone(),
            None => panic!("route to {} used before it was connected", C::name()),
        }
    }

    /// # Panics
    ///
    /// Panics if the presenting component never connected this route.
    pub fn store(&self) -> ComponentStore<C> {
        self.view_model().store().clone()
    }
}

impl<C: Component> Clone for ComponentRoute<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            initial: self.initial.clone(),
            connected: Arc::clone(&self.connected),
        }
    }
}

impl<C: Component> fmt::Debug for ComponentRoute<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRoute")
            .field("component", &C::name())
            .field("state", &self.state())
            .finish()
    }
}

/// Routes compare by child state.
impl<C: Component> PartialEq for ComponentRoute<C> {
    fn eq(&self, other: &Self) -> bool {
        self.state() == other.state()
    }
}

impl<P: Component> ComponentStore<P> {
    /// Connect the child behind a presented route. Call from
    /// [`Component::connect_route`].
    ///
    /// The child starts from the route's initial state and may dismiss
    /// itself with [`ComponentStore::dismiss`].
    pub fn connect_route<C: Component>(
        &self,
        route: &ComponentRoute<C>,
        output: OutputHandler<P, C>,
    ) -> ViewModel<C> {
        let connection = Connection::new(
            format!("route:{}", C::name()),
            StateProjection::initial(route.initial.clone()),
        )
        .output(output)
        .custom_id(route.id.to_string());

        let (key, view_model) = self.connect_keyed(connection);
        {
            let mut routes = self.inner.route_connections.lock();
            if !routes.contains(&key) {
                routes.push(key);
            }
        }

        let parent = Arc::downgrade(&self.inner);
        view_model.store().set_dismiss_handler(Arc::new(move |source: Source| {
            let Some(inner) = parent.upgrade() else {
                return;
            };
            let parent = ComponentStore { inner };
            let store = parent.clone();
            let _ = parent.spawn_tracked(parent.inner.cancel.clone(), async move {
                store.dismiss_route_at(source).await
            });
        }));

        let _ = route.connected.set(view_model.clone());
        view_model
    }
}
