//! Deriving child stores from a parent.
//!
//! A [`Connection`] says where a child's state lives ([`StateProjection`]),
//! what happens to its output ([`OutputHandler`]) and how its dependencies
//! differ from the parent's. Resolved children are cached per parent under
//! a structural key, so resolving the same connection twice yields the same
//! store.

use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use uuid::Uuid;

use super::storage::{StateBinding, StateStorage};
use super::{ComponentStore, EventForwarder, StateObserver, StoreInner, StoreParts};
use crate::component::{BoxFuture, Component};
use crate::dependencies::Dependencies;
use crate::events::{Event, Source, StoreId};
use crate::key_path::{CasePath, KeyPath};
use crate::view_model::ViewModel;

type CaseGetter<P, S> = Arc<dyn Fn(&P) -> Option<S> + Send + Sync>;
type CaseSetter<P, S> = Arc<dyn Fn(&mut P, S) -> bool + Send + Sync>;

/// Where a child store's state lives.
pub enum StateProjection<PState, S> {
    /// The child owns a copy, starting from this value.
    Initial(S),
    /// Reads and writes go through an external get/set pair. `identity`
    /// distinguishes bindings in the connection cache.
    Binding {
        identity: String,
        binding: StateBinding<S>,
    },
    /// A field of the parent state.
    KeyPath(KeyPath<PState, S>),
    /// An optional field of the parent state. `None` reads as `fallback`;
    /// writes store `Some`.
    Optional {
        key_path: KeyPath<PState, Option<S>>,
        fallback: S,
    },
    /// One case of an enum-shaped parent field.
    Case(CaseProjection<PState, S>),
}

/// Projection onto one case of an optional enum field.
///
/// While the parent is in another case, reads return the last value seen
/// in this case and writes are dropped.
pub struct CaseProjection<PState, S> {
    identity: String,
    get: CaseGetter<PState, S>,
    set: CaseSetter<PState, S>,
    fallback: S,
}

impl<PState, S> StateProjection<PState, S>
where
    PState: Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    pub fn initial(state: S) -> Self {
        StateProjection::Initial(state)
    }

    pub fn binding(
        identity: impl Into<String>,
        get: impl Fn() -> S + Send + Sync + 'static,
        set: impl Fn(S) + Send + Sync + 'static,
    ) -> Self {
        StateProjection::Binding {
            identity: identity.into(),
            binding: StateBinding::new(get, set),
        }
    }

    pub fn key_path(key_path: KeyPath<PState, S>) -> Self {
        StateProjection::KeyPath(key_path)
    }

    pub fn optional(key_path: KeyPath<PState, Option<S>>, fallback: S) -> Self {
        StateProjection::Optional { key_path, fallback }
    }

    pub fn case<D>(
        key_path: KeyPath<PState, Option<D>>,
        case: CasePath<D, S>,
        fallback: S,
    ) -> Self
    where
        D: 'static,
    {
        let identity = format!("{}/{}", key_path.name(), case.name());
        let (read_path, write_path) = (key_path.clone(), key_path);
        let (read_case, write_case) = (case.clone(), case);
        StateProjection::Case(CaseProjection {
            identity,
            get: Arc::new(move |parent: &PState| {
                read_path
                    .get(parent)
                    .and_then(|value| read_case.extract(&value))
            }),
            set: Arc::new(move |parent: &mut PState, state: S| {
                let in_case = write_path
                    .get(parent)
                    .is_some_and(|value| write_case.matches(&value));
                if in_case {
                    write_path.set(parent, Some(write_case.embed(state)));
                }
                in_case
            }),
            fallback,
        })
    }

    /// Part of the connection cache key.
    pub fn identity(&self) -> String {
        match self {
            StateProjection::Initial(_) => "initial".to_string(),
            StateProjection::Binding { identity, .. } => identity.clone(),
            StateProjection::KeyPath(key_path) => key_path.name().to_string(),
            StateProjection::Optional { key_path, .. } => format!("{}?", key_path.name()),
            StateProjection::Case(case) => case.identity.clone(),
        }
    }

    fn into_storage<P>(self, parent: &ComponentStore<P>) -> StateStorage<S>
    where
        P: Component<State = PState>,
    {
        match self {
            StateProjection::Initial(state) => StateStorage::root(state),
            StateProjection::Binding { binding, .. } => StateStorage::Binding(binding),
            StateProjection::KeyPath(key_path) => {
                let fallback = parent.read(|state| key_path.get(state));
                let write_path = key_path.clone();
                StateStorage::Binding(parent_binding(
                    parent,
                    move |state| Some(key_path.get(state)),
                    move |state, value| {
                        write_path.set(state, value);
                        true
                    },
                    fallback,
                ))
            }
            StateProjection::Optional { key_path, fallback } => {
                let read_fallback = fallback.clone();
                let write_path = key_path.clone();
                StateStorage::Binding(parent_binding(
                    parent,
                    move |state| {
                        Some(
                            key_path
                                .get(state)
                                .unwrap_or_else(|| read_fallback.clone()),
                        )
                    },
                    move |state, value| {
                        write_path.set(state, Some(value));
                        true
                    },
                    fallback,
                ))
            }
            StateProjection::Case(case) => {
                let CaseProjection {
                    get, set, fallback, ..
                } = case;
                StateStorage::Binding(parent_binding(
                    parent,
                    move |state| get(state),
                    move |state, value| set(state, value),
                    fallback,
                ))
            }
        }
    }
}

/// Binding into the parent's state that holds only a weak reference to
/// the parent. The last value read or written is kept for reads while the
/// projection does not apply or the parent is gone.
fn parent_binding<P, S>(
    parent: &ComponentStore<P>,
    get: impl Fn(&P::State) -> Option<S> + Send + Sync + 'static,
    set: impl Fn(&mut P::State, S) -> bool + Send + Sync + 'static,
    fallback: S,
) -> StateBinding<S>
where
    P: Component,
    S: Clone + Send + Sync + 'static,
{
    let get = Arc::new(get);
    let set = Arc::new(set);
    let initial = parent.read(|state| get(state)).unwrap_or(fallback);
    let last = Arc::new(Mutex::new(initial));
    let read_parent = Arc::downgrade(&parent.inner);

    let (read_get, read_last) = (Arc::clone(&get), Arc::clone(&last));
    let (write_parent, write_set, write_last) =
        (read_parent.clone(), Arc::clone(&set), Arc::clone(&last));
    let update_parent = read_parent.clone();

    StateBinding::new(
        move || {
            let current = read_parent
                .upgrade()
                .and_then(|inner| inner.storage.read(|state| read_get(state)));
            let mut last = read_last.lock();
            if let Some(current) = current {
                *last = current;
            }
            last.clone()
        },
        move |value: S| {
            *write_last.lock() = value.clone();
            let Some(inner) = write_parent.upgrade() else {
                return;
            };
            let parent = ComponentStore { inner };
            let mut state = parent.state();
            if write_set(&mut state, value) {
                parent.set_state(state);
            }
        },
    )
    .with_update(move |apply: &mut dyn FnMut(&mut S)| {
        let Some(inner) = update_parent.upgrade() else {
            apply(&mut *last.lock());
            return;
        };
        inner.storage.update(|state| {
            let mut value = get(state).unwrap_or_else(|| last.lock().clone());
            apply(&mut value);
            *last.lock() = value.clone();
            set(state, value);
        });
        inner.publish();
    })
}

/// What a parent does with its child's output.
pub enum OutputHandler<P: Component, C: Component> {
    Ignore,
    /// Dispatch to the parent as an input, in a new tracked task.
    Input(Arc<dyn Fn(C::Output) -> P::Input + Send + Sync>),
    /// Re-emit as the parent's own output.
    Output(Arc<dyn Fn(C::Output) -> P::Output + Send + Sync>),
    /// Run custom async work with the parent store.
    Handle(Arc<dyn Fn(C::Output, ComponentStore<P>) -> BoxFuture<'static, ()> + Send + Sync>),
}

impl<P: Component, C: Component> OutputHandler<P, C> {
    pub fn input(map: impl Fn(C::Output) -> P::Input + Send + Sync + 'static) -> Self {
        OutputHandler::Input(Arc::new(map))
    }

    pub fn output(map: impl Fn(C::Output) -> P::Output + Send + Sync + 'static) -> Self {
        OutputHandler::Output(Arc::new(map))
    }

    pub fn handle<F, Fut>(handler: F) -> Self
    where
        F: Fn(C::Output, ComponentStore<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        OutputHandler::Handle(Arc::new(
            move |output: C::Output, parent: ComponentStore<P>| -> BoxFuture<'static, ()> {
                Box::pin(handler(output, parent))
            },
        ))
    }

    fn route(&self, parent: &ComponentStore<P>, output: C::Output, source: Source) {
        match self {
            OutputHandler::Ignore => {}
            OutputHandler::Input(map) => {
                let _ = parent.send_input_at(map(output), source);
            }
            OutputHandler::Output(map) => parent.output_at(map(output), source),
            OutputHandler::Handle(handler) => {
                let work = handler(output, parent.clone());
                let _ = parent.spawn_tracked(parent.inner.cancel.clone(), work);
            }
        }
    }
}

impl<P: Component, C: Component> Clone for OutputHandler<P, C> {
    fn clone(&self) -> Self {
        match self {
            OutputHandler::Ignore => OutputHandler::Ignore,
            OutputHandler::Input(map) => OutputHandler::Input(Arc::clone(map)),
            OutputHandler::Output(map) => OutputHandler::Output(Arc::clone(map)),
            OutputHandler::Handle(handler) => OutputHandler::Handle(Arc::clone(handler)),
        }
    }
}

/// Descriptor for deriving a child store of type `C` from a parent `P`.
pub struct Connection<P: Component, C: Component> {
    id: String,
    projection: StateProjection<P::State, C::State>,
    output: OutputHandler<P, C>,
    custom_id: Option<String>,
    configure: Option<Arc<dyn Fn(&Dependencies) + Send + Sync>>,
    dedupe_outputs: bool,
}

impl<P: Component, C: Component> Connection<P, C> {
    /// `id` names the declaration site; it is part of the cache key.
    pub fn new(id: impl Into<String>, projection: StateProjection<P::State, C::State>) -> Self {
        Self {
            id: id.into(),
            projection,
            output: OutputHandler::Ignore,
            custom_id: None,
            configure: None,
            dedupe_outputs: true,
        }
    }

    pub fn output(mut self, output: OutputHandler<P, C>) -> Self {
        self.output = output;
        self
    }

    /// Distinguish otherwise identical connections, e.g. list rows.
    pub fn custom_id(mut self, custom_id: impl Into<String>) -> Self {
        self.custom_id = Some(custom_id.into());
        self
    }

    /// Adjust the child's dependencies after they are merged from the parent.
    pub fn dependencies(mut self, configure: impl Fn(&Dependencies) + Send + Sync + 'static) -> Self {
        self.configure = Some(Arc::new(configure));
        self
    }

    /// Route every output, even one equal to the previous output.
    pub fn allow_repeated_outputs(mut self) -> Self {
        self.dedupe_outputs = false;
        self
    }

    fn key(&self, parent: StoreId) -> ConnectionKey {
        ConnectionKey {
            connection: self.id.clone(),
            parent,
            child: C::name(),
            state: self.projection.identity(),
            custom: self.custom_id.clone(),
        }
    }
}

/// Structural identity of a resolved connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ConnectionKey {
    connection: String,
    parent: StoreId,
    child: &'static str,
    state: String,
    custom: Option<String>,
}

/// Type-erased cached child.
pub(crate) trait ConnectedStore: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dispose(&self);
}

impl<C: Component> ConnectedStore for ViewModel<C> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dispose(&self) {
        self.store().dispose();
    }
}

impl<P: Component> ComponentStore<P> {
    /// Resolve a connection into a child store, reusing the cached child
    /// when one with the same identity exists.
    pub fn connect<C: Component>(&self, connection: Connection<P, C>) -> ViewModel<C> {
        self.connect_keyed(connection).1
    }

    pub(super) fn connect_keyed<C: Component>(
        &self,
        connection: Connection<P, C>,
    ) -> (ConnectionKey, ViewModel<C>) {
        let key = connection.key(self.inner.id);
        let mut connections = self.inner.connections.lock();
        if let Some(existing) = connections
            .get(&key)
            .and_then(|cached| cached.as_any().downcast_ref::<ViewModel<C>>())
        {
            return (key, existing.clone());
        }

        let view_model = ViewModel::new(self.scope(connection));
        tracing::debug!(
            parent = %self.inner.path,
            child = %view_model.store().path(),
            "Connected child store"
        );
        connections.insert(key.clone(), Arc::new(view_model.clone()));
        (key, view_model)
    }

    /// Number of cached child connections.
    pub fn connection_count(&self) -> usize {
        self.inner.connections.lock().len()
    }

    fn scope<C: Component>(&self, connection: Connection<P, C>) -> ComponentStore<C> {
        let Connection {
            projection,
            output,
            configure,
            dedupe_outputs,
            ..
        } = connection;

        let storage = projection.into_storage(self);
        let dependencies = Dependencies::new(self.inner.dependencies.context());
        dependencies.merge(&self.inner.dependencies);
        if let Some(configure) = configure {
            configure(&dependencies);
        }

        let id = Uuid::new_v4();
        let forwarder = child_forwarder(Arc::downgrade(&self.inner), id, output, dedupe_outputs);
        let child = ComponentStore::build(StoreParts {
            id,
            path: self.inner.path.appending(C::name()),
            component: C::default(),
            storage,
            dependencies,
            runtime: self.inner.runtime.clone(),
            cancel: self.inner.cancel.child_token(),
            in_flight: Arc::clone(&self.inner.in_flight),
            gate: Arc::clone(&self.inner.gate),
            parent: Some(forwarder),
        });

        if child.inner.storage.is_binding() {
            let observer: Arc<dyn StateObserver> = child.inner.clone();
            self.add_observer(Arc::downgrade(&observer));
        }
        child
    }
}

/// Passes every event of the child subtree up to the parent, and routes
/// the direct child's outputs through `handler`.
///
/// With `dedupe_outputs`, an output equal to the previous one is dropped
/// while the child is still inside the same top-level span. Any other
/// top-level event of the child starts a new window.
fn child_forwarder<P: Component, C: Component>(
    parent: Weak<StoreInner<P>>,
    child_id: StoreId,
    handler: OutputHandler<P, C>,
    dedupe_outputs: bool,
) -> EventForwarder {
    let last_output: Mutex<Option<C::Output>> = Mutex::new(None);
    Arc::new(move |event: &Event| {
        let Some(inner) = parent.upgrade() else {
            return;
        };
        inner.forward_child_event(event);

        if event.store_id != child_id {
            return;
        }
        let Some(output) = event.output::<C::Output>() else {
            if event.depth == 0 {
                *last_output.lock() = None;
            }
            return;
        };
        if dedupe_outputs {
            let mut last = last_output.lock();
            if last.as_ref() == Some(output) {
                tracing::trace!(path = %event.path, "Skipping repeated output");
                return;
            }
            *last = Some(output.clone());
        }
        handler.route(&ComponentStore { inner }, output.clone(), event.source);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Never;
    use crate::runtime::ComponentRuntime;
    use crate::{case_path, key_path};
    use async_trait::async_trait;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Field {
        text: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Destination {
        Edit(Field),
        Info(u32),
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct FormState {
        name: Field,
        nickname: Option<Field>,
        destination: Option<Destination>,
    }

    #[derive(Default)]
    struct Form;

    #[async_trait]
    impl Component for Form {
        type State = FormState;
        type Action = Never;
        type Input = Never;
        type Output = Never;
        type Route = Never;
    }

    #[derive(Default)]
    struct Editor;

    #[async_trait]
    impl Component for Editor {
        type State = Field;
        type Action = Never;
        type Input = Never;
        type Output = Never;
        type Route = Never;
    }

    fn form() -> ComponentStore<Form> {
        ComponentStore::new(FormState::default(), &ComponentRuntime::default())
    }

    fn text(value: &str) -> Field {
        Field {
            text: value.to_string(),
        }
    }

    #[tokio::test]
    async fn key_path_projection_writes_through() {
        let parent = form();
        let child = parent.connect(Connection::<Form, Editor>::new(
            "name",
            StateProjection::key_path(key_path!(FormState, name)),
        ));

        child.store().set_state(text("Ada"));
        assert_eq!(parent.state().name, text("Ada"));

        parent.update_state(|state| state.name = text("Grace"));
        assert_eq!(child.state(), text("Grace"));
        assert_eq!(child.subscribe().borrow().text, "Grace");
    }

    #[tokio::test]
    async fn optional_projection_uses_fallback() {
        let parent = form();
        let child = parent.connect(Connection::<Form, Editor>::new(
            "nickname",
            StateProjection::optional(key_path!(FormState, nickname), text("none")),
        ));

        assert_eq!(child.state(), text("none"));
        child.store().set_state(text("Ace"));
        assert_eq!(parent.state().nickname, Some(text("Ace")));
    }

    #[tokio::test]
    async fn case_projection_only_writes_matching_case() {
        let parent = form();
        parent.update_state(|state| state.destination = Some(Destination::Edit(text("a"))));
        let child = parent.connect(Connection::<Form, Editor>::new(
            "edit",
            StateProjection::case(
                key_path!(FormState, destination),
                case_path!(Destination::Edit),
                Field::default(),
            ),
        ));

        assert_eq!(child.state(), text("a"));
        child.store().set_state(text("b"));
        assert_eq!(parent.state().destination, Some(Destination::Edit(text("b"))));

        parent.update_state(|state| state.destination = Some(Destination::Info(1)));
        child.store().set_state(text("c"));
        assert_eq!(parent.state().destination, Some(Destination::Info(1)));
        assert_eq!(child.state(), text("c"));

        child.store().update_state(|field| field.text.push('d'));
        assert_eq!(parent.state().destination, Some(Destination::Info(1)));
        assert_eq!(child.state(), text("cd"));

        parent.update_state(|state| state.destination = Some(Destination::Edit(text("e"))));
        child.store().update_state(|field| field.text.push('f'));
        assert_eq!(parent.state().destination, Some(Destination::Edit(text("ef"))));
    }

    #[tokio::test]
    async fn same_identity_reuses_child() {
        let parent = form();
        let connection = || {
            Connection::<Form, Editor>::new("name", StateProjection::key_path(key_path!(FormState, name)))
        };
        let first = parent.connect(connection());
        let second = parent.connect(connection());
        let other = parent.connect(connection().custom_id("row-2"));

        assert!(first.store().ptr_eq(second.store()));
        assert!(!first.store().ptr_eq(other.store()));
        assert_eq!(parent.connection_count(), 2);
        assert_eq!(first.store().path().string(), "Form.Editor");
    }

    #[tokio::test]
    async fn parent_dispose_disposes_children() {
        let parent = form();
        let child = parent.connect(Connection::<Form, Editor>::new(
            "name",
            StateProjection::initial(Field::default()),
        ));
        parent.dispose();
        assert!(child.store().is_disposed());
        assert_eq!(parent.connection_count(), 0);
    }
}
