//! The component store.
//!
//! A [`ComponentStore`] owns (or binds to) one component's state and runs
//! every operation on it through an event span:
//!
//! ```text
//! start_event ──→ handler work (mutate/output/task...) ──→ send_event
//!   depth += 1          mutations buffered                depth -= 1
//!                                                         Event → local stream
//!                                                               → global sink
//!                                                               → parent store
//! ```
//!
//! Handler work of one store tree is polled under a shared [`SerialGate`],
//! so handlers only interleave at `.await` points. Each span collects its
//! own mutations, and every field write is a single locked
//! read-modify-write on the state's owner.
//!
//! Stores are cheap `Arc` handles. Scoped child stores are created through
//! [`Connection`]s and cached per parent.

mod route;
mod scope;
mod span;
mod storage;
mod tasks;

pub use route::ComponentRoute;
pub use scope::{CaseProjection, Connection, OutputHandler, StateProjection};
pub use storage::StateBinding;

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};
use scopeguard::ScopeGuard;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::component::Component;
use crate::dependencies::{Dependencies, DependencyContext, DependencyKey};
use crate::error::TaskError;
use crate::events::{
    Event, EventKind, EventValue, Mutation, Source, StoreId, TaskEvent, ViewEvent,
};
use crate::key_path::KeyPath;
use crate::path::ComponentPath;
use crate::runtime::ComponentRuntime;
use crate::view_model::Binding;

use scope::{ConnectedStore, ConnectionKey};
use span::{InFlight, MutationBuffer, SerialGate, SpanDepth};
use storage::StateStorage;
use tasks::TaskRegistry;

const EVENT_BUFFER: usize = 1024;

type EventForwarder = Arc<dyn Fn(&Event) + Send + Sync>;
type DismissHandler = Arc<dyn Fn(Source) + Send + Sync>;

/// Receives state-change notifications from the store a binding points into.
trait StateObserver: Send + Sync {
    fn parent_state_changed(&self);
}

/// Runtime object owning one component's state, events and tasks.
pub struct ComponentStore<C: Component> {
    inner: Arc<StoreInner<C>>,
}

struct StoreInner<C: Component> {
    id: StoreId,
    path: ComponentPath,
    component: C,
    storage: StateStorage<C::State>,
    state_tx: watch::Sender<C::State>,
    route: RwLock<Option<C::Route>>,
    dependencies: Dependencies,
    runtime: ComponentRuntime,
    log_events: bool,
    log_child_events: bool,
    events_tx: broadcast::Sender<Event>,
    depth: SpanDepth,
    tasks: TaskRegistry,
    cancel: CancellationToken,
    in_flight: Arc<InFlight>,
    gate: Arc<SerialGate>,
    connections: Mutex<HashMap<ConnectionKey, Arc<dyn ConnectedStore>>>,
    route_connections: Mutex<Vec<ConnectionKey>>,
    parent: Option<EventForwarder>,
    dismiss_handler: Mutex<Option<DismissHandler>>,
    appear_task: Mutex<Option<CancellationToken>>,
    observers: Mutex<Vec<Weak<dyn StateObserver>>>,
    disposed: AtomicBool,
}

/// Everything needed to assemble a store.
struct StoreParts<C: Component> {
    id: StoreId,
    path: ComponentPath,
    component: C,
    storage: StateStorage<C::State>,
    dependencies: Dependencies,
    runtime: ComponentRuntime,
    cancel: CancellationToken,
    in_flight: Arc<InFlight>,
    gate: Arc<SerialGate>,
    parent: Option<EventForwarder>,
}

impl<C: Component> ComponentStore<C> {
    /// Root store with a default component instance.
    pub fn new(state: C::State, runtime: &ComponentRuntime) -> Self {
        Self::root(C::default(), state, runtime)
    }

    pub fn root(component: C, state: C::State, runtime: &ComponentRuntime) -> Self {
        Self::with_context(component, state, runtime, DependencyContext::Live)
    }

    /// Root store whose unset dependencies resolve for `context`.
    pub fn with_context(
        component: C,
        state: C::State,
        runtime: &ComponentRuntime,
        context: DependencyContext,
    ) -> Self {
        Self::build(StoreParts {
            id: Uuid::new_v4(),
            path: ComponentPath::new(C::name()),
            component,
            storage: StateStorage::root(state),
            dependencies: Dependencies::new(context),
            runtime: runtime.clone(),
            cancel: CancellationToken::new(),
            in_flight: Arc::default(),
            gate: Arc::default(),
            parent: None,
        })
    }

    fn build(parts: StoreParts<C>) -> Self {
        let (state_tx, _) = watch::channel(parts.storage.get());
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        let logging = &parts.runtime.config().logging;
        let (log_events, log_child_events) = (logging.log_events, logging.log_child_events);

        parts.runtime.graph().register(&parts.path, parts.id);
        tracing::debug!(path = %parts.path, store_id = %parts.id, "Store created");

        Self {
            inner: Arc::new(StoreInner {
                id: parts.id,
                path: parts.path,
                component: parts.component,
                storage: parts.storage,
                state_tx,
                route: RwLock::new(None),
                dependencies: parts.dependencies,
                runtime: parts.runtime,
                log_events,
                log_child_events,
                events_tx,
                depth: SpanDepth::default(),
                tasks: TaskRegistry::default(),
                cancel: parts.cancel,
                in_flight: parts.in_flight,
                gate: parts.gate,
                connections: Mutex::new(HashMap::new()),
                route_connections: Mutex::new(Vec::new()),
                parent: parts.parent,
                dismiss_handler: Mutex::new(None),
                appear_task: Mutex::new(None),
                observers: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    pub fn path(&self) -> &ComponentPath {
        &self.inner.path
    }

    pub fn component(&self) -> &C {
        &self.inner.component
    }

    pub fn runtime(&self) -> &ComponentRuntime {
        &self.inner.runtime
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.inner.dependencies
    }

    /// Read a dependency through this store's container.
    pub fn dependency<K: DependencyKey>(&self) -> K::Value {
        self.inner.dependencies.get::<K>()
    }

    pub fn route(&self) -> Option<C::Route> {
        self.inner.route.read().clone()
    }

    /// Number of events currently in progress on this store.
    pub fn event_depth(&self) -> usize {
        self.inner.depth.current()
    }

    /// Whether a task with this name is running, cancellable or not.
    pub fn is_task_running(&self, name: &str) -> bool {
        self.inner.tasks.is_running(name)
    }

    /// Named and anonymous tasks currently registered.
    pub fn running_task_count(&self) -> usize {
        self.inner.tasks.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Whether both handles point to the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Live feed of events emitted by this store and its descendants.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.events_tx.subscribe()
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn state(&self) -> C::State {
        self.inner.storage.get()
    }

    pub fn read<R>(&self, f: impl FnOnce(&C::State) -> R) -> R {
        self.inner.storage.read(f)
    }

    /// Replace the whole state. Equal values are dropped without
    /// notifying subscribers.
    pub fn set_state(&self, state: C::State) {
        if self.inner.storage.read(|current| *current == state) {
            return;
        }
        self.write_state(state);
    }

    /// Apply `f` to the state under the owner's lock. Subscribers are
    /// notified only if the state changed.
    pub fn update_state(&self, f: impl FnOnce(&mut C::State)) {
        self.inner.storage.update(f);
        self.inner.publish();
    }

    pub fn subscribe_state(&self) -> watch::Receiver<C::State> {
        self.inner.state_tx.subscribe()
    }

    fn write_state(&self, state: C::State) {
        self.inner.storage.set(state);
        self.inner.publish();
    }

    // ========================================================================
    // Event spans
    // ========================================================================

    /// Open an event span. Every call must be paired with one
    /// [`send_event`](Self::send_event).
    pub fn start_event(&self) -> SystemTime {
        self.inner.depth.open();
        SystemTime::now()
    }

    /// Close the innermost span and emit its event.
    ///
    /// # Panics
    ///
    /// Panics when no span is open.
    pub fn send_event(
        &self,
        kind: EventKind,
        start: SystemTime,
        mutations: Vec<Mutation>,
        source: Source,
    ) {
        let depth = self.inner.depth.close();
        let event = Event {
            id: Uuid::new_v4(),
            kind,
            path: self.inner.path.clone(),
            store_id: self.inner.id,
            component: C::name(),
            start,
            end: SystemTime::now(),
            mutations,
            depth,
            source,
        };
        self.inner.emit(event);
    }

    /// Run `work` inside a span, polled under the tree's gate. `finish`
    /// names the event to emit, or `None` to close the span silently.
    async fn run_span<T, Fut>(
        &self,
        source: Source,
        capture_mutations: bool,
        work: Fut,
        finish: impl FnOnce(&T) -> Option<EventKind> + Send,
    ) -> T
    where
        T: Send,
        Fut: Future<Output = T> + Send,
    {
        let start = self.start_event();
        // Closes the span if this future is dropped before `work` completes.
        let span = scopeguard::guard(&self.inner.depth, |depth| {
            depth.close();
        });
        let buffer = MutationBuffer::new(self.inner.id);
        let work = self.inner.gate.run(work);
        let output = if capture_mutations {
            buffer.scope(work).await
        } else {
            work.await
        };

        let mutations = buffer.take();
        let depth = ScopeGuard::into_inner(span);
        match finish(&output) {
            Some(kind) => self.send_event(kind, start, mutations, source),
            None => {
                depth.close();
            }
        }
        output
    }

    // ========================================================================
    // Actions and inputs
    // ========================================================================

    /// Run the action handler and wait for it to finish.
    #[track_caller]
    pub fn process_action(&self, action: C::Action) -> impl Future<Output = ()> + Send + '_ {
        let source = Source::capture();
        self.process_action_at(action, source)
    }

    /// Fire-and-forget dispatch, as used by a view layer.
    #[track_caller]
    pub fn send(&self, action: C::Action) -> JoinHandle<()> {
        let source = Source::capture();
        let store = self.clone();
        self.spawn_tracked(self.inner.cancel.clone(), async move {
            store.process_action_at(action, source).await
        })
    }

    pub(crate) async fn process_action_at(&self, action: C::Action, source: Source) {
        let value = EventValue::new(action.clone());
        self.run_span(
            source,
            true,
            self.inner.component.handle_action(action, self),
            move |_| Some(EventKind::Action(value)),
        )
        .await
    }

    #[track_caller]
    pub fn process_input(&self, input: C::Input) -> impl Future<Output = ()> + Send + '_ {
        let source = Source::capture();
        self.process_input_at(input, source)
    }

    /// Fire-and-forget input dispatch.
    #[track_caller]
    pub fn send_input(&self, input: C::Input) -> JoinHandle<()> {
        let source = Source::capture();
        self.send_input_at(input, source)
    }

    fn send_input_at(&self, input: C::Input, source: Source) -> JoinHandle<()> {
        let store = self.clone();
        self.spawn_tracked(self.inner.cancel.clone(), async move {
            store.process_input_at(input, source).await
        })
    }

    pub(crate) async fn process_input_at(&self, input: C::Input, source: Source) {
        let value = EventValue::new(input.clone());
        self.run_span(
            source,
            true,
            self.inner.component.handle_input(input, self),
            move |_| Some(EventKind::Input(value)),
        )
        .await
    }

    // ========================================================================
    // Mutations and bindings
    // ========================================================================

    /// Write one field and emit a mutation event.
    ///
    /// The mutation is also appended to the buffer of the enclosing
    /// action or input span, if any.
    #[track_caller]
    pub fn mutate<V>(&self, key_path: &KeyPath<C::State, V>, value: V)
    where
        V: Clone + Debug + Send + Sync + 'static,
    {
        self.mutate_at(key_path, value, Source::capture());
    }

    pub(crate) fn mutate_at<V>(&self, key_path: &KeyPath<C::State, V>, value: V, source: Source)
    where
        V: Clone + Debug + Send + Sync + 'static,
    {
        let start = self.start_event();
        let mutation = self.inner.storage.update(|state| {
            let old_state = state.clone();
            let old_value = key_path.get(state);
            key_path.set(state, value.clone());
            Mutation::new(key_path.name(), &value, &old_value, &old_state)
        });
        self.inner.publish();

        MutationBuffer::record(self.inner.id, &mutation);
        self.send_event(
            EventKind::Mutation(mutation.clone()),
            start,
            vec![mutation],
            source,
        );
    }

    /// View-side write of one field. Equal values are ignored; otherwise a
    /// binding event is emitted and the component's binding hook awaited.
    #[track_caller]
    pub fn set_binding<V>(
        &self,
        key_path: &KeyPath<C::State, V>,
        value: V,
    ) -> impl Future<Output = ()> + Send + '_
    where
        V: Clone + PartialEq + Debug + Send + Sync + 'static,
    {
        let source = Source::capture();
        let key_path = key_path.clone();
        async move { self.set_binding_at(key_path, value, source).await }
    }

    pub(crate) async fn set_binding_at<V>(
        &self,
        key_path: KeyPath<C::State, V>,
        value: V,
        source: Source,
    ) where
        V: Clone + PartialEq + Debug + Send + Sync + 'static,
    {
        let start = self.start_event();
        let mutation = self.inner.storage.update(|state| {
            let old_value = key_path.get(state);
            if old_value == value {
                return None;
            }
            let old_state = state.clone();
            key_path.set(state, value.clone());
            Some(Mutation::new(key_path.name(), &value, &old_value, &old_state))
        });
        let Some(mutation) = mutation else {
            self.inner.depth.close();
            return;
        };
        self.inner.publish();
        self.send_event(
            EventKind::Binding(mutation.clone()),
            start,
            vec![mutation],
            source,
        );

        self.inner
            .gate
            .run(self.inner.component.binding_changed(key_path.name(), self))
            .await;
    }

    /// Synchronous get/set pair for one field.
    pub fn binding<V>(&self, key_path: &KeyPath<C::State, V>) -> Binding<C, V>
    where
        V: Clone + PartialEq + Debug + Send + Sync + 'static,
    {
        Binding::new(self.clone(), key_path.clone())
    }

    // ========================================================================
    // Output and routes
    // ========================================================================

    /// Report a value to the parent store.
    #[track_caller]
    pub fn output(&self, output: C::Output) {
        let source = Source::capture();
        self.output_at(output, source);
    }

    pub(crate) fn output_at(&self, output: C::Output, source: Source) {
        let start = self.start_event();
        self.send_event(
            EventKind::Output(EventValue::new(output)),
            start,
            Vec::new(),
            source,
        );
    }

    /// Present a route. The component's `connect_route` hook connects the
    /// child store before the route becomes visible.
    #[track_caller]
    pub fn present(&self, route: C::Route) {
        let source = Source::capture();
        let start = self.start_event();

        let previous = std::mem::take(&mut *self.inner.route_connections.lock());
        self.inner.component.connect_route(&route, self);
        let current = self.inner.route_connections.lock().clone();
        let stale: Vec<ConnectionKey> = previous
            .into_iter()
            .filter(|key| !current.contains(key))
            .collect();
        self.release_connections(&stale);

        *self.inner.route.write() = Some(route.clone());
        self.send_event(
            EventKind::Route(EventValue::new(route)),
            start,
            Vec::new(),
            source,
        );
    }

    /// Clear the presented route on the next scheduler tick.
    #[track_caller]
    pub fn dismiss_route(&self) -> impl Future<Output = ()> + Send + '_ {
        let source = Source::capture();
        self.dismiss_route_at(source)
    }

    async fn dismiss_route_at(&self, source: Source) {
        tokio::task::yield_now().await;

        let previous = self.inner.route.write().take();
        if previous.is_none() {
            tracing::debug!(path = %self.inner.path, "No route to dismiss");
            return;
        }
        let start = self.start_event();
        let stale = std::mem::take(&mut *self.inner.route_connections.lock());
        self.release_connections(&stale);
        self.send_event(EventKind::DismissRoute, start, Vec::new(), source);
    }

    /// Ask the presenting parent to dismiss this store's route.
    #[track_caller]
    pub fn dismiss(&self) {
        let source = Source::capture();
        let handler = self.inner.dismiss_handler.lock().clone();
        match handler {
            Some(handler) => handler(source),
            None => tracing::debug!(path = %self.inner.path, "Store was not presented by a route"),
        }
    }

    fn set_dismiss_handler(&self, handler: DismissHandler) {
        *self.inner.dismiss_handler.lock() = Some(handler);
    }

    // ========================================================================
    // View lifecycle
    // ========================================================================

    /// Run the appear hook in the background. The work is cancelled by a
    /// later [`disappear`](Self::disappear).
    #[track_caller]
    pub fn appear(&self, first: bool) -> JoinHandle<()> {
        let source = Source::capture();
        self.spawn_appear(first, source)
    }

    pub(crate) fn spawn_appear(&self, first: bool, source: Source) -> JoinHandle<()> {
        let token = self.replace_appear_token();
        let store = self.clone();
        self.spawn_tracked(token, async move { store.appear_at(first, source).await })
    }

    /// Run the appear hook and wait for it, unless `disappear` cancels it.
    #[track_caller]
    pub fn appear_and_wait(&self, first: bool) -> impl Future<Output = ()> + Send + '_ {
        let source = Source::capture();
        async move {
            let token = self.replace_appear_token();
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = self.appear_at(first, source) => {}
            }
        }
    }

    fn replace_appear_token(&self) -> CancellationToken {
        let token = self.inner.cancel.child_token();
        let previous = self.inner.appear_task.lock().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    async fn appear_at(&self, first: bool, source: Source) {
        self.run_span(
            source,
            true,
            self.inner.component.appear(first, self),
            move |_| Some(EventKind::View(ViewEvent::Appear { first })),
        )
        .await
    }

    #[track_caller]
    pub fn disappear(&self) -> impl Future<Output = ()> + Send + '_ {
        let source = Source::capture();
        self.disappear_at(source)
    }

    pub(crate) async fn disappear_at(&self, source: Source) {
        let appear = self.inner.appear_task.lock().take();
        if let Some(token) = appear {
            token.cancel();
        }
        self.run_span(
            source,
            true,
            self.inner.component.disappear(self),
            |_| Some(EventKind::View(ViewEvent::Disappear)),
        )
        .await
    }

    /// Record that a view rendered this store's state.
    #[track_caller]
    pub fn record_body(&self) {
        let source = Source::capture();
        let start = self.start_event();
        self.send_event(EventKind::View(ViewEvent::Body), start, Vec::new(), source);
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Run `body` as an anonymous task and emit its outcome.
    ///
    /// Anonymous tasks run to completion unless the store is disposed.
    #[track_caller]
    pub fn task<'a, T, F>(
        &'a self,
        name: impl Into<String>,
        body: F,
    ) -> impl Future<Output = Result<T, TaskError>> + Send + 'a
    where
        T: Clone + Debug + Send + Sync + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'a,
    {
        let source = Source::capture();
        self.run_task(name.into(), false, body, source)
    }

    /// Run `body` under `name`, cancelling any run already registered
    /// under that name.
    #[track_caller]
    pub fn task_cancellable<'a, T, F>(
        &'a self,
        name: impl Into<String>,
        body: F,
    ) -> impl Future<Output = Result<T, TaskError>> + Send + 'a
    where
        T: Clone + Debug + Send + Sync + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'a,
    {
        let source = Source::capture();
        self.run_task(name.into(), true, body, source)
    }

    /// Run a task and hand a failure to `catch` instead of returning it.
    /// Returns `None` on failure or cancellation.
    #[track_caller]
    pub fn task_catching<'a, T, F, E>(
        &'a self,
        name: impl Into<String>,
        cancellable: bool,
        body: F,
        catch: E,
    ) -> impl Future<Output = Option<T>> + Send + 'a
    where
        T: Clone + Debug + Send + Sync + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'a,
        E: FnOnce(Arc<anyhow::Error>) + Send + 'a,
    {
        let source = Source::capture();
        let name = name.into();
        async move {
            match self.run_task(name, cancellable, body, source).await {
                Ok(value) => Some(value),
                Err(TaskError::Failed { error, .. }) => {
                    catch(error);
                    None
                }
                Err(TaskError::Cancelled { .. }) => None,
            }
        }
    }

    pub(crate) async fn run_task<T, F>(
        &self,
        name: String,
        cancellable: bool,
        body: F,
        source: Source,
    ) -> Result<T, TaskError>
    where
        T: Clone + Debug + Send + Sync + 'static,
        F: Future<Output = anyhow::Result<T>> + Send,
    {
        let registry = &self.inner.tasks;
        let ticket = if cancellable {
            registry.register(&name, &self.inner.cancel)
        } else {
            registry.register_anonymous(&name, &self.inner.cancel)
        };
        let ticket = scopeguard::guard(ticket, |ticket| registry.finish(&ticket));
        let token = ticket.token.clone();

        let event_name = name.clone();
        let outcome = self
            .run_span(
                source,
                false,
                async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        result = body => Some(result.map_err(Arc::new)),
                    }
                },
                move |outcome: &Option<Result<T, Arc<anyhow::Error>>>| {
                    let result = match outcome.as_ref()? {
                        Ok(value) => Ok(EventValue::new(value.clone())),
                        Err(error) => Err(Arc::clone(error)),
                    };
                    Some(EventKind::Task(TaskEvent {
                        name: event_name,
                        result,
                    }))
                },
            )
            .await;
        drop(ticket);

        match outcome {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => {
                tracing::warn!(path = %self.inner.path, task = %name, error = %error, "Task failed");
                Err(TaskError::Failed { name, error })
            }
            None => {
                tracing::debug!(path = %self.inner.path, task = %name, "Task cancelled");
                Err(TaskError::Cancelled { name })
            }
        }
    }

    /// Cancel the cancellable task registered under `name`.
    pub fn cancel_task(&self, name: &str) -> bool {
        self.inner.tasks.cancel(name)
    }

    // ========================================================================
    // Background work and teardown
    // ========================================================================

    /// Spawn `work`, counting it as in flight until it finishes or `token`
    /// is cancelled.
    pub(crate) fn spawn_tracked<F>(&self, token: CancellationToken, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.inner.in_flight.enter();
        tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = work => {}
            }
        })
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Wait until no fire-and-forget work of this store tree is running.
    /// Returns false if `timeout` elapsed first.
    pub async fn settle(&self, timeout: Duration) -> bool {
        self.inner.in_flight.idle(timeout).await
    }

    /// Cancel every task, dispose connected children and leave the
    /// component graph. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.tasks.cancel_all();

        let children: Vec<Arc<dyn ConnectedStore>> = self
            .inner
            .connections
            .lock()
            .drain()
            .map(|(_, child)| child)
            .collect();
        for child in children {
            child.dispose();
        }
        self.inner.route_connections.lock().clear();

        self.inner
            .runtime
            .graph()
            .unregister(&self.inner.path, self.inner.id);
        tracing::debug!(path = %self.inner.path, store_id = %self.inner.id, "Store disposed");
    }

    fn add_observer(&self, observer: Weak<dyn StateObserver>) {
        self.inner.observers.lock().push(observer);
    }

    fn release_connections(&self, keys: &[ConnectionKey]) {
        if keys.is_empty() {
            return;
        }
        let released: Vec<Arc<dyn ConnectedStore>> = {
            let mut connections = self.inner.connections.lock();
            keys.iter().filter_map(|key| connections.remove(key)).collect()
        };
        for child in released {
            child.dispose();
        }
    }
}

impl<C: Component> StoreInner<C> {
    fn emit(&self, event: Event) {
        if self.log_events {
            log_event(&event, false);
        }
        // No local subscribers is fine.
        let _ = self.events_tx.send(event.clone());
        if !self.runtime.suppresses_global_events() {
            self.runtime.events().push(event.clone());
        }
        if let Some(parent) = &self.parent {
            parent(&event);
        }
    }

    /// Re-emit an event from a descendant on this store's stream and pass
    /// it further up.
    fn forward_child_event(&self, event: &Event) {
        if self.log_child_events {
            log_event(event, true);
        }
        let _ = self.events_tx.send(event.clone());
        if let Some(parent) = &self.parent {
            parent(event);
        }
    }

    fn publish(&self) {
        let state = self.storage.get();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            self.notify_observers();
        }
    }

    fn notify_observers(&self) {
        let observers: Vec<Arc<dyn StateObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|observer| observer.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.parent_state_changed();
        }
    }
}

impl<C: Component> StateObserver for StoreInner<C> {
    fn parent_state_changed(&self) {
        self.publish();
    }
}

impl<C: Component> Drop for StoreInner<C> {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::SeqCst) {
            self.cancel.cancel();
            self.tasks.cancel_all();
            self.runtime.graph().unregister(&self.path, self.id);
        }
    }
}

impl<C: Component> Clone for ComponentStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Component> fmt::Debug for ComponentStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field("path", &self.inner.path)
            .field("id", &self.inner.id)
            .finish()
    }
}

fn log_event(event: &Event, forwarded: bool) {
    tracing::info!(
        target: "component_store::events",
        path = %event.path,
        depth = event.depth,
        mutations = event.mutations.len(),
        forwarded,
        "{}",
        event,
    );
}
