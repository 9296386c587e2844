//! The component handler contract.
//!
//! A component is a state machine: a `State`, the `Action`s a view can send,
//! the `Input`s its children can send, the `Output`s it reports to its
//! parent and the `Route`s it can present. Business logic lives in the async
//! hooks below; each receives the component's [`ComponentStore`] to read and
//! mutate state, emit output, run tasks and present routes.
//!
//! ```text
//! Action/Input ──→ handler ──→ mutate/output/task/present ──→ Event
//!      ↑                                                        │
//!      └────────────────────── view / parent ←──────────────────┘
//! ```

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::store::ComponentStore;

/// Boxed future used where closures return async work.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Marker trait for component state.
///
/// States should be:
/// - Cloneable (stores hand out snapshots)
/// - Comparable (writes of an equal value are dropped)
/// - Debuggable (used in event details and test diffs)
pub trait ComponentState: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> ComponentState for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// Marker trait for actions, inputs, outputs and routes.
pub trait ComponentMessage: Clone + Debug + Send + Sync + 'static {}

impl<T> ComponentMessage for T where T: Clone + Debug + Send + Sync + 'static {}

/// Uninhabited vocabulary for components without inputs, outputs or routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Never {}

/// Business logic of one component.
///
/// All hooks default to doing nothing, so a component only implements the
/// ones it needs.
#[async_trait]
pub trait Component: Default + Send + Sync + Sized + 'static {
    type State: ComponentState;
    type Action: ComponentMessage;
    type Input: ComponentMessage;
    type Output: ComponentMessage + PartialEq;
    type Route: ComponentMessage;

    /// Name used in paths, logs and test reports.
    fn name() -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    async fn appear(&self, _first: bool, _store: &ComponentStore<Self>) {}

    async fn disappear(&self, _store: &ComponentStore<Self>) {}

    async fn handle_action(&self, _action: Self::Action, _store: &ComponentStore<Self>) {}

    async fn handle_input(&self, _input: Self::Input, _store: &ComponentStore<Self>) {}

    /// Called after a view binding wrote `property`.
    async fn binding_changed(&self, _property: &str, _store: &ComponentStore<Self>) {}

    /// Connect the child component behind `route`, typically with
    /// [`ComponentStore::connect_route`].
    fn connect_route(&self, _route: &Self::Route, _store: &ComponentStore<Self>) {}
}
