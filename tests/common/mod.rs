//! Shared test components.

#![allow(dead_code, unused_imports)]

use std::time::Duration;

use async_trait::async_trait;
use component_store::dependencies::{Clock, UuidGenerator};
use component_store::{
    key_path, Component, ComponentRoute, ComponentRuntime, ComponentStore, Connection, Never,
    OutputHandler, Resource, RuntimeConfig, StateProjection, ViewModel,
};

pub const SETTLE: Duration = Duration::from_secs(2);

/// Runtime that records every event in its global sink.
pub fn runtime() -> ComponentRuntime {
    ComponentRuntime::new(RuntimeConfig::default())
}

// ============================================================================
// Counter
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterState {
    pub count: i32,
    pub label: String,
}

#[derive(Debug, Clone)]
pub enum CounterAction {
    Increment,
    Decrement,
    Finish,
    FinishTwice,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CounterOutput {
    Finished(i32),
}

#[derive(Default)]
pub struct Counter;

#[async_trait]
impl Component for Counter {
    type State = CounterState;
    type Action = CounterAction;
    type Input = Never;
    type Output = CounterOutput;
    type Route = Never;

    async fn handle_action(&self, action: CounterAction, store: &ComponentStore<Self>) {
        let count = store.read(|state| state.count);
        match action {
            CounterAction::Increment => store.mutate(&key_path!(CounterState, count), count + 1),
            CounterAction::Decrement => store.mutate(&key_path!(CounterState, count), count - 1),
            CounterAction::Finish => store.output(CounterOutput::Finished(count)),
            CounterAction::FinishTwice => {
                store.output(CounterOutput::Finished(count));
                store.output(CounterOutput::Finished(count));
            }
        }
    }
}

// ============================================================================
// Tally, two independent fields
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TallyState {
    pub a: u32,
    pub b: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TallyAction {
    BumpA,
    BumpB,
    /// Bumps `a`, yields, then bumps `b`.
    BumpBoth,
}

#[derive(Default)]
pub struct Tally;

#[async_trait]
impl Component for Tally {
    type State = TallyState;
    type Action = TallyAction;
    type Input = Never;
    type Output = Never;
    type Route = Never;

    async fn handle_action(&self, action: TallyAction, store: &ComponentStore<Self>) {
        let a = key_path!(TallyState, a);
        let b = key_path!(TallyState, b);
        match action {
            TallyAction::BumpA => store.mutate(&a, store.read(|state| state.a) + 1),
            TallyAction::BumpB => store.mutate(&b, store.read(|state| state.b) + 1),
            TallyAction::BumpBoth => {
                store.mutate(&a, store.read(|state| state.a) + 1);
                tokio::task::yield_now().await;
                store.mutate(&b, store.read(|state| state.b) + 1);
            }
        }
    }
}

// ============================================================================
// Detail, presented by Parent
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailState {
    pub title: String,
}

#[derive(Debug, Clone)]
pub enum DetailAction {
    Rename(String),
    Close,
}

#[derive(Default)]
pub struct Detail;

#[async_trait]
impl Component for Detail {
    type State = DetailState;
    type Action = DetailAction;
    type Input = Never;
    type Output = Never;
    type Route = Never;

    async fn handle_action(&self, action: DetailAction, store: &ComponentStore<Self>) {
        match action {
            DetailAction::Rename(title) => store.mutate(&key_path!(DetailState, title), title),
            DetailAction::Close => store.dismiss(),
        }
    }
}

// ============================================================================
// Parent
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentState {
    pub counter: CounterState,
    pub done: bool,
    pub finished_with: Option<i32>,
}

#[derive(Debug, Clone)]
pub enum ParentAction {
    ShowDetail(String),
    CloseDetail,
}

#[derive(Debug, Clone)]
pub enum ParentInput {
    ChildFinished(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParentRoute {
    Detail(ComponentRoute<Detail>),
}

#[derive(Default)]
pub struct Parent;

#[async_trait]
impl Component for Parent {
    type State = ParentState;
    type Action = ParentAction;
    type Input = ParentInput;
    type Output = Never;
    type Route = ParentRoute;

    async fn handle_action(&self, action: ParentAction, store: &ComponentStore<Self>) {
        match action {
            ParentAction::ShowDetail(title) => {
                store.present(ParentRoute::Detail(ComponentRoute::new(DetailState { title })))
            }
            ParentAction::CloseDetail => store.dismiss_route().await,
        }
    }

    async fn handle_input(&self, input: ParentInput, store: &ComponentStore<Self>) {
        match input {
            ParentInput::ChildFinished(count) => {
                store.mutate(&key_path!(ParentState, done), true);
                store.mutate(&key_path!(ParentState, finished_with), Some(count));
            }
        }
    }

    fn connect_route(&self, route: &ParentRoute, store: &ComponentStore<Self>) {
        match route {
            ParentRoute::Detail(route) => {
                store.connect_route(route, OutputHandler::Ignore);
            }
        }
    }
}

pub fn detail_route(route: &ParentRoute) -> Option<ComponentRoute<Detail>> {
    match route {
        ParentRoute::Detail(route) => Some(route.clone()),
    }
}

/// The counter embedded in the parent's state, reporting back as an input.
pub fn counter(parent: &ComponentStore<Parent>) -> ViewModel<Counter> {
    parent.connect(
        Connection::new(
            "counter",
            StateProjection::key_path(key_path!(ParentState, counter)),
        )
        .output(OutputHandler::input(|output| match output {
            CounterOutput::Finished(count) => ParentInput::ChildFinished(count),
        })),
    )
}

// ============================================================================
// Profile, loading a resource
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    pub profile: Resource<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ProfileAction {
    Load(Result<String, String>),
    LoadAfter(String, Duration),
    Tag,
}

#[derive(Default)]
pub struct Profile;

#[async_trait]
impl Component for Profile {
    type State = ProfileState;
    type Action = ProfileAction;
    type Input = Never;
    type Output = Never;
    type Route = Never;

    async fn handle_action(&self, action: ProfileAction, store: &ComponentStore<Self>) {
        let profile = key_path!(ProfileState, profile);
        match action {
            ProfileAction::Load(result) => {
                store
                    .load_resource(&profile, async move { result.map_err(anyhow::Error::msg) })
                    .await;
            }
            ProfileAction::LoadAfter(value, delay) => {
                let clock = store.dependency::<Clock>();
                store
                    .load_resource(&profile, async move {
                        clock.sleep(delay).await;
                        Ok(value)
                    })
                    .await;
            }
            ProfileAction::Tag => {
                let id = store.dependency::<UuidGenerator>().generate();
                store.mutate(&key_path!(ProfileState, request_id), Some(id.to_string()));
            }
        }
    }
}
