use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::context::TestContext;
use super::result::{TestError, TestStepResult};
use crate::component::{BoxFuture, Component};
use crate::dependencies::{Dependencies, DependencyKey};
use crate::events::{case_name, EventValue, Source};
use crate::key_path::KeyPath;
use crate::store::{ComponentRoute, ComponentStore};
use crate::view_model::ViewModel;

type StoreWork<C> = Arc<dyn Fn(ComponentStore<C>) -> BoxFuture<'static, ()> + Send + Sync>;
type RouteCase<C, Child> =
    Arc<dyn Fn(&<C as Component>::Route) -> Option<ComponentRoute<Child>> + Send + Sync>;

/// One scripted interaction with a store, plus what it should produce.
pub struct TestStep<C: Component> {
    pub(crate) title: String,
    pub(crate) source: Source,
    pub(crate) kind: StepKind<C>,
    pub(crate) expectations: Vec<Expectation<C>>,
}

pub(crate) enum StepKind<C: Component> {
    Appear { first: bool },
    Disappear,
    Action(C::Action),
    Input(C::Input),
    Binding(Box<dyn BindingWrite<C>>),
    SetState(C::State),
    Dependency(Arc<dyn Fn(&Dependencies) + Send + Sync>),
    Nested(Box<dyn NestedSteps<C>>),
    Snapshot { name: String },
    Run(StoreWork<C>),
    Wait(Duration),
}

impl<C: Component> TestStep<C> {
    #[track_caller]
    fn new(title: impl Into<String>, kind: StepKind<C>) -> Self {
        Self {
            title: title.into(),
            source: Source::capture(),
            kind,
            expectations: Vec::new(),
        }
    }

    #[track_caller]
    pub fn appear() -> Self {
        Self::new("Appear", StepKind::Appear { first: true })
    }

    /// Appear again after a disappear.
    #[track_caller]
    pub fn reappear() -> Self {
        Self::new("Appear", StepKind::Appear { first: false })
    }

    #[track_caller]
    pub fn disappear() -> Self {
        Self::new("Disappear", StepKind::Disappear)
    }

    #[track_caller]
    pub fn action(action: C::Action) -> Self {
        let title = format!("Action: {}", EventValue::new(action.clone()).case_name());
        Self::new(title, StepKind::Action(action))
    }

    #[track_caller]
    pub fn input(input: C::Input) -> Self {
        let title = format!("Input: {}", EventValue::new(input.clone()).case_name());
        Self::new(title, StepKind::Input(input))
    }

    /// Write a field as a view would. String values are typed one
    /// character at a time when a typing delay is configured.
    #[track_caller]
    pub fn binding<V>(key_path: &KeyPath<C::State, V>, value: V) -> Self
    where
        V: Clone + PartialEq + Debug + Send + Sync + 'static,
    {
        let title = format!("Binding: {} = {:?}", key_path.name(), value);
        Self::new(
            title,
            StepKind::Binding(Box::new(KeyPathWrite {
                key_path: key_path.clone(),
                value,
            })),
        )
    }

    #[track_caller]
    pub fn set_state(state: C::State) -> Self {
        Self::new("Set state", StepKind::SetState(state))
    }

    /// Override a dependency of the store under test.
    #[track_caller]
    pub fn dependency<K: DependencyKey>(value: K::Value) -> Self {
        Self::new(
            format!("Dependency: {}", K::NAME),
            StepKind::Dependency(Arc::new(move |dependencies: &Dependencies| {
                dependencies.set::<K>(value.clone())
            })),
        )
    }

    /// Run `steps` against the child behind the currently presented route.
    /// `case` picks the route's payload.
    #[track_caller]
    pub fn route<Child, F>(case: F, steps: Vec<TestStep<Child>>) -> Self
    where
        Child: Component,
        F: Fn(&C::Route) -> Option<ComponentRoute<Child>> + Send + Sync + 'static,
    {
        Self::new(
            format!("Route: {}", Child::name()),
            StepKind::Nested(Box::new(RouteSteps {
                case: Arc::new(case),
                steps,
            })),
        )
    }

    /// Run `steps` against a child resolved from the store under test.
    #[track_caller]
    pub fn connection<Child, F>(connect: F, steps: Vec<TestStep<Child>>) -> Self
    where
        Child: Component,
        F: Fn(&ComponentStore<C>) -> ViewModel<Child> + Send + Sync + 'static,
    {
        Self::new(
            format!("Connection: {}", Child::name()),
            StepKind::Nested(Box::new(ConnectionSteps {
                connect: Box::new(connect),
                steps,
            })),
        )
    }

    /// Record the current state under `name`.
    #[track_caller]
    pub fn snapshot(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(format!("Snapshot: {}", name), StepKind::Snapshot { name })
    }

    /// Run arbitrary async work against the store.
    #[track_caller]
    pub fn run<F, Fut>(title: impl Into<String>, work: F) -> Self
    where
        F: Fn(ComponentStore<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let work: StoreWork<C> = Arc::new(
            move |store: ComponentStore<C>| -> BoxFuture<'static, ()> { Box::pin(work(store)) },
        );
        Self::new(title, StepKind::Run(work))
    }

    #[track_caller]
    pub fn wait(duration: Duration) -> Self {
        Self::new(format!("Wait {:?}", duration), StepKind::Wait(duration))
    }

    // ========================================================================
    // Expectations
    // ========================================================================

    fn expect(mut self, kind: ExpectationKind<C>, source: Source) -> Self {
        self.expectations.push(Expectation { kind, source });
        self
    }

    #[track_caller]
    pub fn expect_output(self, output: C::Output) -> Self {
        let source = Source::capture();
        self.expect(ExpectationKind::Output(output), source)
    }

    /// Expect a task named `name` to complete successfully.
    #[track_caller]
    pub fn expect_task(self, name: impl Into<String>) -> Self {
        let source = Source::capture();
        self.expect(
            ExpectationKind::Task {
                name: name.into(),
                success: true,
            },
            source,
        )
    }

    #[track_caller]
    pub fn expect_task_failure(self, name: impl Into<String>) -> Self {
        let source = Source::capture();
        self.expect(
            ExpectationKind::Task {
                name: name.into(),
                success: false,
            },
            source,
        )
    }

    /// Expect the route picked by `case` to be presented with `state`.
    #[track_caller]
    pub fn expect_route<Child, F>(self, case: F, state: Child::State) -> Self
    where
        Child: Component,
        F: Fn(&C::Route) -> Option<ComponentRoute<Child>> + Send + Sync + 'static,
    {
        let source = Source::capture();
        let check: RouteCheck<C> = Arc::new(move |route: Option<&C::Route>| {
            let Some(route) = route else {
                return Err(RouteMismatch::from(format!(
                    "Expected route {}, but no route is presented",
                    Child::name()
                )));
            };
            let Some(presented) = case(route) else {
                return Err(RouteMismatch::from(format!(
                    "Expected route {}, found {}",
                    Child::name(),
                    case_name(&format!("{:?}", route))
                )));
            };
            let actual = presented.state();
            if actual == state {
                Ok(())
            } else {
                Err(RouteMismatch::diff(
                    format!("Route {} has unexpected state", Child::name()),
                    &state,
                    &actual,
                ))
            }
        });
        self.expect(ExpectationKind::Route(check), source)
    }

    #[track_caller]
    pub fn expect_empty_route(self) -> Self {
        let source = Source::capture();
        self.expect(ExpectationKind::EmptyRoute, source)
    }

    /// Expect the state after the step to equal the state before it with
    /// `modify` applied.
    #[track_caller]
    pub fn expect_state(self, modify: impl Fn(&mut C::State) + Send + Sync + 'static) -> Self {
        let source = Source::capture();
        self.expect(ExpectationKind::State(Arc::new(modify)), source)
    }

    /// Expect `predicate` to hold for the state after the step.
    #[track_caller]
    pub fn validate_state(
        self,
        name: impl Into<String>,
        predicate: impl Fn(&C::State) -> bool + Send + Sync + 'static,
    ) -> Self {
        let source = Source::capture();
        self.expect(
            ExpectationKind::Validate {
                name: name.into(),
                predicate: Arc::new(predicate),
            },
            source,
        )
    }

    /// Expect a mutation or binding write of `property`.
    #[track_caller]
    pub fn expect_mutation(self, property: impl Into<String>) -> Self {
        let source = Source::capture();
        self.expect(ExpectationKind::Mutation(property.into()), source)
    }
}

pub(crate) type RouteCheck<C> =
    Arc<dyn Fn(Option<&<C as Component>::Route>) -> Result<(), RouteMismatch> + Send + Sync>;

/// Why a route expectation failed.
pub(crate) struct RouteMismatch {
    pub(crate) message: String,
    pub(crate) diff: Option<Vec<String>>,
}

impl RouteMismatch {
    fn diff<T: Debug>(message: String, expected: &T, actual: &T) -> Self {
        Self {
            message,
            diff: Some(super::diff::state_diff(expected, actual)),
        }
    }
}

impl From<String> for RouteMismatch {
    fn from(message: String) -> Self {
        Self {
            message,
            diff: None,
        }
    }
}

pub(crate) struct Expectation<C: Component> {
    pub(crate) kind: ExpectationKind<C>,
    pub(crate) source: Source,
}

pub(crate) enum ExpectationKind<C: Component> {
    Output(C::Output),
    Task { name: String, success: bool },
    Route(RouteCheck<C>),
    EmptyRoute,
    State(Arc<dyn Fn(&mut C::State) + Send + Sync>),
    Validate {
        name: String,
        predicate: Arc<dyn Fn(&C::State) -> bool + Send + Sync>,
    },
    Mutation(String),
}

/// Type-erased binding write.
#[async_trait]
pub(crate) trait BindingWrite<C: Component>: Send + Sync {
    async fn apply(&self, store: &ComponentStore<C>, typing_delay: Duration, source: Source);
}

struct KeyPathWrite<C: Component, V> {
    key_path: KeyPath<C::State, V>,
    value: V,
}

#[async_trait]
impl<C, V> BindingWrite<C> for KeyPathWrite<C, V>
where
    C: Component,
    V: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    async fn apply(&self, store: &ComponentStore<C>, typing_delay: Duration, source: Source) {
        let text = (&self.value as &dyn Any).downcast_ref::<String>();
        let Some(text) = text.filter(|text| !typing_delay.is_zero() && !text.is_empty()) else {
            store
                .set_binding_at(self.key_path.clone(), self.value.clone(), source)
                .await;
            return;
        };

        for (index, ch) in text.char_indices() {
            let prefix = {
                let prefix: Box<dyn Any> = Box::new(text[..index + ch.len_utf8()].to_string());
                prefix.downcast::<V>().ok()
            };
            if let Some(prefix) = prefix {
                store
                    .set_binding_at(self.key_path.clone(), *prefix, source)
                    .await;
            }
            tokio::time::sleep(typing_delay).await;
        }
    }
}

/// Steps run against a child store of a different component type.
#[async_trait]
pub(crate) trait NestedSteps<C: Component>: Send + Sync {
    async fn run(
        &self,
        parent: &ComponentStore<C>,
        context: &TestContext,
        source: Source,
    ) -> Result<Vec<TestStepResult>, TestError>;
}

struct RouteSteps<C: Component, Child: Component> {
    case: RouteCase<C, Child>,
    steps: Vec<TestStep<Child>>,
}

#[async_trait]
impl<C: Component, Child: Component> NestedSteps<C> for RouteSteps<C, Child> {
    async fn run(
        &self,
        parent: &ComponentStore<C>,
        context: &TestContext,
        source: Source,
    ) -> Result<Vec<TestStepResult>, TestError> {
        let route = parent
            .route()
            .and_then(|route| (self.case)(&route))
            .ok_or_else(|| {
                TestError::new(format!("Route {} is not presented", Child::name()), source)
            })?;
        if !route.is_connected() {
            return Err(TestError::new(
                format!("Route {} was presented but never connected", Child::name()),
                source,
            ));
        }
        Ok(context.run_steps(&route.store(), &self.steps).await)
    }
}

struct ConnectionSteps<C: Component, Child: Component> {
    connect: Box<dyn Fn(&ComponentStore<C>) -> ViewModel<Child> + Send + Sync>,
    steps: Vec<TestStep<Child>>,
}

#[async_trait]
impl<C: Component, Child: Component> NestedSteps<C> for ConnectionSteps<C, Child> {
    async fn run(
        &self,
        parent: &ComponentStore<C>,
        context: &TestContext,
        _source: Source,
    ) -> Result<Vec<TestStepResult>, TestError> {
        let child = (self.connect)(parent);
        Ok(context.run_steps(child.store(), &self.steps).await)
    }
}
