use std::time::{Duration, Instant};

use tokio::sync::broadcast::error::TryRecvError;

use super::assertion::TestAssertion;
use super::diff::state_diff;
use super::result::{TestError, TestSnapshot, TestStepResult, TestWarning};
use super::step::{Expectation, ExpectationKind, StepKind, TestStep};
use crate::component::Component;
use crate::config::TestingConfig;
use crate::events::{Event, EventKind};
use crate::store::ComponentStore;

/// Settings shared by every step of one test run, nested steps included.
pub(crate) struct TestContext {
    config: TestingConfig,
    assertions: Vec<TestAssertion>,
}

impl TestContext {
    pub(crate) fn new(config: TestingConfig, assertions: Vec<TestAssertion>) -> Self {
        Self { config, assertions }
    }

    fn asserts(&self, assertion: TestAssertion) -> bool {
        self.assertions.contains(&assertion)
    }

    pub(crate) async fn run_steps<C: Component>(
        &self,
        store: &ComponentStore<C>,
        steps: &[TestStep<C>],
    ) -> Vec<TestStepResult> {
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            results.push(self.run_step(store, step).await);
        }
        results
    }

    async fn run_step<C: Component>(
        &self,
        store: &ComponentStore<C>,
        step: &TestStep<C>,
    ) -> TestStepResult {
        let started = Instant::now();
        let mut result =
            TestStepResult::new(step.title.clone(), store.path().clone(), step.source);
        let start_state = store.state();
        let uncontrolled_before = store.dependencies().uncontrolled();
        let mut receiver = store.events();

        tracing::debug!(path = %store.path(), step = %step.title, "Running test step");

        match &step.kind {
            StepKind::Appear { first } => {
                // Tracked by the store; awaited through `settle` below.
                drop(store.spawn_appear(*first, step.source));
            }
            StepKind::Disappear => store.disappear_at(step.source).await,
            StepKind::Action(action) => {
                store.process_action_at(action.clone(), step.source).await
            }
            StepKind::Input(input) => store.process_input_at(input.clone(), step.source).await,
            StepKind::Binding(write) => {
                let delay = Duration::from_millis(self.config.typing_delay_ms);
                write.apply(store, delay, step.source).await
            }
            StepKind::SetState(state) => store.set_state(state.clone()),
            StepKind::Dependency(apply) => apply(store.dependencies()),
            StepKind::Nested(nested) => match nested.run(store, self, step.source).await {
                Ok(children) => result.children = children,
                Err(error) => result.errors.push(error),
            },
            StepKind::Snapshot { name } => {
                result.snapshot = Some(TestSnapshot {
                    name: name.clone(),
                    path: store.path().clone(),
                    state: format!("{:#?}", store.state()),
                });
            }
            StepKind::Run(work) => work(store.clone()).await,
            StepKind::Wait(duration) => tokio::time::sleep(*duration).await,
        }

        let timeout = Duration::from_millis(self.config.settle_timeout_ms);
        if !store.settle(timeout).await {
            result.warnings.push(TestWarning::new(
                format!("Background work still running after {:?}", timeout),
                step.source,
            ));
        }

        let mut events = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) if event.store_id == store.id() => events.push(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    result.warnings.push(TestWarning::new(
                        format!("{} events were dropped before they could be checked", skipped),
                        step.source,
                    ));
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        let mut unmatched: Vec<&Event> = events.iter().collect();
        for expectation in &step.expectations {
            if let Err(error) = check_expectation(store, &start_state, &mut unmatched, expectation)
            {
                result.errors.push(error);
            }
        }

        for event in &unmatched {
            let message = match &event.kind {
                EventKind::Output(value) if self.asserts(TestAssertion::Output) => {
                    format!("Unexpected output {}", value.description())
                }
                EventKind::Task(task) if self.asserts(TestAssertion::Task) => {
                    if task.is_success() {
                        format!("Unexpected task success: {}", task.name)
                    } else {
                        format!("Unexpected task failure: {}", event.kind.details())
                    }
                }
                EventKind::Route(value) if self.asserts(TestAssertion::Route) => {
                    format!("Unexpected route {}", value.description())
                }
                _ => continue,
            };
            result.errors.push(TestError::new(message, event.source));
        }

        let nested = matches!(step.kind, StepKind::Nested(_));
        if self.asserts(TestAssertion::Dependency) && !nested {
            let uncontrolled = store.dependencies().uncontrolled();
            for name in uncontrolled.difference(&uncontrolled_before) {
                result.warnings.push(TestWarning::new(
                    format!("Uncontrolled dependency '{}' was used", name),
                    step.source,
                ));
            }
        }

        if self.config.step_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.step_delay_ms)).await;
        }

        result.events = events;
        result.duration = started.elapsed();
        if !result.errors.is_empty() {
            tracing::debug!(
                path = %store.path(),
                step = %step.title,
                errors = result.errors.len(),
                "Test step failed"
            );
        }
        result
    }
}

/// Remove the first event matching `matches`.
fn take_event(events: &mut Vec<&Event>, matches: impl Fn(&Event) -> bool) -> bool {
    match events.iter().position(|event| matches(event)) {
        Some(index) => {
            events.remove(index);
            true
        }
        None => false,
    }
}

fn check_expectation<C: Component>(
    store: &ComponentStore<C>,
    start_state: &C::State,
    events: &mut Vec<&Event>,
    expectation: &Expectation<C>,
) -> Result<(), TestError> {
    let source = expectation.source;
    match &expectation.kind {
        ExpectationKind::Output(output) => {
            if take_event(events, |event| event.output::<C::Output>() == Some(output)) {
                Ok(())
            } else {
                Err(TestError::new(format!("Expected output {:?}", output), source))
            }
        }
        ExpectationKind::Task { name, success } => {
            let found = take_event(events, |event| {
                event
                    .task()
                    .is_some_and(|task| task.name == *name && task.is_success() == *success)
            });
            if found {
                Ok(())
            } else {
                let outcome = if *success { "succeed" } else { "fail" };
                Err(TestError::new(
                    format!("Expected task '{}' to {}", name, outcome),
                    source,
                ))
            }
        }
        ExpectationKind::Route(check) => {
            let route = store.route();
            if let Err(mismatch) = check(route.as_ref()) {
                let error = TestError::new(mismatch.message, source);
                return Err(match mismatch.diff {
                    Some(diff) => error.with_diff(diff),
                    None => error,
                });
            }
            take_event(events, |event| matches!(event.kind, EventKind::Route(_)));
            Ok(())
        }
        ExpectationKind::EmptyRoute => {
            if let Some(route) = store.route() {
                return Err(TestError::new(
                    format!("Expected no route, found {:?}", route),
                    source,
                ));
            }
            take_event(events, |event| matches!(event.kind, EventKind::DismissRoute));
            Ok(())
        }
        ExpectationKind::State(modify) => {
            let mut expected = start_state.clone();
            modify(&mut expected);
            let actual = store.state();
            if actual == expected {
                Ok(())
            } else {
                Err(TestError::new("State mismatch", source)
                    .with_diff(state_diff(&expected, &actual)))
            }
        }
        ExpectationKind::Validate { name, predicate } => {
            if store.read(|state| predicate(state)) {
                Ok(())
            } else {
                Err(TestError::new(
                    format!("State validation '{}' failed", name),
                    source,
                ))
            }
        }
        ExpectationKind::Mutation(property) => {
            let found = take_event(events, |event| match &event.kind {
                EventKind::Mutation(mutation) | EventKind::Binding(mutation) => {
                    mutation.property == *property
                }
                _ => false,
            });
            if found {
                Ok(())
            } else {
                Err(TestError::new(
                    format!("Expected mutation of '{}'", property),
                    source,
                ))
            }
        }
    }
}
