use std::sync::Arc;

use super::assertion::TestAssertion;
use super::step::TestStep;
use crate::component::Component;
use crate::dependencies::{Dependencies, DependencyKey};
use crate::events::Source;

type DependencySetup = Arc<dyn Fn(&Dependencies) + Send + Sync>;

/// A named script of steps run against a fresh store.
pub struct Test<C: Component> {
    pub(crate) name: String,
    pub(crate) state: C::State,
    pub(crate) steps: Vec<TestStep<C>>,
    pub(crate) assertions: Option<Vec<TestAssertion>>,
    pub(crate) dependencies: Vec<DependencySetup>,
    pub(crate) source: Source,
}

impl<C: Component> Test<C> {
    #[track_caller]
    pub fn new(name: impl Into<String>, state: C::State, steps: Vec<TestStep<C>>) -> Self {
        Self {
            name: name.into(),
            state,
            steps,
            assertions: None,
            dependencies: Vec::new(),
            source: Source::capture(),
        }
    }

    /// Replace the configured blanket assertions for this test.
    pub fn assertions(mut self, assertions: Vec<TestAssertion>) -> Self {
        self.assertions = Some(assertions);
        self
    }

    /// Override one dependency before the first step.
    pub fn dependency<K: DependencyKey>(self, value: K::Value) -> Self {
        self.dependencies(move |dependencies| dependencies.set::<K>(value.clone()))
    }

    /// Configure dependencies before the first step.
    pub fn dependencies(
        mut self,
        setup: impl Fn(&Dependencies) + Send + Sync + 'static,
    ) -> Self {
        self.dependencies.push(Arc::new(setup));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
