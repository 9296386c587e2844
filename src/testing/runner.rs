use std::time::Instant;

use super::context::TestContext;
use super::result::{Coverage, SuiteResult, TestResult};
use super::test::Test;
use crate::component::Component;
use crate::config::{ConfigError, RuntimeConfig};
use crate::dependencies::DependencyContext;
use crate::runtime::ComponentRuntime;
use crate::store::ComponentStore;

/// Runs [`Test`]s, each against a fresh store in its own runtime.
#[derive(Debug, Clone, Default)]
pub struct TestRunner {
    config: RuntimeConfig,
}

impl TestRunner {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Runner configured from the user config file.
    pub fn from_config() -> Result<Self, ConfigError> {
        Ok(Self::new(RuntimeConfig::load()?))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub async fn run<C: Component>(&self, test: &Test<C>) -> TestResult {
        let started = Instant::now();
        let runtime = ComponentRuntime::for_testing(self.config.clone());
        let store = ComponentStore::with_context(
            C::default(),
            test.state.clone(),
            &runtime,
            DependencyContext::Test,
        );
        for setup in &test.dependencies {
            setup(store.dependencies());
        }

        tracing::info!(component = C::name(), test = %test.name, "Running test");

        let assertions = test
            .assertions
            .clone()
            .unwrap_or_else(|| self.config.testing.assertions.clone());
        let context = TestContext::new(self.config.testing.clone(), assertions);
        let steps = context.run_steps(&store, &test.steps).await;

        let mut coverage = Coverage::default();
        for event in steps.iter().flat_map(|step| step.events.iter()) {
            coverage.record(event);
        }
        coverage.dependencies = store
            .dependencies()
            .accessed()
            .into_iter()
            .map(str::to_string)
            .collect();

        store.dispose();

        let result = TestResult {
            name: test.name.clone(),
            component: C::name(),
            source: test.source,
            steps,
            coverage,
            duration: started.elapsed(),
        };
        if result.success() {
            tracing::info!(component = C::name(), test = %test.name, "Test passed");
        } else {
            tracing::warn!(
                component = C::name(),
                test = %test.name,
                errors = result.errors().len(),
                "Test failed"
            );
        }
        result
    }

    /// Run every test in order and merge their coverage.
    pub async fn run_suite<C: Component>(&self, tests: &[Test<C>]) -> SuiteResult {
        let mut results = Vec::with_capacity(tests.len());
        let mut coverage = Coverage::default();
        for test in tests {
            let result = self.run(test).await;
            coverage.merge(&result.coverage);
            results.push(result);
        }
        SuiteResult { results, coverage }
    }
}
