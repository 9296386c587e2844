use std::io::Write;

use component_store::config::{ConfigError, RuntimeConfig, CONFIG_PATH_ENV};
use component_store::testing::{TestAssertion, TestRunner};
use component_store::ComponentRuntime;

/// Test that RuntimeConfig::default() produces the documented values.
#[test]
fn test_config_default_values() {
    let config = RuntimeConfig::default();

    assert_eq!(config.events.capacity, 10_000);
    assert!(!config.logging.log_events);
    assert!(!config.logging.log_child_events);
    assert!(config.testing.suppress_global_events);
    assert_eq!(config.testing.step_delay_ms, 0);
    assert_eq!(config.testing.typing_delay_ms, 0);
    assert_eq!(config.testing.settle_timeout_ms, 1000);
    assert_eq!(config.testing.assertions, TestAssertion::all().to_vec());
}

/// Test that the env override selects the config file for every loader.
#[test]
fn test_env_override_is_used_by_runtime_and_runner() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[events]\ncapacity = 5\n\n[testing]\nsuppress_global_events = false\nassertions = []"
    )
    .unwrap();
    std::env::set_var(CONFIG_PATH_ENV, file.path());

    assert_eq!(RuntimeConfig::config_path(), file.path());

    let runtime = ComponentRuntime::load().unwrap();
    assert_eq!(runtime.config().events.capacity, 5);
    assert!(!runtime.suppresses_global_events());

    let runner = TestRunner::from_config().unwrap();
    assert!(runner.config().testing.assertions.is_empty());
    assert!(!runner.config().testing.suppress_global_events);

    std::env::remove_var(CONFIG_PATH_ENV);
}

/// Test validation fails for a zero settle timeout.
#[test]
fn test_validation_fails_zero_settle_timeout() {
    let mut config = RuntimeConfig::default();
    config.testing.settle_timeout_ms = 0;

    let result = config.validate();
    assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
}

/// Test that for_testing honours the suppression flag while new never suppresses.
#[test]
fn test_testing_runtime_suppresses_global_events() {
    assert!(ComponentRuntime::for_testing(RuntimeConfig::default()).suppresses_global_events());
    assert!(!ComponentRuntime::new(RuntimeConfig::default()).suppresses_global_events());
}
