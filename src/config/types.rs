use serde::{Deserialize, Serialize};

use crate::testing::TestAssertion;

/// Root configuration container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub testing: TestingConfig,
}

/// Global event sink settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Maximum number of events retained by the global sink (default: 10000).
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

/// Event logging settings applied to every store of a runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log every sealed event of a store (default: false).
    #[serde(default)]
    pub log_events: bool,
    /// Also log events forwarded from child stores (default: false).
    #[serde(default)]
    pub log_child_events: bool,
}

/// Settings used by the test engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestingConfig {
    /// Keep test replay events out of the global sink (default: true).
    #[serde(default = "default_suppress_global_events")]
    pub suppress_global_events: bool,
    /// Pause between steps in milliseconds (default: 0).
    #[serde(default)]
    pub step_delay_ms: u64,
    /// Per-character delay for string binding steps in milliseconds (default: 0, atomic write).
    #[serde(default)]
    pub typing_delay_ms: u64,
    /// How long a step waits for spawned work to finish (default: 1000).
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
    /// Blanket assertions run after every step unless a test overrides them.
    #[serde(default = "default_assertions")]
    pub assertions: Vec<TestAssertion>,
}

fn default_event_capacity() -> usize {
    10_000
}

fn default_suppress_global_events() -> bool {
    true
}

fn default_settle_timeout_ms() -> u64 {
    1000
}

fn default_assertions() -> Vec<TestAssertion> {
    TestAssertion::all().to_vec()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            events: EventsConfig::default(),
            logging: LoggingConfig::default(),
            testing: TestingConfig::default(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_events: false,
            log_child_events: false,
        }
    }
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            suppress_global_events: default_suppress_global_events(),
            step_delay_ms: 0,
            typing_delay_ms: 0,
            settle_timeout_ms: default_settle_timeout_ms(),
            assertions: default_assertions(),
        }
    }
}
