use serde::{Deserialize, Serialize};

/// Blanket check applied to every step of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestAssertion {
    /// Every output must be matched by an `expect_output`.
    Output,
    /// Every task result must be matched by an `expect_task`.
    Task,
    /// Every presented route must be matched by an `expect_route`.
    Route,
    /// Dependencies read without an override produce a warning.
    Dependency,
}

const ALL: [TestAssertion; 4] = [
    TestAssertion::Output,
    TestAssertion::Task,
    TestAssertion::Route,
    TestAssertion::Dependency,
];

impl TestAssertion {
    pub fn all() -> &'static [TestAssertion] {
        &ALL
    }
}
