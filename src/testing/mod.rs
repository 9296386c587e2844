//! Scripted component tests.
//!
//! A [`Test`] pairs an initial state with a list of [`TestStep`]s. The
//! [`TestRunner`] replays the steps against a fresh store, collects the
//! events each step produced and checks them against the step's
//! expectations and the configured blanket [`TestAssertion`]s:
//!
//! ```text
//! step ──→ store ──→ settle ──→ events of this store
//!                                   │
//!               expectations ───────┤ (matched events are consumed)
//!               assertions ─────────┘ (leftover outputs/tasks/routes fail)
//! ```

mod assertion;
mod context;
mod diff;
mod result;
mod runner;
mod step;
mod test;

pub use assertion::TestAssertion;
pub use diff::state_diff;
pub use result::{
    Coverage, SuiteResult, TestError, TestResult, TestSnapshot, TestStepResult, TestWarning,
};
pub use runner::TestRunner;
pub use step::TestStep;
pub use test::Test;
