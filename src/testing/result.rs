use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::events::{Event, EventKind, Source};
use crate::path::ComponentPath;

/// An unmet expectation or assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct TestError {
    pub message: String,
    /// Line diff between expected and actual, when one applies.
    pub diff: Option<Vec<String>>,
    pub source: Source,
}

impl TestError {
    pub fn new(message: impl Into<String>, source: Source) -> Self {
        Self {
            message: message.into(),
            diff: None,
            source,
        }
    }

    pub fn with_diff(mut self, diff: Vec<String>) -> Self {
        self.diff = Some(diff);
        self
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.source)?;
        if let Some(diff) = &self.diff {
            for line in diff {
                write!(f, "\n{}", line)?;
            }
        }
        Ok(())
    }
}

/// A finding that does not fail the test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestWarning {
    pub message: String,
    pub source: Source,
}

impl TestWarning {
    pub fn new(message: impl Into<String>, source: Source) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for TestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.source)
    }
}

/// State captured by a snapshot step.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSnapshot {
    pub name: String,
    pub path: ComponentPath,
    /// Pretty `Debug` rendering of the state.
    pub state: String,
}

/// Outcome of one step, including nested route or connection steps.
#[derive(Debug, Clone)]
pub struct TestStepResult {
    pub title: String,
    pub path: ComponentPath,
    pub source: Source,
    /// Events the step's store emitted during the step.
    pub events: Vec<Event>,
    pub errors: Vec<TestError>,
    pub warnings: Vec<TestWarning>,
    pub children: Vec<TestStepResult>,
    pub snapshot: Option<TestSnapshot>,
    pub duration: Duration,
}

impl TestStepResult {
    pub(crate) fn new(title: String, path: ComponentPath, source: Source) -> Self {
        Self {
            title,
            path,
            source,
            events: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            children: Vec::new(),
            snapshot: None,
            duration: Duration::ZERO,
        }
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty() && self.children.iter().all(TestStepResult::success)
    }

    /// Errors of this step and all nested steps.
    pub fn all_errors(&self) -> Vec<&TestError> {
        let mut errors: Vec<&TestError> = self.errors.iter().collect();
        for child in &self.children {
            errors.extend(child.all_errors());
        }
        errors
    }

    pub fn all_warnings(&self) -> Vec<&TestWarning> {
        let mut warnings: Vec<&TestWarning> = self.warnings.iter().collect();
        for child in &self.children {
            warnings.extend(child.all_warnings());
        }
        warnings
    }

    pub fn snapshots(&self) -> Vec<&TestSnapshot> {
        let mut snapshots: Vec<&TestSnapshot> = self.snapshot.iter().collect();
        for child in &self.children {
            snapshots.extend(child.snapshots());
        }
        snapshots
    }
}

/// What a test, or a whole suite, exercised of a component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    pub actions: BTreeSet<String>,
    pub inputs: BTreeSet<String>,
    pub outputs: BTreeSet<String>,
    pub routes: BTreeSet<String>,
    pub dependencies: BTreeSet<String>,
}

impl Coverage {
    pub(crate) fn record(&mut self, event: &Event) {
        match &event.kind {
            EventKind::Action(value) => {
                self.actions.insert(value.case_name().to_string());
            }
            EventKind::Input(value) => {
                self.inputs.insert(value.case_name().to_string());
            }
            EventKind::Output(value) => {
                self.outputs.insert(value.case_name().to_string());
            }
            EventKind::Route(value) => {
                self.routes.insert(value.case_name().to_string());
            }
            _ => {}
        }
    }

    pub fn merge(&mut self, other: &Coverage) {
        self.actions.extend(other.actions.iter().cloned());
        self.inputs.extend(other.inputs.iter().cloned());
        self.outputs.extend(other.outputs.iter().cloned());
        self.routes.extend(other.routes.iter().cloned());
        self.dependencies.extend(other.dependencies.iter().cloned());
    }
}

/// Outcome of one test.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub component: &'static str,
    pub source: Source,
    pub steps: Vec<TestStepResult>,
    pub coverage: Coverage,
    pub duration: Duration,
}

impl TestResult {
    pub fn success(&self) -> bool {
        self.steps.iter().all(TestStepResult::success)
    }

    pub fn errors(&self) -> Vec<&TestError> {
        self.steps.iter().flat_map(TestStepResult::all_errors).collect()
    }

    pub fn warnings(&self) -> Vec<&TestWarning> {
        self.steps
            .iter()
            .flat_map(TestStepResult::all_warnings)
            .collect()
    }

    /// Human-readable report: one line per step, errors and warnings
    /// indented beneath it.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} {}: {} ({} steps, {:?})\n",
            if self.success() { "PASS" } else { "FAIL" },
            self.component,
            self.name,
            self.steps.len(),
            self.duration,
        );
        for step in &self.steps {
            write_step(&mut out, step, 1);
        }
        out
    }
}

fn write_step(out: &mut String, step: &TestStepResult, indent: usize) {
    let pad = "  ".repeat(indent);
    let mark = if step.success() { "✓" } else { "✗" };
    out.push_str(&format!("{}{} {}\n", pad, mark, step.title));
    for error in &step.errors {
        for line in error.to_string().lines() {
            out.push_str(&format!("{}    {}\n", pad, line));
        }
    }
    for warning in &step.warnings {
        out.push_str(&format!("{}    warning: {}\n", pad, warning));
    }
    for child in &step.children {
        write_step(out, child, indent + 1);
    }
}

/// Outcome of every test of one component.
#[derive(Debug, Clone)]
pub struct SuiteResult {
    pub results: Vec<TestResult>,
    pub coverage: Coverage,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.results.iter().all(TestResult::success)
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|result| result.success()).count()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            out.push_str(&result.summary());
        }
        out.push_str(&format!(
            "{}/{} tests passed\n",
            self.passed(),
            self.results.len()
        ));
        out
    }
}
