use std::any::Any;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::path::ComponentPath;

/// Identifier of a live store.
pub type StoreId = Uuid;

/// Code location that started an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Source {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl Source {
    /// Location of the caller, propagated through `#[track_caller]` functions.
    #[track_caller]
    pub fn capture() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for Source {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Type-erased value carried by an event (an action, output, route, ...).
///
/// Keeps the `Debug` rendering for logs and diffs and the original value
/// for typed comparisons via [`EventValue::downcast_ref`].
#[derive(Clone)]
pub struct EventValue {
    type_name: &'static str,
    description: String,
    value: Arc<dyn Any + Send + Sync>,
}

impl EventValue {
    pub fn new<T: fmt::Debug + Send + Sync + 'static>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            description: format!("{:?}", value),
            value: Arc::new(value),
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// `Debug` rendering of the value.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Enum variant name (or the whole description for non-enum values).
    pub fn case_name(&self) -> &str {
        case_name(&self.description)
    }
}

impl fmt::Debug for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Leading identifier of a `Debug` rendering: `Load { id: 1 }` -> `Load`.
pub fn case_name(description: &str) -> &str {
    let end = description
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(description.len());
    if end == 0 {
        description
    } else {
        &description[..end]
    }
}

/// A keyed write to component state.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub id: Uuid,
    /// Dotted property name of the written field.
    pub property: String,
    pub value: EventValue,
    pub old_value: EventValue,
    /// Whole state before the write, used for diffing.
    pub old_state: EventValue,
}

impl Mutation {
    pub fn new<S, V>(property: impl Into<String>, value: &V, old_value: &V, old_state: &S) -> Self
    where
        S: Clone + fmt::Debug + Send + Sync + 'static,
        V: Clone + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            property: property.into(),
            value: EventValue::new(value.clone()),
            old_value: EventValue::new(old_value.clone()),
            old_state: EventValue::new(old_state.clone()),
        }
    }

    pub fn value<V: 'static>(&self) -> Option<&V> {
        self.value.downcast_ref::<V>()
    }

    pub fn old_value<V: 'static>(&self) -> Option<&V> {
        self.old_value.downcast_ref::<V>()
    }
}

/// Lifecycle events reported by a view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    Appear { first: bool },
    Disappear,
    Body,
}

/// Outcome of a store task.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub name: String,
    pub result: Result<EventValue, Arc<anyhow::Error>>,
}

impl TaskEvent {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// What happened in an event.
#[derive(Debug, Clone)]
pub enum EventKind {
    Action(EventValue),
    Input(EventValue),
    Binding(Mutation),
    Mutation(Mutation),
    Output(EventValue),
    Task(TaskEvent),
    Route(EventValue),
    DismissRoute,
    View(ViewEvent),
}

impl EventKind {
    pub fn title(&self) -> &'static str {
        match self {
            EventKind::Action(_) => "Action",
            EventKind::Input(_) => "Input",
            EventKind::Binding(_) => "Binding",
            EventKind::Mutation(_) => "Mutation",
            EventKind::Output(_) => "Output",
            EventKind::Task(_) => "Task",
            EventKind::Route(_) => "Route",
            EventKind::DismissRoute => "Dismiss Route",
            EventKind::View(ViewEvent::Appear { .. }) => "Appear",
            EventKind::View(ViewEvent::Disappear) => "Disappear",
            EventKind::View(ViewEvent::Body) => "Body",
        }
    }

    pub fn details(&self) -> String {
        match self {
            EventKind::Action(value)
            | EventKind::Input(value)
            | EventKind::Output(value)
            | EventKind::Route(value) => value.description().to_string(),
            EventKind::Binding(mutation) | EventKind::Mutation(mutation) => {
                format!("{} = {}", mutation.property, mutation.value.description())
            }
            EventKind::Task(task) => match &task.result {
                Ok(_) => format!("{} succeeded", task.name),
                Err(error) => format!("{} failed: {}", task.name, error),
            },
            EventKind::DismissRoute => String::new(),
            EventKind::View(ViewEvent::Appear { first }) => {
                if *first {
                    "first".to_string()
                } else {
                    String::new()
                }
            }
            EventKind::View(_) => String::new(),
        }
    }
}

/// Immutable record of one store operation.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: Uuid,
    pub kind: EventKind,
    pub path: ComponentPath,
    pub store_id: StoreId,
    pub component: &'static str,
    pub start: SystemTime,
    pub end: SystemTime,
    pub mutations: Vec<Mutation>,
    /// Number of events still in progress on the emitting store.
    pub depth: usize,
    pub source: Source,
}

impl Event {
    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.start).unwrap_or_default()
    }

    pub fn output<T: 'static>(&self) -> Option<&T> {
        match &self.kind {
            EventKind::Output(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn action<T: 'static>(&self) -> Option<&T> {
        match &self.kind {
            EventKind::Action(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn input<T: 'static>(&self) -> Option<&T> {
        match &self.kind {
            EventKind::Input(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn mutation(&self) -> Option<&Mutation> {
        match &self.kind {
            EventKind::Mutation(mutation) => Some(mutation),
            _ => None,
        }
    }

    pub fn task(&self) -> Option<&TaskEvent> {
        match &self.kind {
            EventKind::Task(task) => Some(task),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details = self.kind.details();
        write!(f, "{} {}", self.path, self.kind.title())?;
        if !details.is_empty() {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Load { id: u32 },
        Refresh,
        Select(String),
    }

    #[test]
    fn case_name_strips_payload() {
        assert_eq!(EventValue::new(Action::Load { id: 1 }).case_name(), "Load");
        assert_eq!(EventValue::new(Action::Refresh).case_name(), "Refresh");
        assert_eq!(
            EventValue::new(Action::Select("a".into())).case_name(),
            "Select"
        );
        assert_eq!(case_name("\"text\""), "\"text\"");
    }

    #[test]
    fn event_value_downcasts_to_original_type() {
        let value = EventValue::new(Action::Refresh);
        assert_eq!(value.downcast_ref::<Action>(), Some(&Action::Refresh));
        assert!(value.downcast_ref::<String>().is_none());
        assert!(value.is::<Action>());
    }

    #[test]
    fn mutation_keeps_old_and_new_values() {
        let mutation = Mutation::new("count", &1_i32, &0_i32, &(0_i32, "state"));
        assert_eq!(mutation.value::<i32>(), Some(&1));
        assert_eq!(mutation.old_value::<i32>(), Some(&0));
        assert_eq!(mutation.old_state.description(), "(0, \"state\")");
    }

    #[test]
    fn task_details_include_error() {
        let kind = EventKind::Task(TaskEvent {
            name: "load".to_string(),
            result: Err(Arc::new(anyhow::anyhow!("offline"))),
        });
        assert_eq!(kind.title(), "Task");
        assert_eq!(kind.details(), "load failed: offline");
    }
}
