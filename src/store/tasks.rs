use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct TaskEntry {
    id: Uuid,
    name: String,
    token: CancellationToken,
}

/// Handle to one registered task run.
pub(crate) struct TaskTicket {
    pub(crate) key: String,
    pub(crate) id: Uuid,
    pub(crate) token: CancellationToken,
}

/// Running tasks of one store, keyed by name (or a random id for
/// anonymous tasks). Every entry remembers its display name.
#[derive(Default)]
pub(crate) struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl TaskRegistry {
    /// Register a named task. A running task under the same name is
    /// cancelled before the new one is recorded.
    pub(crate) fn register(&self, name: &str, parent: &CancellationToken) -> TaskTicket {
        self.insert(name.to_string(), name, parent)
    }

    /// Register a task that nothing else can replace.
    pub(crate) fn register_anonymous(&self, name: &str, parent: &CancellationToken) -> TaskTicket {
        self.insert(Uuid::new_v4().to_string(), name, parent)
    }

    fn insert(&self, key: String, name: &str, parent: &CancellationToken) -> TaskTicket {
        let ticket = TaskTicket {
            key,
            id: Uuid::new_v4(),
            token: parent.child_token(),
        };
        let previous = self.tasks.lock().insert(
            ticket.key.clone(),
            TaskEntry {
                id: ticket.id,
                name: name.to_string(),
                token: ticket.token.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(task = name, "Cancelling previous task run");
            previous.token.cancel();
        }
        ticket
    }

    /// Drop the registry entry of a finished run. A newer run under the same
    /// name is left alone.
    pub(crate) fn finish(&self, ticket: &TaskTicket) {
        let mut tasks = self.tasks.lock();
        if tasks.get(&ticket.key).is_some_and(|entry| entry.id == ticket.id) {
            tasks.remove(&ticket.key);
        }
    }

    pub(crate) fn cancel(&self, name: &str) -> bool {
        match self.tasks.lock().remove(name) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&self) {
        let drained: Vec<TaskEntry> = self.tasks.lock().drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            entry.token.cancel();
        }
    }

    /// Whether any run, cancellable or anonymous, is registered under the
    /// display name `name`.
    pub(crate) fn is_running(&self, name: &str) -> bool {
        self.tasks.lock().values().any(|entry| entry.name == name)
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_cancels_previous_run() {
        let registry = TaskRegistry::default();
        let root = CancellationToken::new();

        let first = registry.register("load", &root);
        let second = registry.register("load", &root);

        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert_eq!(registry.len(), 1);

        // The stale run finishing must not evict the new one.
        registry.finish(&first);
        assert!(registry.is_running("load"));
        registry.finish(&second);
        assert!(!registry.is_running("load"));
    }

    #[test]
    fn anonymous_tasks_are_independent() {
        let registry = TaskRegistry::default();
        let root = CancellationToken::new();
        let a = registry.register_anonymous("tick", &root);
        let b = registry.register_anonymous("tick", &root);
        assert_ne!(a.key, b.key);
        assert_eq!(registry.len(), 2);
        assert!(!a.token.is_cancelled());
        assert!(registry.is_running("tick"));

        registry.finish(&a);
        assert!(registry.is_running("tick"));

        registry.cancel_all();
        assert!(!a.token.is_cancelled());
        assert!(b.token.is_cancelled());
        assert_eq!(registry.len(), 0);
        assert!(!registry.is_running("tick"));
    }

    #[test]
    fn parent_cancellation_reaches_tasks() {
        let registry = TaskRegistry::default();
        let root = CancellationToken::new();
        let ticket = registry.register("sync", &root);
        root.cancel();
        assert!(ticket.token.is_cancelled());
    }

    #[test]
    fn cancel_by_name() {
        let registry = TaskRegistry::default();
        let root = CancellationToken::new();
        let ticket = registry.register("poll", &root);
        assert!(registry.cancel("poll"));
        assert!(ticket.token.is_cancelled());
        assert!(!registry.cancel("poll"));
    }
}
