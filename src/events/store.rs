use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::event::Event;
use crate::path::ComponentPath;

const SUBSCRIBER_BUFFER: usize = 1024;

/// Append-only sink of events emitted by every store of a runtime.
///
/// Created once per application or test run and handed to stores at
/// construction. Holds at most `capacity` events; the oldest are evicted
/// first.
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<EventStoreInner>,
}

struct EventStoreInner {
    capacity: usize,
    events: RwLock<VecDeque<Event>>,
    sender: broadcast::Sender<Event>,
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            inner: Arc::new(EventStoreInner {
                capacity: capacity.max(1),
                events: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
                sender,
            }),
        }
    }

    pub fn push(&self, event: Event) {
        {
            let mut events = self.inner.events.write();
            if events.len() == self.inner.capacity {
                events.pop_front();
            }
            events.push_back(event.clone());
        }
        // No subscribers is fine.
        let _ = self.inner.sender.send(event);
    }

    /// Live feed of events pushed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.sender.subscribe()
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.events.read().iter().cloned().collect()
    }

    /// Events emitted at `path`, optionally including its descendants.
    pub fn events_for(&self, path: &ComponentPath, include_children: bool) -> Vec<Event> {
        self.inner
            .events
            .read()
            .iter()
            .filter(|event| {
                if include_children {
                    event.path.contains(path)
                } else {
                    &event.path == path
                }
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.events.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, Source, ViewEvent};
    use std::time::SystemTime;
    use uuid::Uuid;

    fn event(path: ComponentPath) -> Event {
        Event {
            id: Uuid::new_v4(),
            kind: EventKind::View(ViewEvent::Body),
            path,
            store_id: Uuid::new_v4(),
            component: "Test",
            start: SystemTime::now(),
            end: SystemTime::now(),
            mutations: Vec::new(),
            depth: 0,
            source: Source::capture(),
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let store = EventStore::new(2);
        let first = event(ComponentPath::new("A"));
        let first_id = first.id;
        store.push(first);
        store.push(event(ComponentPath::new("B")));
        store.push(event(ComponentPath::new("C")));

        let events = store.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.id != first_id));
    }

    #[test]
    fn events_for_filters_by_path() {
        let store = EventStore::new(10);
        let root = ComponentPath::new("App");
        store.push(event(root.clone()));
        store.push(event(root.appending("Detail")));
        store.push(event(ComponentPath::new("Other")));

        assert_eq!(store.events_for(&root, false).len(), 1);
        assert_eq!(store.events_for(&root, true).len(), 2);
    }

    #[tokio::test]
    async fn subscribers_receive_pushed_events() {
        let store = EventStore::new(10);
        let mut receiver = store.subscribe();
        store.push(event(ComponentPath::new("App")));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.path.string(), "App");
        store.clear();
        assert!(store.is_empty());
    }
}
