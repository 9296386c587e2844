use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::Notify;

use crate::events::{Mutation, StoreId};

tokio::task_local! {
    static SPAN_MUTATIONS: Arc<MutationBuffer>;
}

/// Count of events in progress on one store.
#[derive(Default)]
pub(crate) struct SpanDepth {
    depth: AtomicUsize,
}

impl SpanDepth {
    pub(crate) fn open(&self) -> usize {
        self.depth.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Close one span and return the remaining depth.
    ///
    /// Panics when no span is open: an unbalanced close is a bug in the
    /// store, not a recoverable condition.
    pub(crate) fn close(&self) -> usize {
        match self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
                depth.checked_sub(1)
            }) {
            Ok(previous) => previous - 1,
            Err(_) => panic!("event depth went negative: sendEvent without matching startEvent"),
        }
    }

    pub(crate) fn current(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

/// Turn-taking for the handlers of one store tree.
///
/// The lock is held only while a handler future is polled, so handlers
/// interleave at `.await` points while their synchronous sections never
/// overlap. It is reentrant because a handler polls the spans of nested
/// stores of the same tree on its own thread.
#[derive(Default)]
pub(crate) struct SerialGate {
    turn: ReentrantMutex<()>,
}

impl SerialGate {
    pub(crate) async fn run<F: Future>(&self, work: F) -> F::Output {
        let mut work = std::pin::pin!(work);
        std::future::poll_fn(|cx| {
            let _turn = self.turn.lock();
            work.as_mut().poll(cx)
        })
        .await
    }
}

/// Mutations recorded by one action, input or lifecycle span.
///
/// Installed as a task-local for the span's work, so concurrent spans of
/// the same store never see each other's mutations.
pub(crate) struct MutationBuffer {
    store: StoreId,
    mutations: Mutex<Vec<Mutation>>,
}

impl MutationBuffer {
    pub(crate) fn new(store: StoreId) -> Arc<Self> {
        Arc::new(Self {
            store,
            mutations: Mutex::new(Vec::new()),
        })
    }

    /// Run `work` with this buffer collecting its mutations.
    pub(crate) async fn scope<F: Future>(self: &Arc<Self>, work: F) -> F::Output {
        SPAN_MUTATIONS.scope(Arc::clone(self), work).await
    }

    /// Append to the innermost span's buffer if that span belongs to `store`.
    pub(crate) fn record(store: StoreId, mutation: &Mutation) {
        let _ = SPAN_MUTATIONS.try_with(|buffer| {
            if buffer.store == store {
                buffer.mutations.lock().push(mutation.clone());
            }
        });
    }

    pub(crate) fn take(&self) -> Vec<Mutation> {
        std::mem::take(&mut *self.mutations.lock())
    }
}

/// Fire-and-forget work spawned by a store tree.
///
/// Shared by every store scoped from the same root so a caller can wait
/// for the whole tree to go idle.
#[derive(Default)]
pub(crate) struct InFlight {
    count: AtomicUsize,
    notify: Notify,
}

impl InFlight {
    pub(crate) fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait until no work is in flight. Returns false on timeout.
    pub(crate) async fn idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register before checking the count so a wakeup between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.count() == 0;
            }
        }
    }
}

/// Decrements the in-flight count on drop, including on cancellation.
pub(crate) struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let _ = self
            .0
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(v.saturating_sub(1)));
        self.0.notify.notify_waiters();
    }
}
