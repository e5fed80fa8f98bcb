//! Outgoing request tracking.
//!
//! Every locally originated request gets a fresh id and a single-assignment
//! result slot. A response frame fills the slot with the matching id; a
//! closing connection fills every remaining slot with `ConnectionClosed`.

use crate::error::TransportError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tether_core::ResponseMessage;
use tokio::sync::oneshot;

type ResultSlot = oneshot::Sender<Result<ResponseMessage, TransportError>>;

struct PendingRequest {
    created_at: Instant,
    slot: ResultSlot,
}

/// Id allocation and pending-response bookkeeping.
///
/// Not synchronized; the connection keeps it behind its state lock.
#[derive(Default)]
pub(crate) struct OutgoingRequestTracker {
    last_id: u64,
    pending: HashMap<u64, PendingRequest>,
}

impl OutgoingRequestTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Next correlation id. Ids are never reused for the life of the
    /// tracker, across reconnects included.
    pub(crate) fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    /// Allocate an id and a pending slot for it.
    pub(crate) fn register(&mut self) -> (u64, ResponseHandle) {
        let id = self.next_id();
        let (slot, receiver) = oneshot::channel();
        self.pending.insert(
            id,
            PendingRequest {
                created_at: Instant::now(),
                slot,
            },
        );
        (id, ResponseHandle { id, receiver })
    }

    /// Forget a registration whose frame never made it out.
    pub(crate) fn cancel(&mut self, id: u64) {
        self.pending.remove(&id);
    }

    /// Resolve the pending entry matching `response.id`. Returns false, and
    /// drops the response, when nothing is waiting for that id.
    pub(crate) fn resolve(&mut self, response: ResponseMessage) -> bool {
        let Some(pending) = self.pending.remove(&response.id) else {
            return false;
        };
        tracing::debug!(
            id = response.id,
            status = response.status,
            elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
            "response matched"
        );
        // The caller may have dropped its handle; that is not our problem.
        let _ = pending.slot.send(Ok(response));
        true
    }

    /// Fail every pending entry with `error`. Returns how many there were.
    pub(crate) fn fail_all(&mut self, error: TransportError) -> usize {
        let count = self.pending.len();
        for (_, pending) in self.pending.drain() {
            let _ = pending.slot.send(Err(error.clone()));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// The eventual outcome of a sent request.
///
/// Await it, bound it with [`with_timeout`](Self::with_timeout), or block on
/// it from synchronous code with [`blocking_wait`](Self::blocking_wait).
/// Dropping the handle abandons the request; a late response is discarded.
#[derive(Debug)]
pub struct ResponseHandle {
    id: u64,
    receiver: oneshot::Receiver<Result<ResponseMessage, TransportError>>,
}

impl ResponseHandle {
    /// Correlation id the request went out with.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait at most `timeout`. The transport keeps no record of the give-up;
    /// a response arriving later is dropped as unmatched.
    pub async fn with_timeout(self, timeout: Duration) -> Result<ResponseMessage, TransportError> {
        tokio::time::timeout(timeout, self)
            .await
            .unwrap_or(Err(TransportError::TimedOut))
    }

    /// Block the current thread until the outcome is known.
    ///
    /// Panics on an async worker thread. From async code, `.await` the
    /// handle instead, or move the wait off the worker with
    /// `tokio::task::spawn_blocking` (or `tokio::task::block_in_place` on a
    /// multi-threaded runtime).
    pub fn blocking_wait(self) -> Result<ResponseMessage, TransportError> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(TransportError::ConnectionClosed))
    }
}

impl Future for ResponseHandle {
    type Output = Result<ResponseMessage, TransportError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(TransportError::ConnectionClosed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut tracker = OutgoingRequestTracker::new();
        let (a, _ha) = tracker.register();
        let b = tracker.next_id();
        let (c, _hc) = tracker.register();
        assert!(a < b && b < c);
        assert_eq!(tracker.len(), 2);
    }

    #[tokio::test]
    async fn responses_reach_their_own_caller() {
        let mut tracker = OutgoingRequestTracker::new();
        let handles: Vec<_> = (0..8).map(|_| tracker.register()).collect();

        for (id, _) in handles.iter().rev() {
            let response = ResponseMessage::new(*id, 200).with_body(id.to_string());
            assert!(tracker.resolve(response));
        }
        assert_eq!(tracker.len(), 0);

        for (id, handle) in handles {
            let response = handle.await.unwrap();
            assert_eq!(response.id, id);
            assert_eq!(response.body, Some(id.to_string().into_bytes()));
        }
    }

    #[tokio::test]
    async fn unmatched_response_is_dropped() {
        let mut tracker = OutgoingRequestTracker::new();
        let (id, handle) = tracker.register();

        assert!(!tracker.resolve(ResponseMessage::ok(id + 100)));
        assert_eq!(tracker.len(), 1);

        assert!(tracker.resolve(ResponseMessage::ok(id)));
        // A duplicate of an already matched response is dropped too.
        assert!(!tracker.resolve(ResponseMessage::ok(id)));
        assert_eq!(handle.await.unwrap().status, 200);
    }

    #[tokio::test]
    async fn fail_all_resolves_everything() {
        let mut tracker = OutgoingRequestTracker::new();
        let (_, first) = tracker.register();
        let (_, second) = tracker.register();

        assert_eq!(tracker.fail_all(TransportError::ConnectionClosed), 2);
        assert_eq!(tracker.len(), 0);
        assert_eq!(first.await, Err(TransportError::ConnectionClosed));
        assert_eq!(second.await, Err(TransportError::ConnectionClosed));
    }

    #[tokio::test]
    async fn abandoned_handle_does_not_disturb_others() {
        let mut tracker = OutgoingRequestTracker::new();
        let (gone, abandoned) = tracker.register();
        let (kept, handle) = tracker.register();
        drop(abandoned);

        assert!(tracker.resolve(ResponseMessage::ok(gone)));
        assert!(tracker.resolve(ResponseMessage::ok(kept)));
        assert_eq!(handle.await.unwrap().id, kept);
    }

    #[tokio::test]
    async fn cancelled_registration_reads_as_closed() {
        let mut tracker = OutgoingRequestTracker::new();
        let (id, handle) = tracker.register();
        tracker.cancel(id);
        assert_eq!(tracker.len(), 0);
        assert_eq!(handle.await, Err(TransportError::ConnectionClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_caller_side_only() {
        let mut tracker = OutgoingRequestTracker::new();
        let (id, handle) = tracker.register();

        let outcome = handle.with_timeout(Duration::from_secs(5)).await;
        assert_eq!(outcome, Err(TransportError::TimedOut));

        // The entry stays until a response or a close clears it.
        assert_eq!(tracker.len(), 1);
        assert!(tracker.resolve(ResponseMessage::ok(id)));
    }

    #[tokio::test]
    async fn blocking_wait_from_a_blocking_thread() {
        let mut tracker = OutgoingRequestTracker::new();
        let (id, handle) = tracker.register();
        let waiter = tokio::task::spawn_blocking(move || handle.blocking_wait());

        assert!(tracker.resolve(ResponseMessage::ok(id)));
        assert_eq!(waiter.await.unwrap().unwrap().id, id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_wait_inside_block_in_place() {
        let mut tracker = OutgoingRequestTracker::new();
        let (id, handle) = tracker.register();
        assert!(tracker.resolve(ResponseMessage::ok(id)));

        let outcome = tokio::task::block_in_place(|| handle.blocking_wait());
        assert_eq!(outcome.unwrap().status, 200);
    }
}
