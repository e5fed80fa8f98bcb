//! Incoming request queue.
//!
//! Requests originated by the remote peer, in wire arrival order. The reader
//! pushes, the single consumer pops; waiting for a push is handled by the
//! connection, which owns the lock this queue lives behind.

use std::collections::VecDeque;
use tether_core::RequestMessage;

#[derive(Debug, Default)]
pub(crate) struct IncomingRequestQueue {
    requests: VecDeque<RequestMessage>,
}

impl IncomingRequestQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, request: RequestMessage) {
        self.requests.push_back(request);
    }

    pub(crate) fn pop(&mut self) -> Option<RequestMessage> {
        self.requests.pop_front()
    }

    /// Drop everything still queued. Returns how many requests were lost.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.requests.len();
        self.requests.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }
}
