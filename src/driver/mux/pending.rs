use tokio::sync::oneshot;

use crate::driver::transport::Frame;
use crate::error::{DriverError, DriverResult};

pub(super) type ResponseSender = oneshot::Sender<DriverResult<Frame>>;

struct PendingRequest {
    req_id: u64,
    tx: ResponseSender,
}

/// In-flight requests in send order. Lookups scan linearly; a connection
/// rarely has more than a handful outstanding.
#[derive(Default)]
pub(super) struct PendingList {
    entries: Vec<PendingRequest>,
}

impl PendingList {
    pub fn insert(&mut self, req_id: u64, tx: ResponseSender) {
        self.entries.push(PendingRequest { req_id, tx });
    }

    /// Removes and returns the entry for `req_id`, if it is still pending.
    pub fn take(&mut self, req_id: u64) -> Option<ResponseSender> {
        let pos = self.entries.iter().position(|p| p.req_id == req_id)?;
        Some(self.entries.remove(pos).tx)
    }

    /// Idempotent; returns whether an entry was removed.
    pub fn remove(&mut self, req_id: u64) -> bool {
        self.take(req_id).is_some()
    }

    /// Fails every pending request, oldest first.
    pub fn fail_all(&mut self, error: impl Fn() -> DriverError) -> usize {
        let count = self.entries.len();
        for pending in self.entries.drain(..) {
            let _ = pending.tx.send(Err(error()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
