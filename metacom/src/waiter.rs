use foldhash::fast::RandomState;
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::oneshot;

use crate::{Error, ErrorKind, Receiver, Result};

/// Pending-call registry correlating websocket calls with their replies.
///
/// Every call gets a fresh id from [`Waiter::alloc`] before its packet is
/// sent. Ids start at 1 and are never reused. The entry lives until a reply
/// or event with that id is posted, or until the caller drops its
/// [`Receiver`].
#[derive(Default)]
pub struct Waiter {
    index: AtomicU64,
    id_map: dashmap::DashMap<u64, oneshot::Sender<Result<Value>>, RandomState>,
}

/// Removes the entry of a call whose receiver went away unanswered.
pub struct WaiterCleaner {
    waiter: Arc<Waiter>,
    call_id: u64,
}

impl Drop for WaiterCleaner {
    fn drop(&mut self) {
        self.waiter.remove(self.call_id);
    }
}

impl Waiter {
    /// Registers a new pending call.
    ///
    /// # Returns
    ///
    /// The fresh call id and the [`Receiver`] its outcome arrives on. Dropping
    /// the receiver removes the entry.
    pub fn alloc(self: &Arc<Self>) -> (u64, Receiver) {
        let call_id = self.index.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.id_map.insert(call_id, tx);
        (
            call_id,
            Receiver::new(
                rx,
                WaiterCleaner {
                    waiter: self.clone(),
                    call_id,
                },
            ),
        )
    }

    /// Settles the call with `outcome` and forgets it.
    ///
    /// # Arguments
    ///
    /// * `call_id` - Id handed out by [`Waiter::alloc`]
    /// * `outcome` - Result value, or the error the call fails with
    ///
    /// # Returns
    ///
    /// `true` if a call was settled; `false`, after logging, when no call is
    /// waiting on `call_id`.
    pub fn post(&self, call_id: u64, outcome: Result<Value>) -> bool {
        if let Some((_, tx)) = self.id_map.remove(&call_id) {
            if tx.send(outcome).is_err() {
                tracing::debug!("call {call_id} was settled after its caller left");
            }
            true
        } else {
            tracing::warn!("Waiter post failed for call_id: {call_id}");
            false
        }
    }

    /// Settles `call_id` with `value`. Returns what [`Waiter::post`] returns.
    pub fn resolve(&self, call_id: u64, value: Value) -> bool {
        self.post(call_id, Ok(value))
    }

    /// Fails `call_id` with `error`. Returns what [`Waiter::post`] returns.
    pub fn reject(&self, call_id: u64, error: Error) -> bool {
        self.post(call_id, Err(error))
    }

    /// Fails a pending call with [`ErrorKind::Cancelled`].
    pub fn cancel(&self, call_id: u64) -> bool {
        self.reject(call_id, Error::kind(ErrorKind::Cancelled))
    }

    /// Fails every pending call with `error`, e.g. once the connection is gone.
    ///
    /// # Returns
    ///
    /// The number of calls that were failed.
    pub fn reject_all(&self, error: &Error) -> usize {
        let call_ids: Vec<u64> = self.id_map.iter().map(|entry| *entry.key()).collect();
        call_ids
            .into_iter()
            .filter(|call_id| self.reject(*call_id, error.clone()))
            .count()
    }

    #[must_use]
    pub fn contains_call_id(&self, call_id: u64) -> bool {
        self.id_map.contains_key(&call_id)
    }

    /// Number of calls still waiting for a reply.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_map.is_empty()
    }

    fn remove(&self, call_id: u64) {
        self.id_map.remove(&call_id);
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("pending", &self.id_map.len())
            .finish()
    }
}
