use std::sync::Arc;

use crate::{Reply, Waiter};

/// State shared between the client and its websocket receive loop.
#[derive(Debug, Default)]
pub struct State {
    pub(crate) waiter: Arc<Waiter>,
}

impl State {
    /// Routes one inbound frame to the call it settles.
    ///
    /// Replies (`callback`) and pushed events (`event`) share this path.
    /// Malformed frames and frames for unknown calls are logged and dropped.
    pub fn handle_frame(&self, frame: &str) {
        let reply = match Reply::parse(frame) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("drop malformed frame: {e}");
                return;
            }
        };

        let Some(call_id) = reply.correlation.call_id() else {
            tracing::warn!(
                "drop frame with unknown correlation key: {}",
                reply.correlation.key()
            );
            return;
        };
        self.waiter.post(call_id, reply.outcome);
    }
}
