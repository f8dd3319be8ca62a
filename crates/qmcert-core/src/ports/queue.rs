//! Channel-backed evaluation queue.
//!
//! Dispatch uses `try_send` on a bounded `tokio` channel, so enqueueing
//! from synchronous lifecycle code never blocks and never awaits. The
//! receiving half is driven by whatever worker runs the measure evaluation.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use super::{EvaluationQueue, EvaluationRequest, PortError};

const COLLABORATOR: &str = "evaluation queue";

/// Evaluation queue feeding a bounded `tokio::sync::mpsc` channel.
#[derive(Debug, Clone)]
pub struct ChannelEvaluationQueue {
    sender: mpsc::Sender<EvaluationRequest>,
}

impl ChannelEvaluationQueue {
    /// Creates a queue with room for `capacity` pending requests and returns
    /// the receiver for the evaluation worker.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EvaluationRequest>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl EvaluationQueue for ChannelEvaluationQueue {
    fn enqueue(&self, request: EvaluationRequest) -> Result<(), PortError> {
        let test_id = request.test_id.clone();
        match self.sender.try_send(request) {
            Ok(()) => {
                debug!(test_id = %test_id, "Evaluation enqueued");
                Ok(())
            },
            Err(TrySendError::Full(_)) => Err(PortError::rejected(COLLABORATOR, "queue full")),
            Err(TrySendError::Closed(_)) => {
                Err(PortError::unavailable(COLLABORATOR, "worker has shut down"))
            },
        }
    }
}
