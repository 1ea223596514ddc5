use sest_engine::{Reaction, ReactionSink};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::dispatch::ReactionDispatcher;
use crate::error::DispatchError;
use crate::transport::NotificationTransport;

/// Bounded hand-off between ingestion and the dispatch worker. Submitting
/// never waits: when the queue is full the reaction is dropped and logged.
#[derive(Clone)]
pub struct ReactionQueue {
    tx: mpsc::Sender<Reaction>,
}

impl ReactionQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Reaction>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ReactionSink for ReactionQueue {
    fn submit(&self, reaction: Reaction) {
        match self.tx.try_send(reaction) {
            Ok(()) => {}
            Err(TrySendError::Full(r)) => warn!(
                channel_id = r.channel.id,
                rule_id = r.rule.id,
                record_id = r.record.id,
                "Reaction queue full, dropping reaction"
            ),
            Err(TrySendError::Closed(r)) => error!(
                channel_id = r.channel.id,
                rule_id = r.rule.id,
                record_id = r.record.id,
                "Dispatch worker is gone, dropping reaction"
            ),
        }
    }
}

/// Drain the queue until every sender is dropped. Dispatch failures are
/// logged and the loop moves on.
pub async fn run_dispatch_loop<T: NotificationTransport>(
    dispatcher: ReactionDispatcher<T>,
    mut rx: mpsc::Receiver<Reaction>,
) {
    info!("Dispatch worker started");

    while let Some(Reaction { channel, rule, record }) = rx.recv().await {
        match dispatcher.dispatch(&channel, &rule, &record).await {
            Ok(ack) => debug!(
                channel_id = channel.id,
                rule_id = rule.id,
                record_id = record.id,
                ?ack,
                "Reaction dispatched"
            ),
            Err(e @ DispatchError::MissingTarget(_)) => warn!(
                channel_id = channel.id,
                rule_id = rule.id,
                record_id = record.id,
                code = e.code(),
                "{}",
                e
            ),
            Err(e) => error!(
                channel_id = channel.id,
                rule_id = rule.id,
                record_id = record.id,
                code = e.code(),
                "Dispatch failed: {}",
                e
            ),
        }
    }

    info!("Dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, reaction};
    use sest_types::ActionKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (queue, mut rx) = ReactionQueue::new(1);
        queue.submit(reaction(ActionKind::Log, None));
        queue.submit(reaction(ActionKind::Log, None));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn worker_survives_failures() {
        let transport = Arc::new(RecordingTransport::default());
        let (queue, rx) = ReactionQueue::new(8);
        let worker = tokio::spawn(run_dispatch_loop(ReactionDispatcher::new(transport.clone()), rx));

        queue.submit(reaction(ActionKind::Notification, None));
        queue.submit(reaction(ActionKind::Notification, Some("ops@example.com")));
        queue.submit(reaction(ActionKind::Log, None));
        drop(queue);

        worker.await.unwrap();
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn closed_queue_does_not_panic() {
        let (queue, rx) = ReactionQueue::new(1);
        drop(rx);
        queue.submit(reaction(ActionKind::Log, None));
    }
}
