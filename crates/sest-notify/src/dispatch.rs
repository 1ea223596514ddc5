use sest_types::{ActionKind, Channel, Record, Rule};
use tracing::info;

use crate::error::DispatchError;
use crate::transport::{Notification, NotificationTransport};

/// What a successful dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Delivered(u32),
    Logged,
}

/// Turns a fired rule's action into its side effect.
pub struct ReactionDispatcher<T> {
    transport: T,
}

impl<T: NotificationTransport> ReactionDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn dispatch(&self, channel: &Channel, rule: &Rule, record: &Record) -> Result<Ack, DispatchError> {
        match rule.action {
            ActionKind::Notification => {
                let target = channel
                    .notification_target
                    .as_ref()
                    .ok_or(DispatchError::MissingTarget(channel.id))?;

                let notification = render(channel, record, &target.address);
                let delivered = self.transport.send(&notification).await?;
                if delivered == 0 {
                    return Err(DispatchError::Rejected {
                        address: notification.address,
                        code: 0,
                        message: "no recipient accepted the message".into(),
                    });
                }
                Ok(Ack::Delivered(delivered))
            }
            ActionKind::Log => {
                info!(
                    channel_id = channel.id,
                    rule_id = rule.id,
                    record_id = record.id,
                    "Condition validated on channel {} ({}) for record registered on {}",
                    channel.id,
                    channel.title,
                    record.registered_on()
                );
                Ok(Ack::Logged)
            }
        }
    }
}

pub fn render(channel: &Channel, record: &Record, address: &str) -> Notification {
    Notification {
        address: address.to_string(),
        subject: format!("Alert. Condition validated on channel {}", channel.id),
        body: format!(
            "The following record, registered on: {}, verified one of your conditions you set on channel {} ({}).",
            record.registered_on(),
            channel.id,
            channel.title
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, reaction};
    use std::sync::Arc;

    #[tokio::test]
    async fn notification_goes_to_the_channel_target() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReactionDispatcher::new(transport.clone());
        let r = reaction(ActionKind::Notification, Some("ops@example.com"));

        let ack = dispatcher.dispatch(&r.channel, &r.rule, &r.record).await.unwrap();
        assert_eq!(ack, Ack::Delivered(1));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].address, "ops@example.com");
        assert_eq!(sent[0].subject, "Alert. Condition validated on channel 12");
        assert_eq!(
            sent[0].body,
            "The following record, registered on: 2024-03-09 14:05:07 UTC, verified one of your conditions \
             you set on channel 12 (boiler room)."
        );
    }

    #[tokio::test]
    async fn notification_without_target_is_an_error() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReactionDispatcher::new(transport.clone());
        let r = reaction(ActionKind::Notification, None);

        let err = dispatcher.dispatch(&r.channel, &r.rule, &r.record).await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingTarget(12)));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn transport_rejection_is_reported() {
        let transport = RecordingTransport {
            reject: true,
            ..Default::default()
        };
        let dispatcher = ReactionDispatcher::new(transport);
        let r = reaction(ActionKind::Notification, Some("ops@example.com"));

        let err = dispatcher.dispatch(&r.channel, &r.rule, &r.record).await.unwrap_err();
        assert_eq!(err.code(), "NOTIFICATION_REJECTED");
    }

    #[tokio::test]
    async fn log_action_sends_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ReactionDispatcher::new(transport.clone());
        let r = reaction(ActionKind::Log, Some("ops@example.com"));

        assert_eq!(dispatcher.dispatch(&r.channel, &r.rule, &r.record).await.unwrap(), Ack::Logged);
        assert!(transport.sent().is_empty());
    }
}
