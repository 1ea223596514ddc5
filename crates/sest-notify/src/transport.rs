use std::future::Future;
use std::sync::Arc;

use tracing::info;

use crate::error::DispatchError;
use crate::postmark::PostmarkTransport;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub address: String,
    pub subject: String,
    pub body: String,
}

/// Outbound notification delivery. `send` resolves to the number of
/// recipients that accepted the message.
pub trait NotificationTransport: Send + Sync {
    fn send(&self, notification: &Notification) -> impl Future<Output = Result<u32, DispatchError>> + Send;
}

impl<T: NotificationTransport> NotificationTransport for Arc<T> {
    fn send(&self, notification: &Notification) -> impl Future<Output = Result<u32, DispatchError>> + Send {
        (**self).send(notification)
    }
}

/// Transport that writes each notification to the service log and reports
/// it as delivered. Used when no mail provider is configured.
pub struct TracingTransport;

impl NotificationTransport for TracingTransport {
    async fn send(&self, notification: &Notification) -> Result<u32, DispatchError> {
        info!(
            to = %notification.address,
            subject = %notification.subject,
            "{}",
            notification.body
        );
        Ok(1)
    }
}

/// The transport selected at startup.
pub enum Transport {
    Postmark(PostmarkTransport),
    Tracing(TracingTransport),
}

impl NotificationTransport for Transport {
    async fn send(&self, notification: &Notification) -> Result<u32, DispatchError> {
        match self {
            Self::Postmark(t) => t.send(notification).await,
            Self::Tracing(t) => t.send(notification).await,
        }
    }
}
