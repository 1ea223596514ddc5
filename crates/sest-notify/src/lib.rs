/// Reaction side effects.
///
/// A fired rule reaches this crate as a [`sest_engine::Reaction`] through the
/// [`ReactionQueue`]; a single worker drains the queue and runs each one
/// through the [`ReactionDispatcher`]. Nothing here can fail an ingestion.

pub mod dispatch;
pub mod error;
pub mod postmark;
pub mod queue;
pub mod transport;

#[cfg(test)]
mod testing;

pub use dispatch::{Ack, ReactionDispatcher};
pub use error::DispatchError;
pub use postmark::PostmarkTransport;
pub use queue::{ReactionQueue, run_dispatch_loop};
pub use transport::{Notification, NotificationTransport, TracingTransport, Transport};
