/// SEST ingestion core.
///
/// Raw `field<N>=text` submissions are checked against the channel's write
/// key and shape, decoded under each position's declared encoding, committed
/// as one record, and then matched against the channel's rules. At most one
/// rule fires per record; its reaction is handed to a [`ReactionSink`] and
/// never affects the ingestion outcome.

pub mod codec;
pub mod error;
pub mod ingest;
pub mod rules;
pub mod store;

#[cfg(test)]
mod testing;

pub use codec::{decode, decode_stored, revalidate};
pub use error::{AuthError, DecodeError, FieldError, IngestError, RuleError, ShapeError};
pub use ingest::{Coordinator, DecodedField, Ingested};
pub use rules::{Evaluation, RuleFault, evaluate};
pub use store::{FieldStore, IngestStore, Reaction, ReactionSink};
