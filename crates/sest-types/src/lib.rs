/// Shared SEST data model.
///
/// `kinds` holds the closed tag enums (encoding, operator, action) that every
/// other crate matches on exhaustively; `models` the stored entities; `api`
/// the HTTP request/response shapes.

pub mod api;
pub mod kinds;
pub mod models;
pub mod value;

pub use kinds::{ActionKind, EncodingKind, OperatorKind, UnknownKind};
pub use models::{Channel, ChannelId, Field, FieldEncoding, NotificationTarget, Record, RecordId, Rule, RuleId, User};
pub use value::TypedValue;
