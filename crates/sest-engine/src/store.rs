use std::sync::Arc;

use anyhow::Result;
use sest_types::{Channel, ChannelId, EncodingKind, Record, Rule};

use crate::ingest::DecodedField;

/// Read side of the per-channel encoding registry.
pub trait FieldStore {
    /// `Ok(None)` means the position has no declared encoding.
    fn encoding_for(&self, channel: ChannelId, position: u16) -> Result<Option<EncodingKind>>;
}

/// A loaded channel answers for its own encodings only.
impl FieldStore for Channel {
    fn encoding_for(&self, channel: ChannelId, position: u16) -> Result<Option<EncodingKind>> {
        if channel != self.id {
            return Ok(None);
        }
        Ok(self.encodings.get(&position).copied())
    }
}

impl<T: FieldStore + ?Sized> FieldStore for &T {
    fn encoding_for(&self, channel: ChannelId, position: u16) -> Result<Option<EncodingKind>> {
        (**self).encoding_for(channel, position)
    }
}

impl<T: FieldStore + ?Sized> FieldStore for Arc<T> {
    fn encoding_for(&self, channel: ChannelId, position: u16) -> Result<Option<EncodingKind>> {
        (**self).encoding_for(channel, position)
    }
}

/// Storage operations the ingestion pipeline needs.
pub trait IngestStore: FieldStore {
    /// Channel snapshot with encodings, rules (stored order) and target.
    fn load_channel(&self, id: ChannelId) -> Result<Option<Channel>>;

    /// Persist a record and all of its fields as one unit. On error nothing
    /// of the record may remain visible.
    fn commit_record(&self, channel: ChannelId, fields: &[DecodedField]) -> Result<Record>;
}

impl<T: IngestStore + ?Sized> IngestStore for Arc<T> {
    fn load_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        (**self).load_channel(id)
    }

    fn commit_record(&self, channel: ChannelId, fields: &[DecodedField]) -> Result<Record> {
        (**self).commit_record(channel, fields)
    }
}

/// A fired rule waiting for its side effect.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub channel: Channel,
    pub rule: Rule,
    pub record: Record,
}

/// Receives reactions after the record is committed. Must not block on the
/// side effect itself.
pub trait ReactionSink {
    fn submit(&self, reaction: Reaction);
}

impl<T: ReactionSink + ?Sized> ReactionSink for Arc<T> {
    fn submit(&self, reaction: Reaction) {
        (**self).submit(reaction)
    }
}
