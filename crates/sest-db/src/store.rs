use anyhow::Result;
use sest_engine::{DecodedField, FieldStore, IngestStore};
use sest_types::{Channel, ChannelId, EncodingKind, Record};

use crate::Database;

impl FieldStore for Database {
    fn encoding_for(&self, channel: ChannelId, position: u16) -> Result<Option<EncodingKind>> {
        self.get_encoding(channel, position)
    }
}

impl IngestStore for Database {
    fn load_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        Database::load_channel(self, id)
    }

    fn commit_record(&self, channel: ChannelId, fields: &[DecodedField]) -> Result<Record> {
        Database::commit_record(self, channel, fields)
    }
}
