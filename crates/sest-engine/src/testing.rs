//! In-memory doubles shared by the engine's unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Result, bail};
use chrono::Utc;
use sest_types::{ActionKind, Channel, ChannelId, EncodingKind, Field, OperatorKind, Record, Rule};

use crate::ingest::DecodedField;
use crate::store::{FieldStore, IngestStore, Reaction, ReactionSink};

pub const WRITE_KEY: &str = "e2af5d04-f62b-4fc6-ae50-049c3ecfaa18";

pub fn channel(max_fields: u16, encodings: &[(u16, EncodingKind)]) -> Channel {
    Channel {
        id: 7,
        owner: "test".into(),
        title: "greenhouse".into(),
        description: String::new(),
        write_key: WRITE_KEY.into(),
        max_fields,
        last_update: Utc::now(),
        notification_target: None,
        encodings: encodings.iter().copied().collect(),
        rules: Vec::new(),
    }
}

pub fn rule(id: i64, operator: OperatorKind, position: u16, value: &str, value_optional: Option<&str>) -> Rule {
    Rule {
        id,
        channel_id: 7,
        operator,
        position,
        value: value.into(),
        value_optional: value_optional.map(Into::into),
        action: ActionKind::Notification,
    }
}

pub fn record(fields: &[(u16, &str)]) -> Record {
    Record {
        id: 1,
        channel_id: 7,
        insertion_time: Utc::now(),
        fields: fields
            .iter()
            .map(|(position, raw)| Field {
                record_id: 1,
                position: *position,
                raw: raw.to_string(),
            })
            .collect(),
    }
}

pub fn form(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Single-channel store keeping committed records in a vector.
pub struct MemoryStore {
    pub channel: Mutex<Channel>,
    pub records: Mutex<Vec<Record>>,
    pub fail_commit: bool,
}

impl MemoryStore {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel: Mutex::new(channel),
            records: Mutex::new(Vec::new()),
            fail_commit: false,
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn field_count(&self) -> usize {
        self.records.lock().unwrap().iter().map(|r| r.fields.len()).sum()
    }
}

impl FieldStore for MemoryStore {
    fn encoding_for(&self, channel: ChannelId, position: u16) -> Result<Option<EncodingKind>> {
        self.channel.lock().unwrap().encoding_for(channel, position)
    }
}

impl IngestStore for MemoryStore {
    fn load_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        let channel = self.channel.lock().unwrap();
        Ok((channel.id == id).then(|| channel.clone()))
    }

    fn commit_record(&self, channel: ChannelId, fields: &[DecodedField]) -> Result<Record> {
        if self.fail_commit {
            bail!("disk I/O error");
        }
        let mut records = self.records.lock().unwrap();
        let id = records.len() as i64 + 1;
        let record = Record {
            id,
            channel_id: channel,
            insertion_time: Utc::now(),
            fields: fields
                .iter()
                .map(|f| Field {
                    record_id: id,
                    position: f.position,
                    raw: f.raw.clone(),
                })
                .collect(),
        };
        records.push(record.clone());
        Ok(record)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub reactions: Mutex<Vec<Reaction>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.reactions.lock().unwrap().len()
    }
}

impl ReactionSink for RecordingSink {
    fn submit(&self, reaction: Reaction) {
        self.reactions.lock().unwrap().push(reaction);
    }
}
