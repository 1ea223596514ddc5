use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::kinds::{ActionKind, EncodingKind, OperatorKind};

pub type ChannelId = i64;
pub type RecordId = i64;
pub type RuleId = i64;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub nick: String,
    pub email: String,
    pub registration_time: DateTime<Utc>,
}

/// Address a user receives channel alerts on. Distinct from the user's own
/// email so that each channel can alert somewhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationTarget {
    pub address: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEncoding {
    pub channel_id: ChannelId,
    pub position: u16,
    pub encoding: EncodingKind,
}

/// A stored comparison plus the action to take when it holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub id: RuleId,
    pub channel_id: ChannelId,
    pub operator: OperatorKind,
    /// Field position the rule reacts on.
    pub position: u16,
    pub value: String,
    /// Upper bound, only read by range operators.
    pub value_optional: Option<String>,
    pub action: ActionKind,
}

/// Snapshot of a channel with everything evaluation needs: encodings by
/// position, rules in stored order, and the optional alert address.
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    pub id: ChannelId,
    pub owner: String,
    pub title: String,
    pub description: String,
    pub write_key: String,
    pub max_fields: u16,
    pub last_update: DateTime<Utc>,
    pub notification_target: Option<NotificationTarget>,
    pub encodings: BTreeMap<u16, EncodingKind>,
    pub rules: Vec<Rule>,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "{} (created by user: '{}')", self.id, self.owner)
        } else {
            write!(f, "{} ({}, created by user: '{}')", self.id, self.title, self.owner)
        }
    }
}

/// Stored field. The value is always text; its meaning comes from the
/// channel's current encoding for `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub record_id: RecordId,
    pub position: u16,
    pub raw: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub channel_id: ChannelId,
    pub insertion_time: DateTime<Utc>,
    pub fields: Vec<Field>,
}

impl Record {
    /// Insertion time as shown in alerts.
    pub fn registered_on(&self) -> String {
        self.insertion_time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}
