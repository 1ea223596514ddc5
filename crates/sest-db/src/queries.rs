use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use sest_engine::DecodedField;
use sest_types::{
    ActionKind, Channel, ChannelId, EncodingKind, Field, NotificationTarget, OperatorKind, Record, RecordId, Rule,
    RuleId, User,
};

use crate::Database;
use crate::models::{ChannelRow, RecordRow, RuleRow};

/// A rule before storage assigns its id.
#[derive(Debug, Clone)]
pub struct NewRule {
    pub operator: OperatorKind,
    pub position: u16,
    pub value: String,
    pub value_optional: Option<String>,
    pub action: ActionKind,
}

impl Database {
    // -- Users --

    /// `None` when the nick is already taken.
    pub fn create_user(&self, nick: &str, email: &str) -> Result<Option<User>> {
        let registration_time = now();
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (nick, email, registration_time) VALUES (?1, ?2, ?3)
                 ON CONFLICT(nick) DO NOTHING",
                (nick, email, timestamp(&registration_time)),
            )?;
            Ok((inserted == 1).then(|| User {
                nick: nick.to_string(),
                email: email.to_string(),
                registration_time,
            }))
        })
    }

    pub fn get_user(&self, nick: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT nick, email, registration_time FROM users WHERE nick = ?1",
                    [nick],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
                )
                .optional()?;

            row.map(|(nick, email, registered)| {
                Ok(User {
                    nick,
                    email,
                    registration_time: parse_time(&registered)?,
                })
            })
            .transpose()
        })
    }

    // -- Notification targets --

    /// `None` when the address is already registered, by anyone.
    pub fn create_target(&self, owner: &str, address: &str) -> Result<Option<NotificationTarget>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO notification_targets (address, owner) VALUES (?1, ?2)
                 ON CONFLICT(address) DO NOTHING",
                (address, owner),
            )?;
            Ok((inserted == 1).then(|| NotificationTarget {
                address: address.to_string(),
                owner: owner.to_string(),
            }))
        })
    }

    pub fn get_target(&self, address: &str) -> Result<Option<NotificationTarget>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT address, owner FROM notification_targets WHERE address = ?1",
                [address],
                |row| {
                    Ok(NotificationTarget {
                        address: row.get(0)?,
                        owner: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Remove a target, detaching it from every channel that used it.
    pub fn delete_target(&self, address: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE channels SET notification_target = NULL WHERE notification_target = ?1",
                [address],
            )?;
            let removed = tx.execute("DELETE FROM notification_targets WHERE address = ?1", [address])?;
            tx.commit()?;
            Ok(removed > 0)
        })
    }

    // -- Channels --

    pub fn create_channel(&self, owner: &str, title: &str, description: &str, max_fields: u16) -> Result<Channel> {
        let write_key = Uuid::new_v4().to_string();
        let last_update = now();

        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (owner, title, description, write_key, max_fields, last_update)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![owner, title, description, write_key, max_fields, timestamp(&last_update)],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(Channel {
            id,
            owner: owner.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            write_key,
            max_fields,
            last_update,
            notification_target: None,
            encodings: BTreeMap::new(),
            rules: Vec::new(),
        })
    }

    pub fn load_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        self.with_conn(|conn| query_channel(conn, id))
    }

    pub fn list_channels(&self, owner: &str) -> Result<Vec<Channel>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM channels WHERE owner = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map([owner], |row| row.get::<_, i64>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut channels = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(channel) = query_channel(conn, id)? {
                    channels.push(channel);
                }
            }
            Ok(channels)
        })
    }

    /// Replace the write key; the channel keeps its identity.
    pub fn regenerate_write_key(&self, id: ChannelId) -> Result<Option<String>> {
        let write_key = Uuid::new_v4().to_string();
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE channels SET write_key = ?2 WHERE id = ?1", params![id, write_key])?;
            Ok((changed > 0).then_some(write_key))
        })
    }

    pub fn set_notification_target(&self, id: ChannelId, address: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE channels SET notification_target = ?2 WHERE id = ?1",
                params![id, address],
            )?;
            Ok(())
        })
    }

    /// Delete a channel and everything it owns in one transaction:
    /// fields, records, rules, encodings, then the channel row.
    pub fn delete_channel(&self, id: ChannelId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM fields WHERE record_id IN (SELECT id FROM records WHERE channel_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM records WHERE channel_id = ?1", [id])?;
            tx.execute("DELETE FROM rules WHERE channel_id = ?1", [id])?;
            tx.execute("DELETE FROM field_encodings WHERE channel_id = ?1", [id])?;
            let removed = tx.execute("DELETE FROM channels WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
    }

    // -- Encodings --

    /// Declare the encoding of a position. A second declaration for the same
    /// position replaces the first; there is never more than one.
    ///
    /// A position targeted by a numeric rule cannot become textual. The
    /// blocking rule's id is returned and nothing is written.
    pub fn declare_encoding(
        &self,
        channel: ChannelId,
        position: u16,
        encoding: EncodingKind,
    ) -> Result<Option<RuleId>> {
        self.with_conn(|conn| {
            if !encoding.is_numeric() {
                let blocking = query_rules(conn, channel)?
                    .into_iter()
                    .find(|r| r.position == position && !r.operator.is_textual());
                if let Some(rule) = blocking {
                    return Ok(Some(rule.id));
                }
            }

            conn.execute(
                "INSERT INTO field_encodings (channel_id, field_no, encoding) VALUES (?1, ?2, ?3)
                 ON CONFLICT(channel_id, field_no) DO UPDATE SET encoding = excluded.encoding",
                params![channel, position, encoding.as_str()],
            )?;
            Ok(None)
        })
    }

    pub fn remove_encoding(&self, channel: ChannelId, position: u16) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM field_encodings WHERE channel_id = ?1 AND field_no = ?2",
                params![channel, position],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn get_encoding(&self, channel: ChannelId, position: u16) -> Result<Option<EncodingKind>> {
        self.with_conn(|conn| {
            let tag: Option<String> = conn
                .query_row(
                    "SELECT encoding FROM field_encodings WHERE channel_id = ?1 AND field_no = ?2",
                    params![channel, position],
                    |row| row.get(0),
                )
                .optional()?;

            tag.map(|t| t.parse::<EncodingKind>().map_err(Into::into)).transpose()
        })
    }

    // -- Rules --

    pub fn add_rule(&self, channel: ChannelId, rule: &NewRule) -> Result<Rule> {
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rules (channel_id, condition_op, field_no, value, value_optional, action)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    channel,
                    rule.operator.as_str(),
                    rule.position,
                    rule.value,
                    rule.value_optional,
                    rule.action.as_str()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(Rule {
            id,
            channel_id: channel,
            operator: rule.operator,
            position: rule.position,
            value: rule.value.clone(),
            value_optional: rule.value_optional.clone(),
            action: rule.action,
        })
    }

    pub fn delete_rule(&self, channel: ChannelId, rule: RuleId) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM rules WHERE id = ?1 AND channel_id = ?2",
                params![rule, channel],
            )?;
            Ok(removed > 0)
        })
    }

    // -- Records --

    /// Store a record and all its fields atomically. Any failing insert rolls
    /// the whole record back. Also bumps the channel's `last_update`.
    pub fn commit_record(&self, channel: ChannelId, fields: &[DecodedField]) -> Result<Record> {
        let insertion_time = now();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO records (channel_id, insertion_time) VALUES (?1, ?2)",
                params![channel, timestamp(&insertion_time)],
            )?;
            let record_id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare("INSERT INTO fields (record_id, field_no, value) VALUES (?1, ?2, ?3)")?;
                for field in fields {
                    stmt.execute(params![record_id, field.position, field.raw])?;
                }
            }

            tx.execute(
                "UPDATE channels SET last_update = ?2 WHERE id = ?1",
                params![channel, timestamp(&insertion_time)],
            )?;
            tx.commit()?;

            Ok(Record {
                id: record_id,
                channel_id: channel,
                insertion_time,
                fields: fields
                    .iter()
                    .map(|f| Field {
                        record_id,
                        position: f.position,
                        raw: f.raw.clone(),
                    })
                    .collect(),
            })
        })
    }

    /// Newest records first.
    pub fn recent_records(&self, channel: ChannelId, limit: u32) -> Result<Vec<Record>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, channel_id, insertion_time FROM records
                 WHERE channel_id = ?1
                 ORDER BY insertion_time DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![channel, limit], |row| {
                    Ok(RecordRow {
                        id: row.get(0)?,
                        channel_id: row.get(1)?,
                        insertion_time: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|row| {
                    Ok(Record {
                        id: row.id,
                        channel_id: row.channel_id,
                        insertion_time: parse_time(&row.insertion_time)?,
                        fields: query_fields(conn, row.id)?,
                    })
                })
                .collect()
        })
    }

    /// Every stored field of a channel, for revalidation.
    pub fn channel_fields(&self, channel: ChannelId) -> Result<Vec<Field>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.record_id, f.field_no, f.value
                 FROM fields f
                 JOIN records r ON f.record_id = r.id
                 WHERE r.channel_id = ?1
                 ORDER BY f.record_id, f.field_no",
            )?;
            let fields = stmt
                .query_map([channel], field_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(fields)
        })
    }

    /// (records, fields) stored for a channel.
    pub fn record_stats(&self, channel: ChannelId) -> Result<(u64, u64)> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM records WHERE channel_id = ?1),
                    (SELECT COUNT(*) FROM fields f JOIN records r ON f.record_id = r.id WHERE r.channel_id = ?1)",
                [channel],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
            )?;
            Ok(stats)
        })
    }
}

fn query_channel(conn: &Connection, id: ChannelId) -> Result<Option<Channel>> {
    let row = conn
        .query_row(
            "SELECT c.id, c.owner, c.title, c.description, c.write_key, c.max_fields, c.last_update,
                    c.notification_target, t.owner
             FROM channels c
             LEFT JOIN notification_targets t ON c.notification_target = t.address
             WHERE c.id = ?1",
            [id],
            |row| {
                Ok(ChannelRow {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    write_key: row.get(4)?,
                    max_fields: row.get(5)?,
                    last_update: row.get(6)?,
                    notification_target: row.get(7)?,
                    target_owner: row.get(8)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let notification_target = match (row.notification_target, row.target_owner) {
        (Some(address), Some(owner)) => Some(NotificationTarget { address, owner }),
        _ => None,
    };

    Ok(Some(Channel {
        id: row.id,
        owner: row.owner,
        title: row.title,
        description: row.description,
        write_key: row.write_key,
        max_fields: row.max_fields,
        last_update: parse_time(&row.last_update)?,
        notification_target,
        encodings: query_encodings(conn, id)?,
        rules: query_rules(conn, id)?,
    }))
}

fn query_encodings(conn: &Connection, channel: ChannelId) -> Result<BTreeMap<u16, EncodingKind>> {
    let mut stmt =
        conn.prepare("SELECT field_no, encoding FROM field_encodings WHERE channel_id = ?1 ORDER BY field_no")?;
    let rows = stmt
        .query_map([channel], |row| Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(position, tag)| {
            let encoding = tag
                .parse::<EncodingKind>()
                .with_context(|| format!("channel {} field{}", channel, position))?;
            Ok((position, encoding))
        })
        .collect()
}

/// Rules in stored order, which is the order they are evaluated in.
fn query_rules(conn: &Connection, channel: ChannelId) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(
        "SELECT id, channel_id, condition_op, field_no, value, value_optional, action
         FROM rules WHERE channel_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([channel], |row| {
            Ok(RuleRow {
                id: row.get(0)?,
                channel_id: row.get(1)?,
                condition_op: row.get(2)?,
                field_no: row.get(3)?,
                value: row.get(4)?,
                value_optional: row.get(5)?,
                action: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(rule_from_row).collect()
}

fn rule_from_row(row: RuleRow) -> Result<Rule> {
    let context = || format!("rule {}", row.id);
    Ok(Rule {
        id: row.id,
        channel_id: row.channel_id,
        operator: row.condition_op.parse::<OperatorKind>().with_context(context)?,
        position: row.field_no,
        value: row.value.clone(),
        value_optional: row.value_optional.clone(),
        action: row.action.parse::<ActionKind>().with_context(context)?,
    })
}

fn query_fields(conn: &Connection, record: RecordId) -> Result<Vec<Field>> {
    let mut stmt =
        conn.prepare("SELECT record_id, field_no, value FROM fields WHERE record_id = ?1 ORDER BY field_no")?;
    let fields = stmt
        .query_map([record], field_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(fields)
}

fn field_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Field> {
    Ok(Field {
        record_id: row.get(0)?,
        position: row.get(1)?,
        raw: row.get(2)?,
    })
}

/// Microsecond precision, so a stored value reads back equal.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    let time = DateTime::parse_from_rfc3339(text).with_context(|| format!("corrupt timestamp '{}'", text))?;
    Ok(time.with_timezone(&Utc))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
