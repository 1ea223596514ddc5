//! Record ingestion: `Received → Validated → Decoded → Committed → Reacted`,
//! or `Aborted` from any of the first three.
//!
//! Everything before the commit is pure; the commit is the only write, and
//! the store performs it as one transaction. Rule evaluation only ever sees
//! the committed record, and its outcome never changes the ingestion result.

use std::collections::BTreeMap;
use std::fmt;

use sest_types::{Channel, ChannelId, Record, RuleId};
use tracing::{debug, debug_span, error, info, warn};

use crate::codec;
use crate::error::{AuthError, IngestError, ShapeError};
use crate::rules;
use crate::store::{IngestStore, Reaction, ReactionSink};

const FIELD_PREFIX: &str = "field";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Decoded,
    Committed,
    Reacted,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Decoded => "decoded",
            Self::Committed => "committed",
            Self::Reacted => "reacted",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A submitted field that passed decoding, ready to be stored as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedField {
    pub position: u16,
    pub raw: String,
}

/// Result of an accepted submission.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub record: Record,
    pub fired: Option<RuleId>,
}

/// Orchestrates one submission against a store and hands any fired rule to
/// the reaction sink.
pub struct Coordinator<S, R> {
    store: S,
    reactions: R,
}

impl<S: IngestStore, R: ReactionSink> Coordinator<S, R> {
    pub fn new(store: S, reactions: R) -> Self {
        Self { store, reactions }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Accept or reject one `field<N> → text` submission for `channel_id`.
    ///
    /// The write key is checked before the field map is looked at. Any
    /// rejection leaves the store untouched.
    pub fn ingest(
        &self,
        channel_id: ChannelId,
        write_key: Option<&str>,
        fields: &BTreeMap<String, String>,
    ) -> Result<Ingested, IngestError> {
        let span = debug_span!("ingest", channel_id);
        let _enter = span.enter();

        let result = self.run(channel_id, write_key, fields);
        if let Err(e) = &result {
            debug!(stage = %Stage::Aborted, code = e.code(), "{}", e);
        }
        result
    }

    /// Rejection for a body that never parsed into a field map. The key
    /// checks of [`Coordinator::ingest`] still run first, so a wrong key is
    /// reported as such whatever the body looks like.
    pub fn reject_malformed(&self, channel_id: ChannelId, write_key: Option<&str>, reason: String) -> IngestError {
        let span = debug_span!("ingest", channel_id);
        let _enter = span.enter();

        let err = match self.admit(channel_id, write_key) {
            Ok(_) => ShapeError::MalformedBody { reason }.into(),
            Err(e) => e,
        };
        debug!(stage = %Stage::Aborted, code = err.code(), "{}", err);
        err
    }

    /// Key presence, channel existence, key match; in that order.
    fn admit(&self, channel_id: ChannelId, write_key: Option<&str>) -> Result<Channel, IngestError> {
        let write_key = write_key.ok_or(AuthError::MissingWriteKey)?;
        let channel = self
            .store
            .load_channel(channel_id)?
            .ok_or(IngestError::ChannelNotFound(channel_id))?;
        authorize(&channel, write_key)?;
        Ok(channel)
    }

    fn run(
        &self,
        channel_id: ChannelId,
        write_key: Option<&str>,
        fields: &BTreeMap<String, String>,
    ) -> Result<Ingested, IngestError> {
        let channel = self.admit(channel_id, write_key)?;
        debug!(stage = %Stage::Received, submitted = fields.len());

        let validated = validate(&channel, fields)?;
        debug!(stage = %Stage::Validated);

        let decoded = decode(&channel, validated)?;
        debug!(stage = %Stage::Decoded, fields = decoded.len());

        let record = self.store.commit_record(channel.id, &decoded)?;
        info!(
            stage = %Stage::Committed,
            record_id = record.id,
            fields = record.fields.len(),
            "Record stored"
        );

        let fired = self.react(&channel, &record);
        debug!(stage = %Stage::Reacted, record_id = record.id, fired = ?fired);
        Ok(Ingested { record, fired })
    }

    /// Evaluate rules on the committed record. Faults here are logged only.
    fn react(&self, channel: &Channel, record: &Record) -> Option<RuleId> {
        let evaluation = match rules::evaluate(channel, record, &self.store) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                error!(record_id = record.id, code = e.code(), "Rule evaluation aborted: {}", e);
                return None;
            }
        };

        for fault in &evaluation.faults {
            warn!(
                record_id = record.id,
                rule_id = fault.rule_id,
                field_no = fault.position,
                "Rule skipped due to fault: {}",
                fault.error
            );
        }

        let rule = evaluation.fired?;
        info!(record_id = record.id, rule_id = rule.id, action = %rule.action, "Rule fired");
        self.reactions.submit(Reaction {
            channel: channel.clone(),
            rule: rule.clone(),
            record: record.clone(),
        });
        Some(rule.id)
    }
}

fn authorize(channel: &Channel, submitted: &str) -> Result<(), AuthError> {
    if keys_match(channel.write_key.as_bytes(), submitted.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::WrongWriteKey)
    }
}

/// Byte comparison whose running time depends only on the lengths.
fn keys_match(stored: &[u8], submitted: &[u8]) -> bool {
    stored.len() == submitted.len()
        && stored
            .iter()
            .zip(submitted)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// `Received → Validated`: count, emptiness and naming.
fn validate<'f>(
    channel: &Channel,
    fields: &'f BTreeMap<String, String>,
) -> Result<Vec<(u16, &'f str)>, ShapeError> {
    if fields.len() > usize::from(channel.max_fields) {
        return Err(ShapeError::TooManyFields {
            submitted: fields.len(),
            max: channel.max_fields,
        });
    }
    if fields.is_empty() {
        return Err(ShapeError::NoFields);
    }

    let mut positions = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let position = field_position(name).ok_or_else(|| ShapeError::InvalidFieldName { name: name.clone() })?;
        positions.push((position, value.as_str()));
    }
    positions.sort_unstable_by_key(|(position, _)| *position);
    Ok(positions)
}

/// `field<N>` with N >= 1 and no leading zeros, so every position has exactly
/// one spelling.
pub fn field_position(name: &str) -> Option<u16> {
    let digits = name.strip_prefix(FIELD_PREFIX)?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `Validated → Decoded`: every field must decode or the batch is dropped.
fn decode(channel: &Channel, fields: Vec<(u16, &str)>) -> Result<Vec<DecodedField>, IngestError> {
    fields
        .into_iter()
        .map(|(position, raw)| {
            if raw.is_empty() {
                return Err(IngestError::EmptyValue { position });
            }
            codec::decode_stored(channel, channel.id, position, raw)?;
            Ok(DecodedField {
                position,
                raw: raw.to_string(),
            })
        })
        .collect()
}
