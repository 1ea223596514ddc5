//! Error taxonomy for ingestion and rule evaluation.
//!
//! Every variant that can reach a client carries a stable `code()`; each
//! cause gets its own code so integrations can branch on it.

use sest_types::{ChannelId, EncodingKind, RuleId};
use thiserror::Error;

/// Why a raw text could not be turned into a typed value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The position has no declared encoding: a configuration gap.
    #[error("no encoding is declared for this field")]
    NoEncoding,

    /// The text does not parse under the declared encoding: bad data.
    #[error("value '{raw}' is not a valid {encoding}")]
    WrongEncoding { encoding: EncodingKind, raw: String },
}

impl DecodeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoEncoding => "NO_FIELD_ENCODING",
            Self::WrongEncoding { .. } => "WRONG_VALUE_FIELD_ENCODING",
        }
    }
}

/// Decoding a positioned field, including the encoding lookup.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("field{position}: {source}")]
    Decode {
        position: u16,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl FieldError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode { source, .. } => source.code(),
            Self::Store(_) => "STORAGE_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("Max number of fields exceeded ({submitted} submitted, {max} allowed).")]
    TooManyFields { submitted: usize, max: u16 },

    #[error("Send at least one field inside your message.")]
    NoFields,

    #[error("Field names must look like field<N> with N >= 1; got '{name}'.")]
    InvalidFieldName { name: String },

    /// The body never became a field map (wrong content type, bad escapes).
    #[error("Send fields as an application/x-www-form-urlencoded body: {reason}")]
    MalformedBody { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing writing API key.")]
    MissingWriteKey,

    #[error("Incorrect API key associated with the channel you have chosen.")]
    WrongWriteKey,
}

/// Outcome of a rejected ingestion. Nothing from the batch is stored.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Channel {0} does not exist.")]
    ChannelNotFound(ChannelId),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("Empty values are not allowed (field{position}).")]
    EmptyValue { position: u16 },

    #[error("Field{position} rejected: {source}.")]
    Decode {
        position: u16,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChannelNotFound(_) => "CHANNEL_NOT_FOUND",
            Self::Auth(AuthError::MissingWriteKey) => "MISSING_WRITE_KEY",
            Self::Auth(AuthError::WrongWriteKey) => "WRONG_WRITE_KEY",
            Self::Shape(ShapeError::TooManyFields { .. }) => "NUMBER_FIELDS_EXCEEDED",
            Self::Shape(ShapeError::NoFields) => "NO_FIELDS_PASSED",
            Self::Shape(ShapeError::InvalidFieldName { .. }) => "WRONG_FIELDS_PASSED",
            Self::Shape(ShapeError::MalformedBody { .. }) => "MALFORMED_BODY",
            Self::EmptyValue { .. } => "EMPTY_VALUES_NOT_ALLOWED",
            Self::Decode { source, .. } => source.code(),
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<FieldError> for IngestError {
    fn from(err: FieldError) -> Self {
        match err {
            FieldError::Decode { position, source } => Self::Decode { position, source },
            FieldError::Store(e) => Self::Storage(e),
        }
    }
}

/// A channel whose rule set cannot be evaluated. Always a server-side fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("rule {rule_id} is invalid: {reason}")]
    InvalidRule { rule_id: RuleId, reason: String },
}

impl RuleError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRule { .. } => "INVALID_RULE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_cause_has_its_own_code() {
        let errors = [
            IngestError::ChannelNotFound(1),
            AuthError::MissingWriteKey.into(),
            AuthError::WrongWriteKey.into(),
            ShapeError::TooManyFields { submitted: 4, max: 3 }.into(),
            ShapeError::NoFields.into(),
            ShapeError::InvalidFieldName { name: "x".into() }.into(),
            ShapeError::MalformedBody { reason: "x".into() }.into(),
            IngestError::EmptyValue { position: 1 },
            IngestError::Decode {
                position: 1,
                source: DecodeError::NoEncoding,
            },
            IngestError::Decode {
                position: 1,
                source: DecodeError::WrongEncoding {
                    encoding: EncodingKind::Float,
                    raw: "x".into(),
                },
            },
            IngestError::Storage(anyhow::anyhow!("disk full")),
        ];

        let mut codes: Vec<&str> = errors.iter().map(IngestError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn field_error_keeps_position() {
        let err: IngestError = FieldError::Decode {
            position: 2,
            source: DecodeError::NoEncoding,
        }
        .into();
        assert_eq!(err.code(), "NO_FIELD_ENCODING");
        assert!(err.to_string().contains("Field2"));
    }
}
