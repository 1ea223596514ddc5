use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// A tag read from a request or a stored row that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {axis} '{tag}'")]
pub struct UnknownKind {
    pub axis: &'static str,
    pub tag: String,
}

impl UnknownKind {
    fn new(axis: &'static str, tag: &str) -> Self {
        Self {
            axis,
            tag: tag.to_string(),
        }
    }
}

// -- Encodings --

/// Declared type of a field position within a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingKind {
    Float,
    Integer,
    String,
}

impl EncodingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
            Self::String => "string",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Float | Self::Integer)
    }
}

impl FromStr for EncodingKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" => Ok(Self::Float),
            "integer" | "int" => Ok(Self::Integer),
            "string" | "str" => Ok(Self::String),
            other => Err(UnknownKind::new("encoding", other)),
        }
    }
}

impl fmt::Display for EncodingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Operators --

/// Comparison applied by a rule to its target field.
///
/// `Bt` and `Ot` are exclusive on both bounds and need the rule's second
/// value. `Cn`, `Nc`, `Sw` and `Ew` work on the raw text of the field; every
/// other operator is numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorKind {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    Bt,
    Ot,
    Cn,
    Nc,
    Sw,
    Ew,
}

impl OperatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Bt => "bt",
            Self::Ot => "ot",
            Self::Cn => "cn",
            Self::Nc => "nc",
            Self::Sw => "sw",
            Self::Ew => "ew",
        }
    }

    pub fn is_range(self) -> bool {
        matches!(self, Self::Bt | Self::Ot)
    }

    pub fn is_textual(self) -> bool {
        matches!(self, Self::Cn | Self::Nc | Self::Sw | Self::Ew)
    }
}

impl FromStr for OperatorKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lt" => Ok(Self::Lt),
            "le" => Ok(Self::Le),
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "ge" => Ok(Self::Ge),
            "bt" => Ok(Self::Bt),
            "ot" => Ok(Self::Ot),
            "cn" => Ok(Self::Cn),
            "nc" => Ok(Self::Nc),
            "sw" => Ok(Self::Sw),
            "ew" => Ok(Self::Ew),
            other => Err(UnknownKind::new("operator", other)),
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Actions --

/// Reaction performed when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Send a message to the channel's notification target.
    Notification,
    /// Only write the match to the service log.
    Log,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::Log => "log",
        }
    }
}

impl FromStr for ActionKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notification" | "email" => Ok(Self::Notification),
            "log" => Ok(Self::Log),
            other => Err(UnknownKind::new("action", other)),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
