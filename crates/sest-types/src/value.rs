use serde::Serialize;

/// A field value restored from its stored text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Float(f64),
    Integer(i64),
    Text(String),
}

impl TypedValue {
    /// Numeric view used by comparison operators. Text has none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::Text(_) => None,
        }
    }
}
