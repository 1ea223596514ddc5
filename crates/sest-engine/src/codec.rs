use sest_types::{ChannelId, EncodingKind, Field, TypedValue};

use crate::error::{DecodeError, FieldError};
use crate::store::FieldStore;

/// Restore a typed value from its wire/stored text.
///
/// `None` stands for a position without a declared encoding and always
/// yields [`DecodeError::NoEncoding`]. Strings are never invalid here; empty
/// submissions are refused before decoding.
pub fn decode(raw: &str, encoding: Option<EncodingKind>) -> Result<TypedValue, DecodeError> {
    let encoding = encoding.ok_or(DecodeError::NoEncoding)?;
    let wrong = || DecodeError::WrongEncoding {
        encoding,
        raw: raw.to_string(),
    };

    match encoding {
        EncodingKind::Float => parse_float(raw).map(TypedValue::Float).ok_or_else(wrong),
        // Integers go through the float parser first so "42.0" is accepted,
        // then truncate toward zero.
        EncodingKind::Integer => parse_float(raw)
            .and_then(truncate)
            .map(TypedValue::Integer)
            .ok_or_else(wrong),
        EncodingKind::String => Ok(TypedValue::Text(raw.to_string())),
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

fn truncate(value: f64) -> Option<i64> {
    let whole = value.trunc();
    // i64::MAX is not representable as f64; the nearest value above it is.
    if whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
        return None;
    }
    Some(whole as i64)
}

/// Decode `raw` at `position` using the channel's current encoding.
pub fn decode_stored<S: FieldStore + ?Sized>(
    store: &S,
    channel: ChannelId,
    position: u16,
    raw: &str,
) -> Result<TypedValue, FieldError> {
    let encoding = store.encoding_for(channel, position)?;
    decode(raw, encoding).map_err(|source| FieldError::Decode { position, source })
}

/// Re-check already stored fields against the channel's current encodings.
///
/// Encodings may change after data was stored; this reports every field that
/// no longer decodes instead of letting the failure surface on first read.
pub fn revalidate<'a, S, I>(
    store: &S,
    channel: ChannelId,
    fields: I,
) -> anyhow::Result<Vec<(&'a Field, DecodeError)>>
where
    S: FieldStore + ?Sized,
    I: IntoIterator<Item = &'a Field>,
{
    let mut faults = Vec::new();
    for field in fields {
        match decode_stored(store, channel, field.position, &field.raw) {
            Ok(_) => {}
            Err(FieldError::Decode { source, .. }) => faults.push((field, source)),
            Err(FieldError::Store(e)) => return Err(e),
        }
    }
    Ok(faults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::channel;

    #[test]
    fn float_literals() {
        for (text, expected) in [("3.141592", 3.141592), ("-0.5", -0.5), ("1e3", 1000.0), (" 42 ", 42.0)] {
            assert_eq!(decode(text, Some(EncodingKind::Float)), Ok(TypedValue::Float(expected)));
        }
    }

    #[test]
    fn float_rejects_garbage() {
        for text in ["abc", "", "3.14abc", "nan", "inf", "1,5"] {
            let err = decode(text, Some(EncodingKind::Float)).unwrap_err();
            assert_eq!(
                err,
                DecodeError::WrongEncoding {
                    encoding: EncodingKind::Float,
                    raw: text.to_string()
                },
                "{text:?} should not decode"
            );
        }
    }

    #[test]
    fn integer_truncates_decimal_literals() {
        assert_eq!(decode("42", Some(EncodingKind::Integer)), Ok(TypedValue::Integer(42)));
        assert_eq!(decode("3.9", Some(EncodingKind::Integer)), Ok(TypedValue::Integer(3)));
        assert_eq!(decode("-3.9", Some(EncodingKind::Integer)), Ok(TypedValue::Integer(-3)));
        assert!(matches!(
            decode("abc", Some(EncodingKind::Integer)),
            Err(DecodeError::WrongEncoding { .. })
        ));
        assert!(decode("1e300", Some(EncodingKind::Integer)).is_err());
    }

    #[test]
    fn string_is_identity() {
        assert_eq!(
            decode("open door", Some(EncodingKind::String)),
            Ok(TypedValue::Text("open door".into()))
        );
    }

    #[test]
    fn missing_encoding_is_distinct() {
        assert_eq!(decode("1.0", None), Err(DecodeError::NoEncoding));
        assert_eq!(decode("abc", None), Err(DecodeError::NoEncoding));
        assert_ne!(DecodeError::NoEncoding.code(), decode("abc", Some(EncodingKind::Float)).unwrap_err().code());
    }

    #[test]
    fn stored_fields_use_current_encoding() {
        let mut ch = channel(3, &[(1, EncodingKind::Float)]);
        let field = Field {
            record_id: 1,
            position: 1,
            raw: "21.5".into(),
        };

        assert_eq!(decode_stored(&ch, ch.id, 1, &field.raw).unwrap(), TypedValue::Float(21.5));
        assert!(revalidate(&ch, ch.id, [&field]).unwrap().is_empty());

        // Encoding changed after storage: the old value no longer fits.
        ch.encodings.insert(1, EncodingKind::Integer);
        assert!(revalidate(&ch, ch.id, [&field]).unwrap().is_empty());
        let text = Field {
            raw: "warm".into(),
            ..field.clone()
        };
        let faults = revalidate(&ch, ch.id, [&field, &text]).unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].0.raw, "warm");

        ch.encodings.clear();
        let faults = revalidate(&ch, ch.id, [&field]).unwrap();
        assert_eq!(faults[0].1, DecodeError::NoEncoding);
    }
}
