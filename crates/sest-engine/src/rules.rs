//! Rule evaluation.
//!
//! Rules are walked in stored order and, for each rule, the record's fields
//! are searched for the rule's target position. The first rule whose
//! condition holds wins and nothing after it is looked at.

use std::cmp::Ordering;

use sest_types::{Channel, EncodingKind, Field, OperatorKind, Record, Rule, RuleId};

use crate::codec;
use crate::error::{DecodeError, FieldError, RuleError};
use crate::store::FieldStore;

/// A rule that could not be checked against this record. The rule is skipped
/// and evaluation continues; this is not the same as "condition false".
#[derive(Debug)]
pub struct RuleFault {
    pub rule_id: RuleId,
    pub position: u16,
    pub error: FieldError,
}

#[derive(Debug)]
pub struct Evaluation<'c> {
    pub fired: Option<&'c Rule>,
    pub faults: Vec<RuleFault>,
}

/// Decide which single rule of `channel`, if any, fires for `record`.
///
/// `store` supplies the encodings used to coerce each target field; pass the
/// live store so that encodings changed after the record was written are
/// honoured. A misconfigured rule aborts the whole evaluation.
pub fn evaluate<'c, S: FieldStore + ?Sized>(
    channel: &'c Channel,
    record: &Record,
    store: &S,
) -> Result<Evaluation<'c>, RuleError> {
    let mut faults = Vec::new();

    for rule in &channel.rules {
        let Some(field) = record.fields.iter().find(|f| f.position == rule.position) else {
            continue;
        };

        match check(channel, rule, field, store) {
            Ok(true) => {
                return Ok(Evaluation {
                    fired: Some(rule),
                    faults,
                });
            }
            Ok(false) => {}
            Err(Check::Fault(error)) => faults.push(RuleFault {
                rule_id: rule.id,
                position: rule.position,
                error,
            }),
            Err(Check::Fatal(e)) => return Err(e),
        }
    }

    Ok(Evaluation { fired: None, faults })
}

enum Check {
    Fault(FieldError),
    Fatal(RuleError),
}

impl From<RuleError> for Check {
    fn from(e: RuleError) -> Self {
        Self::Fatal(e)
    }
}

fn check<S: FieldStore + ?Sized>(
    channel: &Channel,
    rule: &Rule,
    field: &Field,
    store: &S,
) -> Result<bool, Check> {
    let holds = match Condition::compile(rule)? {
        Condition::Text(test, needle) => test(&field.raw, needle),
        Condition::Compare(test, bound) => test(numeric_value(channel, rule, field, store)?.total_cmp(&bound)),
        Condition::Between(low, high) => within(low, numeric_value(channel, rule, field, store)?, high),
        Condition::Outside(low, high) => !within(low, numeric_value(channel, rule, field, store)?, high),
    };
    Ok(holds)
}

fn numeric_value<S: FieldStore + ?Sized>(
    channel: &Channel,
    rule: &Rule,
    field: &Field,
    store: &S,
) -> Result<f64, Check> {
    let position = field.position;
    let fault = |source| Check::Fault(FieldError::Decode { position, source });

    let encoding = match store.encoding_for(channel.id, position) {
        Ok(Some(EncodingKind::String)) => {
            return Err(invalid(
                rule,
                format!("numeric operator '{}' targets string field{}", rule.operator, position),
            )
            .into());
        }
        Ok(Some(encoding)) => encoding,
        Ok(None) => return Err(fault(DecodeError::NoEncoding)),
        Err(e) => return Err(Check::Fault(e.into())),
    };

    let value = codec::decode(&field.raw, Some(encoding)).map_err(fault)?;
    value
        .as_f64()
        .map(unsigned_zero)
        .ok_or_else(|| invalid(rule, format!("field{} has no numeric value", position)).into())
}

/// Exclusive on both ends, under the same ordering as the other operators.
fn within(low: f64, value: f64, high: f64) -> bool {
    low.total_cmp(&value).is_lt() && value.total_cmp(&high).is_lt()
}

/// `total_cmp` orders -0.0 below 0.0; every numeric operator treats them as equal.
fn unsigned_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

/// A rule's operator with its comparison values parsed.
enum Condition<'r> {
    Compare(fn(Ordering) -> bool, f64),
    Between(f64, f64),
    Outside(f64, f64),
    Text(fn(&str, &str) -> bool, &'r str),
}

impl<'r> Condition<'r> {
    fn compile(rule: &'r Rule) -> Result<Self, RuleError> {
        let compare = |test: fn(Ordering) -> bool| -> Result<Self, RuleError> {
            Ok(Self::Compare(test, bound(rule, &rule.value)?))
        };

        match rule.operator {
            OperatorKind::Lt => compare(Ordering::is_lt),
            OperatorKind::Le => compare(Ordering::is_le),
            OperatorKind::Eq => compare(Ordering::is_eq),
            OperatorKind::Ne => compare(Ordering::is_ne),
            OperatorKind::Gt => compare(Ordering::is_gt),
            OperatorKind::Ge => compare(Ordering::is_ge),
            OperatorKind::Bt => {
                let (low, high) = range(rule)?;
                Ok(Self::Between(low, high))
            }
            OperatorKind::Ot => {
                let (low, high) = range(rule)?;
                Ok(Self::Outside(low, high))
            }
            OperatorKind::Cn => Ok(Self::Text(|f, v| f.contains(v), &rule.value)),
            OperatorKind::Nc => Ok(Self::Text(|f, v| !f.contains(v), &rule.value)),
            OperatorKind::Sw => Ok(Self::Text(|f, v| f.starts_with(v), &rule.value)),
            OperatorKind::Ew => Ok(Self::Text(|f, v| f.ends_with(v), &rule.value)),
        }
    }
}

fn bound(rule: &Rule, text: &str) -> Result<f64, RuleError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(unsigned_zero)
        .ok_or_else(|| invalid(rule, format!("comparison value '{}' is not a number", text)))
}

fn range(rule: &Rule) -> Result<(f64, f64), RuleError> {
    let high = rule
        .value_optional
        .as_deref()
        .ok_or_else(|| invalid(rule, format!("range operator '{}' needs a second value", rule.operator)))?;
    Ok((bound(rule, &rule.value)?, bound(rule, high)?))
}

fn invalid(rule: &Rule, reason: String) -> RuleError {
    RuleError::InvalidRule {
        rule_id: rule.id,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{channel, record, rule};
    use sest_types::OperatorKind::*;

    fn float_channel(rules: Vec<Rule>) -> Channel {
        let mut ch = channel(3, &[(1, EncodingKind::Float), (2, EncodingKind::Float)]);
        ch.rules = rules;
        ch
    }

    fn fired_id(ch: &Channel, fields: &[(u16, &str)]) -> Option<RuleId> {
        evaluate(ch, &record(fields), ch).unwrap().fired.map(|r| r.id)
    }

    #[test]
    fn first_matching_rule_wins() {
        let ch = float_channel(vec![rule(1, Lt, 2, "10", None), rule(2, Eq, 2, "3.14", None)]);
        assert_eq!(fired_id(&ch, &[(2, "3.14")]), Some(1));
    }

    #[test]
    fn later_rules_are_not_evaluated() {
        // Rule 2 is broken; it must never be compiled once rule 1 fires.
        let ch = float_channel(vec![rule(1, Lt, 2, "10", None), rule(2, Bt, 2, "0", None)]);
        assert_eq!(fired_id(&ch, &[(2, "3.14")]), Some(1));
    }

    #[test]
    fn numeric_operators() {
        let cases = [
            (Lt, "10", true),
            (Lt, "3.141592", false),
            (Le, "3.141592", true),
            (Eq, "3.141592", true),
            (Ne, "3.141592", false),
            (Gt, "1", true),
            (Ge, "3.141592", true),
            (Ge, "4", false),
        ];
        for (op, value, expected) in cases {
            let ch = float_channel(vec![rule(1, op, 2, value, None)]);
            assert_eq!(fired_id(&ch, &[(2, "3.141592")]).is_some(), expected, "{op} {value}");
        }
    }

    #[test]
    fn between_is_exclusive() {
        let ch = float_channel(vec![rule(1, Bt, 2, "0", Some("10"))]);
        assert_eq!(fired_id(&ch, &[(2, "7")]), Some(1));
        assert_eq!(fired_id(&ch, &[(2, "0")]), None);
        assert_eq!(fired_id(&ch, &[(2, "10")]), None);
    }

    #[test]
    fn outside_includes_bounds() {
        let ch = float_channel(vec![rule(1, Ot, 2, "0", Some("10"))]);
        assert_eq!(fired_id(&ch, &[(2, "7")]), None);
        assert_eq!(fired_id(&ch, &[(2, "10")]), Some(1));
        assert_eq!(fired_id(&ch, &[(2, "-1")]), Some(1));
    }

    #[test]
    fn negative_zero_is_zero_for_every_operator() {
        let cases = [
            (Lt, "0", None, false),
            (Le, "0", None, true),
            (Eq, "0", None, true),
            (Eq, "-0", None, true),
            (Ge, "0", None, true),
            (Bt, "-1", Some("0"), false),
            (Bt, "-0", Some("1"), false),
            (Ot, "-1", Some("0"), true),
        ];
        for (op, value, high, expected) in cases {
            let ch = float_channel(vec![rule(1, op, 1, value, high)]);
            assert_eq!(fired_id(&ch, &[(1, "-0")]).is_some(), expected, "{op} {value}");
        }

        let mut ch = channel(3, &[(1, EncodingKind::Integer)]);
        ch.rules = vec![rule(1, Lt, 1, "0", None)];
        assert_eq!(fired_id(&ch, &[(1, "-0.5")]), None);
    }

    #[test]
    fn string_operators_use_raw_text() {
        let mut ch = channel(3, &[(1, EncodingKind::String)]);
        ch.rules = vec![
            rule(1, Sw, 1, "err", None),
            rule(2, Ew, 1, "jam", None),
            rule(3, Cn, 1, "door", None),
            rule(4, Nc, 1, "ok", None),
        ];
        assert_eq!(fired_id(&ch, &[(1, "error: jam")]), Some(1));
        assert_eq!(fired_id(&ch, &[(1, "paper jam")]), Some(2));
        assert_eq!(fired_id(&ch, &[(1, "front door open")]), Some(3));
        assert_eq!(fired_id(&ch, &[(1, "idle")]), Some(4));
        assert_eq!(fired_id(&ch, &[(1, "ok")]), None);
    }

    #[test]
    fn no_rules_never_fires() {
        let ch = float_channel(vec![]);
        let eval = evaluate(&ch, &record(&[(1, "1"), (2, "2")]), &ch).unwrap();
        assert!(eval.fired.is_none());
        assert!(eval.faults.is_empty());
    }

    #[test]
    fn absent_target_field_moves_on() {
        let ch = float_channel(vec![rule(1, Gt, 3, "0", None), rule(2, Gt, 1, "0", None)]);
        assert_eq!(fired_id(&ch, &[(1, "5")]), Some(2));
    }

    #[test]
    fn decode_fault_skips_only_that_rule() {
        let mut ch = float_channel(vec![rule(1, Gt, 1, "0", None), rule(2, Gt, 2, "0", None)]);
        // field1 was stored under another encoding and no longer decodes
        ch.encodings.insert(1, EncodingKind::Integer);
        let eval = evaluate(&ch, &record(&[(1, "warm"), (2, "5")]), &ch).unwrap();

        assert_eq!(eval.fired.map(|r| r.id), Some(2));
        assert_eq!(eval.faults.len(), 1);
        assert_eq!(eval.faults[0].rule_id, 1);
        assert!(matches!(
            eval.faults[0].error,
            FieldError::Decode {
                source: DecodeError::WrongEncoding { .. },
                ..
            }
        ));
    }

    #[test]
    fn missing_encoding_is_a_fault_not_false() {
        let ch = float_channel(vec![rule(1, Gt, 3, "0", None)]);
        let eval = evaluate(&ch, &record(&[(3, "5")]), &ch).unwrap();
        assert!(eval.fired.is_none());
        assert!(matches!(
            eval.faults[0].error,
            FieldError::Decode {
                source: DecodeError::NoEncoding,
                ..
            }
        ));
    }

    #[test]
    fn numeric_operator_on_string_field_is_invalid() {
        let mut ch = channel(3, &[(1, EncodingKind::String)]);
        ch.rules = vec![rule(9, Eq, 1, "3", None)];
        let err = evaluate(&ch, &record(&[(1, "3")]), &ch).unwrap_err();
        assert!(matches!(err, RuleError::InvalidRule { rule_id: 9, .. }));
    }

    #[test]
    fn range_without_second_value_is_invalid() {
        let ch = float_channel(vec![rule(4, Ot, 1, "0", None)]);
        let err = evaluate(&ch, &record(&[(1, "5")]), &ch).unwrap_err();
        assert_eq!(err.code(), "INVALID_RULE");
    }

    #[test]
    fn non_numeric_bound_is_invalid() {
        let ch = float_channel(vec![rule(5, Lt, 1, "ten", None)]);
        assert!(evaluate(&ch, &record(&[(1, "5")]), &ch).is_err());
    }
}
