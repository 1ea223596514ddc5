use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use sest_db::NewRule;
use sest_types::api::CreateRuleRequest;
use sest_types::{ActionKind, Channel, ChannelId, OperatorKind, RuleId};

use crate::auth::AppState;
use crate::channels::{check_position, owned_channel};
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::run_blocking;

/// POST /channels/{id}/rules
pub async fn create_rule(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let rule = run_blocking(move || {
        let channel = owned_channel(&db, id, &claims)?;
        let rule = parse_rule(&channel, req)?;
        Ok(db.add_rule(id, &rule)?)
    })
    .await?;
    info!(channel_id = id, rule_id = rule.id, operator = %rule.operator, "Rule created");

    Ok((StatusCode::CREATED, Json(rule)))
}

/// DELETE /channels/{id}/rules/{rule_id}
pub async fn delete_rule(
    State(state): State<AppState>,
    Path((id, rule_id)): Path<(ChannelId, RuleId)>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    run_blocking(move || {
        owned_channel(&db, id, &claims)?;
        if db.delete_rule(id, rule_id)? {
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(ApiError::not_found(
                "RULE_NOT_FOUND",
                format!("Rule {} does not exist on channel {}.", rule_id, id),
            ))
        }
    })
    .await
}

/// Reject rules that could never be evaluated.
fn parse_rule(channel: &Channel, req: CreateRuleRequest) -> Result<NewRule, ApiError> {
    let invalid = |message: String| ApiError::invalid("INVALID_RULE", message);

    let operator: OperatorKind = req.operator.parse().map_err(|e: sest_types::UnknownKind| invalid(e.to_string()))?;
    let action: ActionKind = req
        .action
        .parse()
        .map_err(|e: sest_types::UnknownKind| ApiError::invalid("UNSUPPORTED_ACTION", e.to_string()))?;
    check_position(channel, req.field_no)?;

    if !operator.is_textual() {
        if channel.encodings.get(&req.field_no).is_some_and(|e| !e.is_numeric()) {
            return Err(invalid(format!(
                "'{}' compares numbers but field{} is a string.",
                operator, req.field_no
            )));
        }
        require_number(&req.value).map_err(invalid)?;
    }

    let value_optional = match (operator.is_range(), req.value_optional) {
        (true, None) => {
            return Err(invalid(format!("'{}' needs value_optional as its upper bound.", operator)));
        }
        (true, Some(high)) => {
            require_number(&high).map_err(invalid)?;
            Some(high)
        }
        (false, other) => other,
    };

    Ok(NewRule {
        operator,
        position: req.field_no,
        value: req.value,
        value_optional,
        action,
    })
}

fn require_number(text: &str) -> Result<(), String> {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(()),
        _ => Err(format!("'{}' is not a number.", text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sest_types::EncodingKind;

    fn channel() -> Channel {
        Channel {
            id: 1,
            owner: "test".into(),
            title: String::new(),
            description: String::new(),
            write_key: "k".into(),
            max_fields: 3,
            last_update: Utc::now(),
            notification_target: None,
            encodings: [(1, EncodingKind::Float), (2, EncodingKind::String)].into_iter().collect(),
            rules: Vec::new(),
        }
    }

    fn req(operator: &str, field_no: u16, value: &str, value_optional: Option<&str>, action: &str) -> CreateRuleRequest {
        CreateRuleRequest {
            operator: operator.into(),
            field_no,
            value: value.into(),
            value_optional: value_optional.map(Into::into),
            action: action.into(),
        }
    }

    fn code(result: Result<NewRule, ApiError>) -> &'static str {
        result.unwrap_err().error_code()
    }

    #[test]
    fn accepts_well_formed_rules() {
        let rule = parse_rule(&channel(), req("bt", 1, "0", Some("10"), "email")).unwrap();
        assert_eq!(rule.operator, OperatorKind::Bt);
        assert_eq!(rule.action, ActionKind::Notification);

        let rule = parse_rule(&channel(), req("cn", 2, "door", None, "log")).unwrap();
        assert_eq!(rule.action, ActionKind::Log);
    }

    #[test]
    fn rejects_broken_rules() {
        let ch = channel();
        assert_eq!(code(parse_rule(&ch, req("approx", 1, "1", None, "log"))), "INVALID_RULE");
        assert_eq!(code(parse_rule(&ch, req("lt", 1, "1", None, "sms"))), "UNSUPPORTED_ACTION");
        assert_eq!(code(parse_rule(&ch, req("ot", 1, "1", None, "log"))), "INVALID_RULE");
        assert_eq!(code(parse_rule(&ch, req("bt", 1, "1", Some("x"), "log"))), "INVALID_RULE");
        assert_eq!(code(parse_rule(&ch, req("gt", 1, "warm", None, "log"))), "INVALID_RULE");
        assert_eq!(code(parse_rule(&ch, req("eq", 2, "3", None, "log"))), "INVALID_RULE");
        assert_eq!(code(parse_rule(&ch, req("gt", 4, "3", None, "log"))), "INVALID_POSITION");
    }
}
