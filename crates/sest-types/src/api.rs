use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChannelId, RecordId};
use crate::value::TypedValue;

// -- Errors --

/// Body of every rejected request. `code` is stable; clients branch on it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    pub nick: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterUserResponse {
    pub nick: String,
    pub token: String,
}

// -- Channels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub max_fields: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteKeyResponse {
    pub write_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclareEncodingRequest {
    pub encoding: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRuleRequest {
    pub operator: String,
    pub field_no: u16,
    pub value: String,
    #[serde(default)]
    pub value_optional: Option<String>,
    pub action: String,
}

// -- Notification targets --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTargetRequest {
    pub address: String,
}

/// `address: None` detaches the channel's current target.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetTargetRequest {
    pub address: Option<String>,
}

// -- Records --

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub record_id: RecordId,
    pub insertion_time: DateTime<Utc>,
    pub fields: usize,
}

#[derive(Debug, Serialize)]
pub struct FieldView {
    pub field_no: u16,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<TypedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct RecordView {
    pub id: RecordId,
    pub insertion_time: DateTime<Utc>,
    pub fields: Vec<FieldView>,
}

#[derive(Debug, Serialize)]
pub struct FieldFault {
    pub record_id: RecordId,
    pub field_no: u16,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RevalidationReport {
    pub channel_id: ChannelId,
    pub checked: usize,
    pub faults: Vec<FieldFault>,
}
