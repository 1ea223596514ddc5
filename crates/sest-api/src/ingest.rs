use std::collections::BTreeMap;

use axum::{
    Form, Json,
    extract::{Path, State, rejection::FormRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use sest_types::ChannelId;
use sest_types::api::IngestResponse;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

pub const WRITE_KEY_HEADER: &str = "x-sest-write-key";
/// Older clients send this one.
pub const LEGACY_WRITE_KEY_HEADER: &str = "x-write-api-key";

/// POST /{channel_id}/ with `field<N>=value` pairs, form encoded.
///
/// A body that is not a form is only reported once the write key checks out.
pub async fn ingest(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
    headers: HeaderMap,
    form: Result<Form<BTreeMap<String, String>>, FormRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let write_key = headers
        .get(WRITE_KEY_HEADER)
        .or_else(|| headers.get(LEGACY_WRITE_KEY_HEADER))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let ingested = run_blocking(move || match form {
        Ok(Form(fields)) => Ok(state.coordinator.ingest(channel_id, write_key.as_deref(), &fields)?),
        Err(rejection) => Err(state
            .coordinator
            .reject_malformed(channel_id, write_key.as_deref(), rejection.body_text())
            .into()),
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            record_id: ingested.record.id,
            insertion_time: ingested.record.insertion_time,
            fields: ingested.record.fields.len(),
        }),
    ))
}
