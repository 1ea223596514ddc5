use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use sest_engine::{decode_stored, revalidate};
use sest_types::api::{ErrorBody, FieldFault, FieldView, RecordView, RevalidationReport};
use sest_types::{Channel, ChannelId, Record};

use crate::auth::AppState;
use crate::channels::owned_channel;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::run_blocking;

const MAX_RECORDS_PAGE: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub limit: Option<u32>,
}

/// GET /channels/{id}/records?limit=N
///
/// Newest first. Each field is decoded under the channel's current encoding;
/// a field that no longer decodes carries its error instead of a value.
pub async fn list_records(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<Vec<RecordView>>, ApiError> {
    let limit = query.limit.unwrap_or(state.records_page).clamp(1, MAX_RECORDS_PAGE);

    let db = state.db.clone();
    run_blocking(move || {
        let channel = owned_channel(&db, id, &claims)?;
        let records = db.recent_records(id, limit)?;
        Ok(Json(records.iter().map(|r| view(&channel, r)).collect()))
    })
    .await
}

fn view(channel: &Channel, record: &Record) -> RecordView {
    let fields = record
        .fields
        .iter()
        .map(|field| {
            let (value, error) = match decode_stored(channel, channel.id, field.position, &field.raw) {
                Ok(value) => (Some(value), None),
                Err(e) => (
                    None,
                    Some(ErrorBody {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    }),
                ),
            };
            FieldView {
                field_no: field.position,
                raw: field.raw.clone(),
                value,
                error,
            }
        })
        .collect();

    RecordView {
        id: record.id,
        insertion_time: record.insertion_time,
        fields,
    }
}

/// GET /channels/{id}/revalidate
pub async fn revalidate_channel(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<RevalidationReport>, ApiError> {
    let db = state.db.clone();
    run_blocking(move || {
        owned_channel(&db, id, &claims)?;
        let fields = db.channel_fields(id)?;
        let faults = revalidate(&*db, id, &fields)?
            .into_iter()
            .map(|(field, e)| FieldFault {
                record_id: field.record_id,
                field_no: field.position,
                code: e.code().to_string(),
                message: e.to_string(),
            })
            .collect();

        Ok(Json(RevalidationReport {
            channel_id: id,
            checked: fields.len(),
            faults,
        }))
    })
    .await
}
