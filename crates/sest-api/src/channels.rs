use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use sest_db::Database;
use sest_types::api::{CreateChannelRequest, DeclareEncodingRequest, WriteKeyResponse};
use sest_types::{Channel, ChannelId, EncodingKind, FieldEncoding};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::run_blocking;

/// Load a channel the caller owns. Someone else's channel reads as missing.
pub(crate) fn owned_channel(db: &Database, id: ChannelId, claims: &Claims) -> Result<Channel, ApiError> {
    db.load_channel(id)?
        .filter(|c| c.owner == claims.sub)
        .ok_or_else(|| ApiError::channel_not_found(id))
}

pub(crate) fn check_position(channel: &Channel, position: u16) -> Result<(), ApiError> {
    if position == 0 || position > channel.max_fields {
        return Err(ApiError::invalid(
            "INVALID_POSITION",
            format!("Channel {} has fields 1 to {}; got {}.", channel.id, channel.max_fields, position),
        ));
    }
    Ok(())
}

/// POST /channels
pub async fn create_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.max_fields == 0 || req.max_fields > state.max_fields {
        return Err(ApiError::invalid(
            "INVALID_MAX_FIELDS",
            format!("max_fields must be between 1 and {}.", state.max_fields),
        ));
    }

    let db = state.db.clone();
    let channel =
        run_blocking(move || Ok(db.create_channel(&claims.sub, &req.title, &req.description, req.max_fields)?))
            .await?;
    info!(channel_id = channel.id, "Channel created: {}", channel);

    Ok((StatusCode::CREATED, Json(channel)))
}

/// GET /channels
pub async fn list_channels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    let db = state.db.clone();
    let channels = run_blocking(move || Ok(db.list_channels(&claims.sub)?)).await?;
    Ok(Json(channels))
}

/// GET /channels/{id}
pub async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Channel>, ApiError> {
    let db = state.db.clone();
    let channel = run_blocking(move || owned_channel(&db, id, &claims)).await?;
    Ok(Json(channel))
}

/// DELETE /channels/{id}
pub async fn delete_channel(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    run_blocking(move || {
        owned_channel(&db, id, &claims)?;
        db.delete_channel(id)?;
        Ok(())
    })
    .await?;
    info!(channel_id = id, "Channel deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /channels/{id}/write-key
pub async fn regenerate_write_key(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<WriteKeyResponse>, ApiError> {
    let db = state.db.clone();
    let write_key = run_blocking(move || {
        owned_channel(&db, id, &claims)?;
        db.regenerate_write_key(id)?.ok_or_else(|| ApiError::channel_not_found(id))
    })
    .await?;
    info!(channel_id = id, "Write key regenerated");
    Ok(Json(WriteKeyResponse { write_key }))
}

/// PUT /channels/{id}/encodings/{position}
pub async fn declare_encoding(
    State(state): State<AppState>,
    Path((id, position)): Path<(ChannelId, u16)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DeclareEncodingRequest>,
) -> Result<Json<FieldEncoding>, ApiError> {
    let encoding: EncodingKind = req
        .encoding
        .parse()
        .map_err(|e: sest_types::UnknownKind| ApiError::invalid("UNKNOWN_ENCODING", e.to_string()))?;

    let db = state.db.clone();
    run_blocking(move || {
        let channel = owned_channel(&db, id, &claims)?;
        check_position(&channel, position)?;
        match db.declare_encoding(id, position, encoding)? {
            None => Ok(()),
            Some(rule_id) => Err(ApiError::conflict(
                "ENCODING_CONFLICT",
                format!(
                    "Rule {} compares field{} as a number; delete it before declaring {}.",
                    rule_id, position, encoding
                ),
            )),
        }
    })
    .await?;
    info!(channel_id = id, field_no = position, %encoding, "Encoding declared");

    Ok(Json(FieldEncoding {
        channel_id: id,
        position,
        encoding,
    }))
}

/// DELETE /channels/{id}/encodings/{position}
pub async fn remove_encoding(
    State(state): State<AppState>,
    Path((id, position)): Path<(ChannelId, u16)>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    run_blocking(move || {
        owned_channel(&db, id, &claims)?;
        if db.remove_encoding(id, position)? {
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(ApiError::not_found(
                "ENCODING_NOT_FOUND",
                format!("field{} of channel {} has no encoding.", position, id),
            ))
        }
    })
    .await
}
