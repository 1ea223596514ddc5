use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use sest_types::ChannelId;
use sest_types::api::{CreateTargetRequest, SetTargetRequest};

use crate::auth::AppState;
use crate::channels::owned_channel;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::run_blocking;

/// Loose shape check: one `@` with something on both sides, no whitespace.
pub(crate) fn is_address(text: &str) -> bool {
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !text.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn target_not_found(address: &str) -> ApiError {
    ApiError::not_found("TARGET_NOT_FOUND", format!("Notification target '{}' does not exist.", address))
}

/// POST /notification-targets
pub async fn create_target(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTargetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_address(&req.address) {
        return Err(ApiError::invalid(
            "INVALID_ADDRESS",
            format!("'{}' is not an email address.", req.address),
        ));
    }

    let db = state.db.clone();
    let target = run_blocking(move || {
        db.create_target(&claims.sub, &req.address)?.ok_or_else(|| {
            ApiError::conflict(
                "TARGET_EXISTS",
                format!("Notification target '{}' already exists.", req.address),
            )
        })
    })
    .await?;
    info!(owner = %target.owner, "Notification target created");

    Ok((StatusCode::CREATED, Json(target)))
}

/// DELETE /notification-targets/{address}
pub async fn delete_target(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    run_blocking(move || {
        match db.get_target(&address)? {
            Some(target) if target.owner == claims.sub => {}
            _ => return Err(target_not_found(&address)),
        }
        db.delete_target(&address)?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

/// PUT /channels/{id}/notification-target
pub async fn set_channel_target(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetTargetRequest>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    run_blocking(move || {
        owned_channel(&db, id, &claims)?;
        if let Some(address) = &req.address {
            match db.get_target(address)? {
                Some(target) if target.owner == claims.sub => {}
                _ => return Err(target_not_found(address)),
            }
        }
        db.set_notification_target(id, req.address.as_deref())?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}
