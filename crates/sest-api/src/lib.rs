/// HTTP surface of SEST.
///
/// Ingestion (`POST /{channel_id}/`) is authenticated by the channel's write
/// key; everything under `/channels` and `/notification-targets` needs a
/// bearer token and only ever shows the caller's own resources.

pub mod auth;
pub mod channels;
pub mod error;
pub mod ingest;
pub mod middleware;
pub mod records;
pub mod rules;
pub mod targets;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use tracing::error;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// All routes, with auth applied to the management ones.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/users", post(auth::register))
        .route("/{channel_id}/", post(ingest::ingest));

    let protected = Router::new()
        .route("/channels", post(channels::create_channel).get(channels::list_channels))
        .route("/channels/{id}", get(channels::get_channel).delete(channels::delete_channel))
        .route("/channels/{id}/write-key", post(channels::regenerate_write_key))
        .route(
            "/channels/{id}/encodings/{position}",
            put(channels::declare_encoding).delete(channels::remove_encoding),
        )
        .route("/channels/{id}/rules", post(rules::create_rule))
        .route("/channels/{id}/rules/{rule_id}", delete(rules::delete_rule))
        .route("/channels/{id}/notification-target", put(targets::set_channel_target))
        .route("/channels/{id}/records", get(records::list_records))
        .route("/channels/{id}/revalidate", get(records::revalidate_channel))
        .route("/notification-targets", post(targets::create_target))
        .route("/notification-targets/{address}", delete(targets::delete_target))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new().merge(public).merge(protected).with_state(state)
}

pub async fn health() -> &'static str {
    "ok"
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.to_string())
    })?
}
