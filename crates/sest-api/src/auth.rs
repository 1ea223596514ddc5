use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use sest_db::Database;
use sest_engine::Coordinator;
use sest_notify::ReactionQueue;
use sest_types::api::{RegisterUserRequest, RegisterUserResponse};

use crate::error::ApiError;
use crate::middleware::Claims;
use crate::run_blocking;
use crate::targets::is_address;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub coordinator: Coordinator<Arc<Database>, ReactionQueue>,
    pub jwt_secret: String,
    /// Upper bound for any channel's declared field count.
    pub max_fields: u16,
    /// Records returned by a listing when no limit is given.
    pub records_page: u32,
}

const TOKEN_DAYS: i64 = 30;
const MAX_NICK_LEN: usize = 30;

/// POST /users
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_nick(&req.nick)?;
    if !is_address(&req.email) {
        return Err(ApiError::invalid("INVALID_EMAIL", format!("'{}' is not an email address.", req.email)));
    }

    let db = state.db.clone();
    let nick = req.nick.clone();
    run_blocking(move || {
        db.create_user(&req.nick, &req.email)?
            .ok_or_else(|| ApiError::conflict("USER_EXISTS", format!("User '{}' already exists.", req.nick)))
    })
    .await?;

    let token = create_token(&state.jwt_secret, &nick).map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(nick = %nick, "User registered");

    Ok((StatusCode::CREATED, Json(RegisterUserResponse { nick, token })))
}

pub fn create_token(secret: &str, nick: &str) -> jsonwebtoken::errors::Result<String> {
    let claims = Claims {
        sub: nick.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_DAYS)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

fn validate_nick(nick: &str) -> Result<(), ApiError> {
    let valid = !nick.is_empty()
        && nick.len() <= MAX_NICK_LEN
        && nick.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::invalid(
            "INVALID_NICK",
            format!("Nicks are 1 to {} letters, digits, '.', '_' or '-'.", MAX_NICK_LEN),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nick_rules() {
        assert!(validate_nick("weather_station-1").is_ok());
        assert!(validate_nick("").is_err());
        assert!(validate_nick("has space").is_err());
        assert!(validate_nick(&"x".repeat(31)).is_err());
    }

    #[test]
    fn token_carries_nick() {
        let token = create_token("secret", "alice").unwrap();
        let data = jsonwebtoken::decode::<Claims>(
            &token,
            &jsonwebtoken::DecodingKey::from_secret(b"secret"),
            &jsonwebtoken::Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "alice");
    }
}
