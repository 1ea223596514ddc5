use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use sest_notify::postmark::DEFAULT_URL;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SEST_JWT_SECRET is unset or still a placeholder")]
    JwtSecret,

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub max_fields: u16,
    pub records_page: u32,
    pub postmark_token: Option<String>,
    pub postmark_url: String,
    pub from_address: String,
    pub dispatch_queue: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("SEST_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::JwtSecret);
        }

        let host = var("SEST_HOST", "0.0.0.0");
        let port = var("SEST_PORT", "8000");
        let addr_text = format!("{}:{}", host, port);
        let addr = addr_text.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            name: "SEST_HOST/SEST_PORT",
            value: addr_text.clone(),
        })?;

        let max_fields: u16 = parse(&lookup, "SEST_MAX_FIELDS", "8")?;
        if max_fields == 0 {
            return Err(ConfigError::Invalid {
                name: "SEST_MAX_FIELDS",
                value: "0".into(),
            });
        }

        Ok(Self {
            addr,
            db_path: var("SEST_DB_PATH", "sest.db").into(),
            jwt_secret,
            max_fields,
            records_page: parse(&lookup, "SEST_RECORDS_PAGE", "10")?,
            postmark_token: lookup("SEST_POSTMARK_TOKEN").filter(|t| !t.is_empty()),
            postmark_url: var("SEST_POSTMARK_URL", DEFAULT_URL),
            from_address: var("SEST_FROM_ADDRESS", "alerts@sest.local"),
            dispatch_queue: parse(&lookup, "SEST_DISPATCH_QUEUE", "1024")?,
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    let value = lookup(name).unwrap_or_else(|| default.to_string());
    value.parse().map_err(|_| ConfigError::Invalid { name, value })
}
