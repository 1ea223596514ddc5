use sest_types::ChannelId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("channel {0} has no notification target")]
    MissingTarget(ChannelId),

    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification to '{address}' rejected ({code}): {message}")]
    Rejected {
        address: String,
        code: i64,
        message: String,
    },
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingTarget(_) => "MISSING_TARGET",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Rejected { .. } => "NOTIFICATION_REJECTED",
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
