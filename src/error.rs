use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    InvalidHeaderValue(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),

    #[error(transparent)]
    TlsError(#[from] native_tls::Error),

    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),

    #[error("Missing hub access token (set hub.token or env var {0})")]
    MissingToken(String),

    #[error("Host collaborator failed: {0}")]
    HostError(String),
}

impl HubError {
    #[must_use]
    pub fn host_error(msg: impl Into<String>) -> Self {
        Self::HostError(msg.into())
    }
}

pub type HubResult<T> = Result<T, HubError>;
