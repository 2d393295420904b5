use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid notify configuration: {0}")]
    InvalidConfig(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected http status {0}")]
    HttpStatus(StatusCode),
    #[error("server rejected request: {0}")]
    Server(String),
    #[error("websocket error: {0}")]
    Channel(#[from] tokio_tungstenite::tungstenite::Error),
}
