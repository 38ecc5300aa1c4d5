use thiserror::Error;

#[derive(Debug, Error)]
pub enum Gw2Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid response: {message}")]
    InvalidResponse { message: String, body: String },

    #[error("no api key has been authorized yet")]
    NotAuthorized,

    #[cfg(feature = "local-server")]
    #[error("auth server is already running")]
    ServerAlreadyRunning,

    #[cfg(feature = "local-server")]
    #[error("auth server is not running")]
    ServerNotRunning,

    #[cfg(feature = "local-server")]
    #[error("auth server thread panicked")]
    ServerThreadPanicked,

    #[cfg(feature = "cli")]
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[cfg(feature = "cli")]
    #[error("authorization timed out after {timeout:?}")]
    AuthorizationTimeout { timeout: std::time::Duration },
}
