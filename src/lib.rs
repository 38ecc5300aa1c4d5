//! Guild Wars 2 API key handshake over a loopback redirect.
//!
//! A browser posts the key to a local callback server, the key is validated against the
//! account endpoint, and the browser is redirected to a page for the outcome. Once a key
//! is authorized, account and achievement data can be queried with it.

mod auth;
mod client;
mod error;
#[cfg(feature = "local-server")]
mod local_server;
mod types;

pub use auth::{AchievementNames, Gw2Auth};
pub use client::{
    ACCOUNT_ACHIEVEMENTS_PATH, ACCOUNT_PATH, ACHIEVEMENTS_PATH, ApiClient, ApiClientConfig,
    DEFAULT_API_BASE_URL, MAX_ACHIEVEMENT_IDS_PER_REQUEST,
};
pub use error::Gw2Error;
#[cfg(feature = "local-server")]
pub use local_server::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT, LOGIN_PATH, LocalServerConfig,
};
pub use types::{
    AccountAchievement, AccountInfo, AchievementInfo, ApiResponse, AuthorizationOutcome,
};
