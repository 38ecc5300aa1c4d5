//! Loopback HTTP endpoint that receives the API key form post and redirects the
//! browser to a result page.

mod config;
mod http;
mod server;

pub use config::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT, LOGIN_PATH, LocalServerConfig,
};
pub(crate) use server::{LocalServer, WorkerHandle};
