use std::net::TcpListener;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use axum::{Router, routing::post};
use tokio::net::TcpListener as TokioTcpListener;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::{Gw2Auth, Gw2Error};

use super::config::{LOGIN_PATH, LocalServerConfig};
use super::http::{LocalServerState, fallback_handler, login_handler};

const WORKER_THREAD_NAME: &str = "gw2-auth-server";

pub(crate) type WorkerHandle = JoinHandle<Result<(), Gw2Error>>;

#[derive(Debug, Clone)]
pub(crate) struct LocalServer {
    config: LocalServerConfig,
    auth: Weak<Gw2Auth>,
}

impl LocalServer {
    pub(crate) fn new(config: LocalServerConfig, auth: Weak<Gw2Auth>) -> Self {
        Self { config, auth }
    }

    pub(crate) fn bind(&self) -> Result<TcpListener, Gw2Error> {
        TcpListener::bind((self.config.host.as_str(), self.config.port)).map_err(Gw2Error::from)
    }

    pub(crate) fn router(&self) -> Router {
        let state = LocalServerState {
            auth: self.auth.clone(),
            template_dir: self.config.template_dir.clone().map(Arc::new),
        };

        Router::new()
            .route(LOGIN_PATH, post(login_handler).fallback(fallback_handler))
            .fallback(fallback_handler)
            .with_state(state)
    }

    pub(crate) fn spawn(
        self,
        listener: TcpListener,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<WorkerHandle, Gw2Error> {
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || -> Result<(), Gw2Error> {
                let runtime = Builder::new_current_thread().enable_all().build()?;
                runtime.block_on(self.serve_until(listener, shutdown_rx))
            })?;
        Ok(handle)
    }

    async fn serve_until(
        &self,
        listener: TcpListener,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<(), Gw2Error> {
        listener.set_nonblocking(true)?;
        let listener = TokioTcpListener::from_std(listener)?;

        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            let _ = drain_rx.await;
        });
        let mut server_handle = tokio::spawn(async move { server.await });

        tokio::select! {
            joined = &mut server_handle => return server_result(joined),
            _ = shutdown_rx => {}
        }

        debug!("auth server draining");
        let _ = drain_tx.send(());
        match tokio::time::timeout(self.config.drain_timeout, &mut server_handle).await {
            Ok(joined) => server_result(joined),
            Err(_) => {
                warn!(
                    timeout = ?self.config.drain_timeout,
                    "in-flight requests did not finish, closing them"
                );
                server_handle.abort();
                Ok(())
            }
        }
    }
}

fn server_result(joined: Result<std::io::Result<()>, JoinError>) -> Result<(), Gw2Error> {
    match joined {
        Ok(result) => result.map_err(Gw2Error::from),
        Err(err) if err.is_panic() => Err(Gw2Error::ServerThreadPanicked),
        Err(_) => Ok(()),
    }
}
