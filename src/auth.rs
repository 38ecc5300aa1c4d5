use std::collections::BTreeMap;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;
#[cfg(feature = "local-server")]
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(feature = "local-server")]
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::client::{ApiClientConfig, MAX_ACHIEVEMENT_IDS_PER_REQUEST};
#[cfg(feature = "local-server")]
use crate::local_server::{LocalServer, LocalServerConfig, WorkerHandle};
use crate::{
    AccountAchievement, AccountInfo, AchievementInfo, ApiClient, ApiResponse,
    AuthorizationOutcome, Gw2Error,
};

const ALL_IDS_INVALID: &str = "all ids provided are invalid";

/// Completed achievements keyed by id. Ids whose details could not be resolved map to `None`.
pub type AchievementNames = BTreeMap<u64, Option<String>>;

#[derive(Debug, Clone)]
struct Session {
    api_key: String,
    account: AccountInfo,
}

#[cfg(feature = "local-server")]
#[derive(Debug, Default)]
struct ServerSlots {
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<WorkerHandle>,
}

#[derive(Debug)]
pub struct Gw2Auth {
    api: ApiClient,
    // Key and account info are swapped as one value.
    session: RwLock<Option<Session>>,
    #[cfg(feature = "local-server")]
    server_config: LocalServerConfig,
    #[cfg(feature = "local-server")]
    server: Mutex<ServerSlots>,
}

impl Gw2Auth {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            session: RwLock::new(None),
            #[cfg(feature = "local-server")]
            server_config: LocalServerConfig::default(),
            #[cfg(feature = "local-server")]
            server: Mutex::new(ServerSlots::default()),
        }
    }

    pub fn with_defaults() -> Result<Self, Gw2Error> {
        Ok(Self::new(ApiClient::new(ApiClientConfig::default())?))
    }

    #[cfg(feature = "local-server")]
    pub fn with_server_config(mut self, server_config: LocalServerConfig) -> Self {
        self.server_config = server_config;
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[cfg(feature = "local-server")]
    pub fn auth_server_uri(&self) -> String {
        self.server_config.redirect_uri()
    }

    #[cfg(feature = "local-server")]
    pub fn start_auth_server(self: &Arc<Self>) -> Result<(), Gw2Error> {
        let mut slots = self.server_slots();

        if slots.worker.is_some() {
            warn!("auth server thread is already running");
            return Err(Gw2Error::ServerAlreadyRunning);
        }
        if slots.shutdown.is_some() {
            warn!("auth server object already exists");
            return Err(Gw2Error::ServerAlreadyRunning);
        }

        let server = LocalServer::new(self.server_config.clone(), Arc::downgrade(self));
        let listener = server.bind()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = server.spawn(listener, shutdown_rx)?;

        slots.shutdown = Some(shutdown_tx);
        slots.worker = Some(worker);
        info!(uri = %self.auth_server_uri(), "auth server started");
        Ok(())
    }

    /// Blocks until the worker thread has exited and the listener is closed.
    #[cfg(feature = "local-server")]
    pub fn stop_auth_server(&self) -> Result<(), Gw2Error> {
        let mut slots = self.server_slots();

        if slots.shutdown.is_none() {
            warn!("auth server object does not exist");
            return Err(Gw2Error::ServerNotRunning);
        }
        if slots.worker.is_none() {
            warn!("auth server thread is not running");
            return Err(Gw2Error::ServerNotRunning);
        }

        let (Some(shutdown), Some(worker)) = (slots.shutdown.take(), slots.worker.take()) else {
            return Err(Gw2Error::ServerNotRunning);
        };
        let _ = shutdown.send(());

        match worker.join() {
            Ok(Ok(())) => {
                info!("auth server stopped");
                Ok(())
            }
            Ok(Err(err)) => {
                error!(error = %err, "auth server exited with an error");
                Ok(())
            }
            Err(_) => {
                error!("auth server thread panicked");
                Err(Gw2Error::ServerThreadPanicked)
            }
        }
    }

    #[cfg(feature = "local-server")]
    pub fn is_auth_server_running(&self) -> bool {
        let slots = self.server_slots();
        slots.worker.is_some() || slots.shutdown.is_some()
    }

    #[cfg(feature = "local-server")]
    fn server_slots(&self) -> MutexGuard<'_, ServerSlots> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn authenticate_with_api_key(
        &self,
        api_key: &str,
    ) -> Result<AuthorizationOutcome, Gw2Error> {
        let response = self.api.get_account_info(api_key).await?;
        Ok(self.apply_account_response(api_key, response))
    }

    fn apply_account_response(
        &self,
        api_key: &str,
        response: ApiResponse,
    ) -> AuthorizationOutcome {
        if response.body.is_none() {
            return AuthorizationOutcome::Failed;
        }

        if !response.is_ok() {
            let outcome = AuthorizationOutcome::from_error_text(response.error_text());
            if outcome == AuthorizationOutcome::Failed {
                error!(
                    status = response.status,
                    body = ?response.body,
                    "unrecognized account lookup failure"
                );
            }
            return outcome;
        }

        match response.parse::<AccountInfo>() {
            Ok(account) => {
                info!(account = %account.name, "api key authorized");
                let session = Session {
                    api_key: api_key.to_string(),
                    account,
                };
                *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
                AuthorizationOutcome::Finished
            }
            Err(err) => {
                error!(error = %err, "account response is not an account record");
                AuthorizationOutcome::FailedBadData
            }
        }
    }

    fn read_session<T>(&self, read: impl FnOnce(&Session) -> T) -> Option<T> {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        session.as_ref().map(read)
    }

    pub fn is_authorized(&self) -> bool {
        self.read_session(|_| ()).is_some()
    }

    pub fn api_key(&self) -> Option<String> {
        self.read_session(|session| session.api_key.clone())
    }

    pub fn account_info(&self) -> Option<AccountInfo> {
        self.read_session(|session| session.account.clone())
    }

    pub fn account_id(&self) -> Option<String> {
        self.read_session(|session| session.account.id.clone())
    }

    pub fn account_name(&self) -> Option<String> {
        self.read_session(|session| session.account.name.clone())
    }

    pub fn owned_games(&self) -> Option<Vec<String>> {
        self.read_session(|session| session.account.access.clone())
    }

    pub fn account_age(&self) -> Option<Duration> {
        self.read_session(|session| session.account.age())
    }

    pub async fn account_achievements(&self) -> Result<AchievementNames, Gw2Error> {
        let api_key = self.api_key().ok_or(Gw2Error::NotAuthorized)?;
        let mut names = AchievementNames::new();

        let response = self.api.get_account_achievements(&api_key).await?;
        if !response.is_ok() {
            warn!(
                status = response.status,
                text = ?response.error_text(),
                "failed to get account achievements"
            );
            return Ok(names);
        }

        let done: Vec<u64> = response
            .parse::<Vec<AccountAchievement>>()?
            .into_iter()
            .filter(|achievement| achievement.done)
            .map(|achievement| achievement.id)
            .collect();
        names.extend(done.iter().map(|id| (*id, None)));

        for chunk in done.chunks(MAX_ACHIEVEMENT_IDS_PER_REQUEST) {
            self.resolve_achievement_names(&api_key, chunk, &mut names)
                .await;
        }

        debug!(count = names.len(), "resolved account achievements");
        Ok(names)
    }

    async fn resolve_achievement_names(
        &self,
        api_key: &str,
        ids: &[u64],
        names: &mut AchievementNames,
    ) {
        let response = match self.api.get_achievements_info(api_key, ids).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, count = ids.len(), "failed to get achievements info");
                return;
            }
        };

        match response.status {
            200 | 206 => match response.parse::<Vec<AchievementInfo>>() {
                Ok(infos) => {
                    for info in infos {
                        if let Some(name) = names.get_mut(&info.id) {
                            *name = Some(info.name);
                        }
                    }
                }
                Err(err) => error!(error = %err, "achievements info is not a list"),
            },
            status if response.error_text() == Some(ALL_IDS_INVALID) => {
                warn!(status, count = ids.len(), "all achievement ids in chunk are invalid");
            }
            status => error!(status, "failed to get achievements info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn auth() -> Gw2Auth {
        Gw2Auth::new(ApiClient::new(ApiClientConfig::new("http://127.0.0.1:9")).unwrap())
    }

    fn account_body() -> serde_json::Value {
        json!({
            "id": "0A1B2C3D",
            "name": "Tester.1234",
            "access": ["GuildWars2", "PathOfFire"],
            "age": 7200
        })
    }

    #[test]
    fn success_stores_key_and_account() {
        let auth = auth();
        let response = ApiResponse {
            status: 200,
            body: Some(account_body()),
        };

        let outcome = auth.apply_account_response("KEY-1", response);
        assert_eq!(outcome, AuthorizationOutcome::Finished);
        assert_eq!(auth.api_key().as_deref(), Some("KEY-1"));
        assert_eq!(auth.account_id().as_deref(), Some("0A1B2C3D"));
        assert_eq!(auth.account_name().as_deref(), Some("Tester.1234"));
        assert_eq!(
            auth.owned_games(),
            Some(vec!["GuildWars2".to_string(), "PathOfFire".to_string()])
        );
        assert_eq!(auth.account_age(), Some(Duration::from_secs(7200)));
    }

    #[test]
    fn accessors_are_empty_before_authorization() {
        let auth = auth();
        assert!(!auth.is_authorized());
        assert_eq!(auth.api_key(), None);
        assert_eq!(auth.account_id(), None);
        assert_eq!(auth.account_name(), None);
        assert_eq!(auth.owned_games(), None);
        assert_eq!(auth.account_age(), None);
    }

    #[test]
    fn error_text_maps_to_outcome() {
        let auth = auth();
        let cases = [
            ("invalid key", AuthorizationOutcome::FailedInvalidKey),
            ("Invalid access token", AuthorizationOutcome::FailedInvalidToken),
            ("no game account", AuthorizationOutcome::FailedNoAccount),
            ("ErrBadData", AuthorizationOutcome::FailedBadData),
            ("something else", AuthorizationOutcome::Failed),
        ];
        for (text, expected) in cases {
            let response = ApiResponse {
                status: 401,
                body: Some(json!({ "text": text })),
            };
            assert_eq!(auth.apply_account_response("KEY", response), expected);
        }
        assert!(!auth.is_authorized());
    }

    #[test]
    fn failure_without_text_is_failed() {
        let auth = auth();
        let response = ApiResponse {
            status: 500,
            body: Some(json!({ "error": "oops" })),
        };
        assert_eq!(
            auth.apply_account_response("KEY", response),
            AuthorizationOutcome::Failed
        );
    }

    #[test]
    fn missing_body_is_failed_regardless_of_status() {
        let auth = auth();
        for status in [200, 404, 502] {
            let response = ApiResponse { status, body: None };
            assert_eq!(
                auth.apply_account_response("KEY", response),
                AuthorizationOutcome::Failed
            );
        }
        assert!(!auth.is_authorized());
    }

    #[test]
    fn success_with_malformed_account_is_bad_data() {
        let auth = auth();
        let response = ApiResponse {
            status: 200,
            body: Some(json!([1, 2, 3])),
        };
        assert_eq!(
            auth.apply_account_response("KEY", response),
            AuthorizationOutcome::FailedBadData
        );
        assert_eq!(auth.api_key(), None);
    }

    #[test]
    fn reauthorization_replaces_previous_session() {
        let auth = auth();
        auth.apply_account_response(
            "KEY-1",
            ApiResponse {
                status: 200,
                body: Some(account_body()),
            },
        );
        auth.apply_account_response(
            "KEY-2",
            ApiResponse {
                status: 200,
                body: Some(json!({ "id": "FFFF", "name": "Other.9876" })),
            },
        );

        assert_eq!(auth.api_key().as_deref(), Some("KEY-2"));
        assert_eq!(auth.account_name().as_deref(), Some("Other.9876"));
        assert_eq!(auth.owned_games(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn achievements_require_authorization() {
        let result = auth().account_achievements().await;
        assert!(matches!(result, Err(Gw2Error::NotAuthorized)));
    }

    #[cfg(feature = "local-server")]
    #[test]
    fn stop_without_start_fails() {
        let auth = auth();
        assert!(matches!(
            auth.stop_auth_server(),
            Err(Gw2Error::ServerNotRunning)
        ));
        assert!(!auth.is_auth_server_running());
    }

    #[cfg(feature = "local-server")]
    #[test]
    fn stop_with_missing_worker_leaves_slots_untouched() {
        let auth = auth();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        auth.server_slots().shutdown = Some(shutdown_tx);

        assert!(matches!(
            auth.stop_auth_server(),
            Err(Gw2Error::ServerNotRunning)
        ));
        assert!(auth.server_slots().shutdown.is_some());
        assert!(auth.is_auth_server_running());
        assert!(matches!(
            shutdown_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));
    }
}
