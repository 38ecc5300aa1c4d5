use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use crate::{AuthorizationOutcome, Gw2Auth};

use super::config::BUNDLED_PAGES;

const API_KEY_FIELD: &str = "apikey";
const NOT_FOUND_TEMPLATE: &str = "404";
const NOT_FOUND_FALLBACK: &str = "ERROR: FILE NOT FOUND";

const FINISHED_LOCATION: &str = "/finished";
const NO_ACCOUNT_LOCATION: &str = "/login_noaccount";
const BAD_DATA_LOCATION: &str = "/login_baddata";
const FAILED_LOCATION: &str = "/login_failed";
const NOT_FOUND_LOCATION: &str = "/404";

#[derive(Clone)]
pub(super) struct LocalServerState {
    pub(super) auth: Weak<Gw2Auth>,
    pub(super) template_dir: Option<Arc<PathBuf>>,
}

pub(super) async fn login_handler(State(state): State<LocalServerState>, body: Bytes) -> Response {
    let outcome = match parse_api_key(&body) {
        Some(api_key) => authenticate(&state.auth, &api_key).await,
        None => {
            warn!("login form submitted without an api key");
            None
        }
    };
    redirect(redirect_location(outcome))
}

pub(super) async fn fallback_handler(
    State(state): State<LocalServerState>,
    method: Method,
    uri: Uri,
) -> Response {
    match method {
        Method::HEAD => StatusCode::NO_CONTENT.into_response(),
        Method::GET => match &state.template_dir {
            Some(template_dir) => page_response(template_dir, uri.path()).await,
            None => bundled_page_response(uri.path()),
        },
        Method::POST => redirect(NOT_FOUND_LOCATION),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn authenticate(auth: &Weak<Gw2Auth>, api_key: &str) -> Option<AuthorizationOutcome> {
    let Some(auth) = auth.upgrade() else {
        error!("authorization coordinator dropped while the server was running");
        return None;
    };

    match auth.authenticate_with_api_key(api_key).await {
        Ok(outcome) => {
            info!(?outcome, "api key handshake finished");
            Some(outcome)
        }
        Err(err) => {
            error!(error = %err, "error while authorizing api key");
            None
        }
    }
}

fn parse_api_key(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| *key == API_KEY_FIELD)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn redirect_location(outcome: Option<AuthorizationOutcome>) -> &'static str {
    match outcome {
        Some(AuthorizationOutcome::Finished) => FINISHED_LOCATION,
        Some(AuthorizationOutcome::FailedNoAccount) => NO_ACCOUNT_LOCATION,
        Some(AuthorizationOutcome::FailedBadData) => BAD_DATA_LOCATION,
        _ => FAILED_LOCATION,
    }
}

fn redirect(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn page_response(template_dir: &Path, path: &str) -> Response {
    if let Some(page) = template_path(template_dir, path.trim_start_matches('/')) {
        match tokio::fs::read(&page).await {
            Ok(content) => return html(StatusCode::OK, content),
            Err(err) => debug!(page = %page.display(), error = %err, "page not served"),
        }
    }

    let not_found = template_dir.join(format!("{NOT_FOUND_TEMPLATE}.html"));
    match tokio::fs::read(&not_found).await {
        Ok(content) => html(StatusCode::NOT_FOUND, content),
        Err(_) => html(StatusCode::NOT_FOUND, NOT_FOUND_FALLBACK.as_bytes().to_vec()),
    }
}

fn bundled_page_response(path: &str) -> Response {
    let name = path.trim_start_matches('/');
    if let Some((_, content)) = BUNDLED_PAGES.iter().find(|(page, _)| *page == name) {
        return html(StatusCode::OK, content.to_vec());
    }

    let not_found = BUNDLED_PAGES
        .iter()
        .find(|(page, _)| *page == NOT_FOUND_TEMPLATE)
        .map_or(NOT_FOUND_FALLBACK.as_bytes(), |(_, content)| *content);
    html(StatusCode::NOT_FOUND, not_found.to_vec())
}

fn template_path(template_dir: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return None;
    }
    Some(template_dir.join(format!("{name}.html")))
}

fn html(status: StatusCode, content: Vec<u8>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        content,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn parses_api_key_from_form() {
        assert_eq!(
            parse_api_key(b"apikey=ABCD-1234&remember=on").as_deref(),
            Some("ABCD-1234")
        );
        assert_eq!(
            parse_api_key(b"apikey=%20ABCD%2D1234+").as_deref(),
            Some("ABCD-1234")
        );
    }

    #[test]
    fn missing_or_blank_api_key_is_rejected() {
        assert_eq!(parse_api_key(b""), None);
        assert_eq!(parse_api_key(b"api_key=ABCD"), None);
        assert_eq!(parse_api_key(b"apikey="), None);
        assert_eq!(parse_api_key(b"apikey=+++"), None);
        assert_eq!(parse_api_key(&[0xff, 0xfe, 0x00]), None);
    }

    #[test]
    fn outcomes_route_to_result_pages() {
        assert_eq!(
            redirect_location(Some(AuthorizationOutcome::Finished)),
            "/finished"
        );
        assert_eq!(
            redirect_location(Some(AuthorizationOutcome::FailedNoAccount)),
            "/login_noaccount"
        );
        assert_eq!(
            redirect_location(Some(AuthorizationOutcome::FailedBadData)),
            "/login_baddata"
        );
        for outcome in [
            Some(AuthorizationOutcome::Failed),
            Some(AuthorizationOutcome::FailedInvalidKey),
            Some(AuthorizationOutcome::FailedInvalidToken),
            None,
        ] {
            assert_eq!(redirect_location(outcome), "/login_failed");
        }
    }

    #[test]
    fn template_path_rejects_traversal() {
        let dir = Path::new("/srv/html");
        assert_eq!(
            template_path(dir, "finished"),
            Some(dir.join("finished.html"))
        );
        assert_eq!(template_path(dir, ""), None);
        assert_eq!(template_path(dir, "../secret"), None);
        assert_eq!(template_path(dir, ".hidden"), None);
        assert_eq!(template_path(dir, "a/b"), None);
        assert_eq!(template_path(dir, "a\\b"), None);
    }
}
