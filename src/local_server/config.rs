use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 13338;
pub const LOGIN_PATH: &str = "/login";

/// Grace period for in-flight requests once the server has been told to stop.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const BUNDLED_PAGES: &[(&str, &[u8])] = &[
    ("login", include_bytes!("html/login.html")),
    ("finished", include_bytes!("html/finished.html")),
    ("login_failed", include_bytes!("html/login_failed.html")),
    ("login_noaccount", include_bytes!("html/login_noaccount.html")),
    ("login_baddata", include_bytes!("html/login_baddata.html")),
    ("404", include_bytes!("html/404.html")),
];

#[derive(Debug, Clone)]
pub struct LocalServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory of `<page>.html` files overriding the bundled pages.
    pub template_dir: Option<PathBuf>,
    pub drain_timeout: Duration,
}

impl Default for LocalServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl LocalServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            template_dir: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, LOGIN_PATH)
    }

    pub fn with_template_dir(mut self, template_dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(template_dir.into());
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }
}
