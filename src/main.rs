use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gw2_connect::{
    ApiClient, ApiClientConfig, DEFAULT_API_BASE_URL, DEFAULT_HOST, DEFAULT_PORT, Gw2Auth,
    Gw2Error, LocalServerConfig,
};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(
    name = "gw2-connect",
    about = "Authorize a Guild Wars 2 API key in the browser and print the account as JSON."
)]
struct Cli {
    /// Loopback host for the callback server.
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port for the callback server.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory with the result page templates.
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Base URL of the remote API.
    #[arg(long, default_value = DEFAULT_API_BASE_URL)]
    api_base: String,

    /// Seconds to wait for the browser handshake.
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Authorize this key directly instead of through the browser.
    #[arg(long, env = "GW2_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Also resolve the names of completed achievements.
    #[arg(long)]
    achievements: bool,
}

#[tokio::main]
async fn main() -> Result<(), Gw2Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GW2_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let api = ApiClient::new(ApiClientConfig::new(cli.api_base.clone()))?;
    let mut server_config = LocalServerConfig::new(cli.host.clone(), cli.port);
    if let Some(templates) = &cli.templates {
        server_config = server_config.with_template_dir(templates);
    }
    let auth = Arc::new(Gw2Auth::new(api).with_server_config(server_config));

    match &cli.api_key {
        Some(api_key) => {
            let outcome = auth.authenticate_with_api_key(api_key).await?;
            if !outcome.is_finished() {
                warn!(?outcome, "api key was not accepted");
                println!("{}", to_json(&json!({ "outcome": outcome }))?);
                return Ok(());
            }
        }
        None => authorize_in_browser(&auth, Duration::from_secs(cli.timeout)).await?,
    }

    let mut output = json!({ "account": auth.account_info() });
    if cli.achievements {
        output["achievements"] = json!(auth.account_achievements().await?);
    }

    println!("{}", to_json(&output)?);
    Ok(())
}

async fn authorize_in_browser(auth: &Arc<Gw2Auth>, timeout: Duration) -> Result<(), Gw2Error> {
    auth.start_auth_server()?;

    let uri = auth.auth_server_uri();
    eprintln!("Open this page to enter your API key:\n{uri}");
    if let Err(err) = webbrowser::open(&uri) {
        eprintln!("Failed to open browser automatically: {err}");
    }

    let waited = tokio::time::timeout(timeout, async {
        while !auth.is_authorized() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await;

    // Give the browser a moment to load the result page before the server goes away.
    if waited.is_ok() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let stopping = Arc::clone(auth);
    tokio::task::spawn_blocking(move || stopping.stop_auth_server()).await??;

    match waited {
        Ok(()) => {
            info!(account = ?auth.account_name(), "authorized");
            Ok(())
        }
        Err(_) => Err(Gw2Error::AuthorizationTimeout { timeout }),
    }
}

fn to_json(value: &serde_json::Value) -> Result<String, Gw2Error> {
    Ok(serde_json::to_string_pretty(value)?)
}
