#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use sessionkit::config::{ClientConfig, Timeouts, normalize_base_url};
use sessionkit::error::{ConfigError, TransportError};
use sessionkit::net::auth_api::HttpAuthApi;
use sessionkit::net::transport::{HttpTransport, ReqwestTransport};
use sessionkit::net::types::Credentials;
use sessionkit::state::session::Outcome;
use sessionkit::storage::FileTokenStorage;
use sessionkit::{ApiClient, ApiError, Location, RenderDecision, RouteGuard, SessionStore};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Login(String),
    #[error("not signed in; run `sessionkit-cli login` first")]
    NotSignedIn,
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "sessionkit-cli", about = "Session and access-control client CLI")]
struct Cli {
    #[arg(long, env = "SESSIONKIT_BASE_URL", default_value = sessionkit::config::DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = "SESSIONKIT_LOGIN_PATH", default_value = sessionkit::config::DEFAULT_LOGIN_PATH)]
    login_path: String,

    #[arg(long, env = "SESSIONKIT_TOKEN_KEY", default_value = sessionkit::config::DEFAULT_TOKEN_KEY)]
    token_key: String,

    #[arg(long, env = "SESSIONKIT_TOKEN_FILE", default_value = ".sessionkit.json")]
    token_file: PathBuf,

    #[arg(long, env = "SESSIONKIT_REQUEST_TIMEOUT_SECS", default_value_t = sessionkit::config::DEFAULT_REQUEST_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    request_timeout_secs: u64,

    #[arg(long, env = "SESSIONKIT_CONNECT_TIMEOUT_SECS", default_value_t = sessionkit::config::DEFAULT_CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the issued token.
    Login {
        username: String,
        #[arg(long, env = "SESSIONKIT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Restore the persisted session and print the signed-in user.
    Whoami,
    /// End the session and clear the persisted token.
    Logout,
    /// Send an authorized request and print the response body.
    Request {
        method: String,
        path: String,
        #[arg(long, help = "JSON request body")]
        data: Option<String>,
    },
    /// Print what a protected route would render for `path`.
    Guard { path: String },
}

struct Client {
    store: Arc<SessionStore>,
    api: ApiClient,
    login_path: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig {
        base_url: normalize_base_url(&cli.base_url)?,
        login_path: cli.login_path,
        token_key: cli.token_key,
        timeouts: Timeouts { request_secs: cli.request_timeout_secs, connect_secs: cli.connect_timeout_secs },
    };
    let client = connect(&config, cli.token_file)?;

    match cli.command {
        Command::Login { username, password } => run_login(&client, username, password).await,
        Command::Whoami => run_whoami(&client).await,
        Command::Logout => run_logout(&client).await,
        Command::Request { method, path, data } => run_request(&client, &method, &path, data.as_deref()).await,
        Command::Guard { path } => run_guard(&client, &path).await,
    }
}

fn connect(config: &ClientConfig, token_file: PathBuf) -> Result<Client, CliError> {
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(config.timeouts)?);
    let auth = Arc::new(HttpAuthApi::new(config.base_url.clone(), transport.clone()));
    let storage = Arc::new(FileTokenStorage::new(token_file, config.token_key.clone()));
    let store = Arc::new(SessionStore::new(auth, storage));
    let api = ApiClient::new(config.base_url.clone(), transport, store.clone());
    tracing::debug!(base_url = %config.base_url, login_path = %config.login_path, "client configured");
    Ok(Client { store, api, login_path: config.login_path.clone() })
}

async fn run_login(client: &Client, username: String, password: String) -> Result<(), CliError> {
    client.store.restore_session().await;
    if client.store.login(Credentials::new(username, password)).await == Outcome::Superseded {
        return Err(CliError::Login("login superseded".to_owned()));
    }
    let session = client.store.snapshot();
    if let Some(err) = session.error {
        return Err(CliError::Login(err.message));
    }
    let user = session.user.ok_or(CliError::NotSignedIn)?;
    eprintln!("signed in as {}", user.username);
    Ok(())
}

async fn run_whoami(client: &Client) -> Result<(), CliError> {
    client.store.restore_session().await;
    let user = client.store.snapshot().user.ok_or(CliError::NotSignedIn)?;
    print_json(&serde_json::to_value(user)?)
}

async fn run_logout(client: &Client) -> Result<(), CliError> {
    client.store.restore_session().await;
    client.store.logout().await;
    eprintln!("signed out");
    Ok(())
}

async fn run_request(client: &Client, method: &str, path: &str, data: Option<&str>) -> Result<(), CliError> {
    let method =
        Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| CliError::InvalidMethod(method.to_owned()))?;
    let body = data.map(serde_json::from_str::<Value>).transpose()?;

    client.store.restore_session().await;
    let response = client.api.request(method, path, body).await?;
    eprintln!("HTTP {}", response.status);
    match serde_json::from_str::<Value>(&response.body) {
        Ok(json) => print_json(&json),
        Err(_) => {
            println!("{}", response.body);
            Ok(())
        }
    }
}

async fn run_guard(client: &Client, path: &str) -> Result<(), CliError> {
    client.store.restore_session().await;
    let guard = RouteGuard::new(client.store.clone(), client.login_path.clone());
    let decision = guard.decide(&Location::parse(path));
    match decision {
        RenderDecision::Placeholder => println!("placeholder"),
        RenderDecision::Render => println!("render"),
        RenderDecision::Redirect { to, resume } => println!("redirect {to} (resume {})", resume.href()),
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
