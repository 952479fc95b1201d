//! session-cli: drive a Sessionward auth service from the terminal.
//!
//! The session is kept in a JSON file between invocations, the same way a
//! browser keeps it in local storage between page loads. Results go to
//! stdout as JSON; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use sessionward::prelude::*;

type Service = AuthService<HttpBackend<FileStore>, FileStore>;

#[derive(Parser)]
#[command(name = "session-cli")]
#[command(about = "Inspect and manage a client-side auth session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Auth backend URL (e.g. https://xyz.supabase.co)
    #[arg(long, env = "SESSIONWARD_API_URL")]
    api_url: String,

    /// Public API key sent with every request
    #[arg(long, env = "SESSIONWARD_ANON_KEY", default_value = "", hide_env_values = true)]
    anon_key: String,

    /// Public origin of the application; overrides the config file
    #[arg(long, env = "SESSIONWARD_SITE_URL")]
    site_url: Option<String>,

    /// File the session is persisted in
    #[arg(long, env = "SESSIONWARD_STORE", default_value = ".sessionward/session.json")]
    store: PathBuf,

    /// JSON configuration file
    #[arg(long, env = "SESSIONWARD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Check the stored session and print diagnostics
    Status,
    /// Sign in with email and password
    SignIn {
        email: String,
        #[arg(long, env = "SESSIONWARD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account (a confirmation email is sent)
    SignUp {
        email: String,
        #[arg(long, env = "SESSIONWARD_PASSWORD", hide_env_values = true)]
        password: String,
        /// Display name stored as profile data
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign out on this device and everywhere else
    SignOut,
    /// Repair stored session records and confirm with the backend
    Repair,
    /// Clear every trace of the session, even if it is unreadable
    Reset,
    /// Print the authorization URL for a federated sign-in
    OauthUrl {
        #[arg(value_enum)]
        provider: Provider,
    },
    /// Finish a federated sign-in or recovery from the callback URL
    CompleteRedirect { url: String },
    /// Send a password-reset email
    ForgotPassword { email: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Google,
    Microsoft,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AuthConfig::from_json_file(path)?,
        None => AuthConfig::default(),
    };
    if let Some(site_url) = cli.site_url.clone() {
        config.site_url = site_url;
    }

    let backend = HttpBackend::new(
        &cli.api_url,
        cli.anon_key.clone(),
        StoreAdapter::new(FileStore::new(&cli.store), config.storage.clone()),
    )
    .context("failed to configure auth backend")?;
    let auth = AuthService::init(config, Arc::new(backend), FileStore::new(&cli.store))?;

    let result = run(&auth, cli.command).await;
    auth.destroy();
    result
}

async fn run(auth: &Service, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            let valid = auth.check_session().await;
            print(&json!({ "valid": valid, "session": auth.get_session_info() }))
        }
        Command::SignIn { email, password } => {
            let session = auth.sign_in(&email, &password).await?;
            print(&json!({ "user": session.derive_user(), "expires_at": session.expiry() }))
        }
        Command::SignUp {
            email,
            password,
            name,
        } => {
            let data = match name {
                Some(name) => json!({ "full_name": name }),
                None => json!({}),
            };
            let outcome = auth.sign_up(&email, &password, data).await?;
            print(&json!({
                "user": outcome.user,
                "confirmation_sent": outcome.confirmation_sent,
            }))
        }
        Command::SignOut => print(&auth.sign_out().await),
        Command::Repair => print(&json!({ "repaired": auth.repair_session().await })),
        Command::Reset => {
            auth.reset_auth_system().await;
            print(&auth.get_session_info())
        }
        Command::OauthUrl { provider } => {
            let url = match provider {
                Provider::Google => auth.sign_in_with_google().await?,
                Provider::Microsoft => auth.sign_in_with_microsoft().await?,
            };
            println!("{url}");
            Ok(())
        }
        Command::CompleteRedirect { url } => {
            let session = auth
                .backend()
                .complete_redirect(&url)
                .context("failed to complete sign-in")?;
            print(&json!({ "user": session.derive_user(), "expires_at": session.expiry() }))
        }
        Command::ForgotPassword { email } => {
            auth.reset_password(&email).await?;
            print(&json!({ "sent": true }))
        }
    }
}

fn print(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
