//! # argocd-apply
//!
//! Command-line entry point. One subcommand per resource kind, each taking
//! the same connection and manifest flags.
//!
//! ## Usage
//!
//! ```bash
//! # Apply the applications section of a manifest
//! argocd-apply applications -f deploy/argocd.yaml -l argocd.example.com -t "$TOKEN"
//!
//! # Repositories, logging in with username/password instead of a token
//! argocd-apply repositories -f deploy/argocd.yaml -u admin -p "$PASSWORD"
//!
//! # Projects from a differently named section/directory
//! argocd-apply projects -f deploy/argocd.yaml -s team-projects
//! ```

use anyhow::{Context, Result};
use argocd_apply::argocd::ArgoCdClient;
use argocd_apply::config::{parse_bool_flag, ArgoCdConfig, AuthMode, ConnectionOptions};
use argocd_apply::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_PACING_SECS, ENV_ARGOCD_AUTH_MODE, ENV_ARGOCD_AUTH_TOKEN,
    ENV_ARGOCD_PASSWORD, ENV_ARGOCD_URL, ENV_ARGOCD_USERNAME, ENV_ARGOCD_VERIFY_SSL,
};
use argocd_apply::dispatcher::{Dispatcher, RunOutcome, RunSummary};
use argocd_apply::manifest::{ManifestLoader, ResourceKind};
use argocd_apply::provider::CloudSecretResolver;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info, warn};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Apply ArgoCD resources from a YAML manifest
#[derive(Parser)]
#[command(name = "argocd-apply")]
#[command(
    version = VERSION,
    about = "Apply ArgoCD applications, projects and repositories from a YAML manifest",
    long_about = None,
    after_help = "\
Manifest layout:
  <dir>/<manifest>.yaml             sections of resources with enabled/method/secrets
  <dir>/<section>/<name>.yaml       body of each resource, may use ${VAR} placeholders

Examples:
  argocd-apply applications -f deploy/argocd.yaml
  argocd-apply repositories -f deploy/argocd.yaml --verify-ssl false
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, update or delete ArgoCD applications
    Applications(ApplyArgs),
    /// Create, update or delete ArgoCD projects
    Projects(ApplyArgs),
    /// Create, update or delete ArgoCD repositories
    Repositories(ApplyArgs),
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Hosted ArgoCD server URL
    #[arg(short = 'l', long, env = ENV_ARGOCD_URL)]
    host_url: Option<String>,

    /// ArgoCD account token with permissions on the resource kind
    #[arg(short = 't', long, env = ENV_ARGOCD_AUTH_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Verify the server TLS certificate
    #[arg(long, env = ENV_ARGOCD_VERIFY_SSL, value_name = "true|false", value_parser = parse_bool_flag)]
    verify_ssl: Option<bool>,

    /// Manifest file listing the resources to apply
    #[arg(short = 'f', long)]
    config_file: PathBuf,

    /// Manifest section and body directory (defaults to the subcommand name)
    #[arg(short = 's', long)]
    service_type: Option<String>,

    /// ArgoCD username for session login
    #[arg(short = 'u', long, env = ENV_ARGOCD_USERNAME)]
    username: Option<String>,

    /// ArgoCD password for session login
    #[arg(short = 'p', long, env = ENV_ARGOCD_PASSWORD, hide_env_values = true)]
    password: Option<String>,

    /// Authentication strategy (token if a token is given, else session)
    #[arg(long, value_enum, env = ENV_ARGOCD_AUTH_MODE)]
    auth_mode: Option<AuthMode>,

    /// Seconds to wait between two applied resources
    #[arg(long, default_value_t = DEFAULT_PACING_SECS)]
    pacing_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl ApplyArgs {
    fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            host_url: self.host_url.clone(),
            token: self.token.clone(),
            verify_ssl: self.verify_ssl,
            username: self.username.clone(),
            password: self.password.clone(),
            auth_mode: self.auth_mode,
            timeout: Some(Duration::from_secs(self.timeout_secs)),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before clap reads the ARGOCD_* fallbacks
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "argocd_apply=info".into()),
        )
        .init();

    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    // rustls 0.23 needs a process-wide provider when several are compiled in
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Applications(args) => apply(ResourceKind::Application, args).await,
        Commands::Projects(args) => apply(ResourceKind::Project, args).await,
        Commands::Repositories(args) => apply(ResourceKind::Repository, args).await,
    };
    if let Err(e) = &result {
        eprintln!("Error: {e:?}");
    }
    ExitCode::from(exit_status(&result))
}

/// `1` for any fatal error, otherwise the run outcome's status
fn exit_status(result: &Result<RunOutcome>) -> u8 {
    match result {
        Ok(outcome) => outcome.exit_status(),
        Err(_) => 1,
    }
}

async fn apply(kind: ResourceKind, args: ApplyArgs) -> Result<RunOutcome> {
    let section = args
        .service_type
        .clone()
        .unwrap_or_else(|| kind.default_section().to_string());

    let resolver = CloudSecretResolver;
    let resources = ManifestLoader::new(&resolver)
        .load(&args.config_file, &section)
        .await
        .with_context(|| format!("Failed to load config file: {}", args.config_file.display()))?;

    if resources.is_empty() {
        println!(
            "Nothing to apply: no {section} enabled in {}",
            args.config_file.display()
        );
        return Ok(RunOutcome::NothingToApply);
    }
    info!("Applying {} {} resources", resources.len(), kind);

    let config = ArgoCdConfig::from_options(args.connection_options())?;
    let client = ArgoCdClient::connect(&config)
        .await
        .with_context(|| format!("Failed to connect to ArgoCD at {}", config.server_url))?;

    let results = Dispatcher::new(&client, kind)
        .with_pacing(Duration::from_secs(args.pacing_secs))
        .run(resources)
        .await?;

    let summary = RunSummary::from_results(&results);
    println!("{summary}");
    Ok(RunOutcome::Completed(summary))
}
