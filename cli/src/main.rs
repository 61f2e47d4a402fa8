//! mamwrap: wrap, sign and publish applications on a MAM platform.
//!
//! Usage:
//!   mamwrap policies
//!   mamwrap wrap --app 40213 --policy 6 --policy 11 --sign-with 812
//!   mamwrap sign --app 40213 --credential 812 --no-wait
//!   mamwrap credentials
//!   mamwrap publish --file app.ipa --metadata metadata.json
//!
//! Credentials come from `MAMWRAP_USER` / `MAMWRAP_PASSWORD` (or `--user`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mamwrap_client::{ClientConfig, ConfigOverrides, LoadOptions, PlatformClient};
use mamwrap_contracts::{
    error::{MamError, MamResult},
    ids::Psk,
    job::JobResult,
};
use mamwrap_core::{Publisher, SigningJobDriver, SigningMode, WrapJobDriver};
use mamwrap_policy::{PolicyCatalog, PolicySelection};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mamwrap", about = "Wrap, sign and publish applications on a MAM platform")]
struct Cli {
    /// Config file (default: $MAMWRAP_CONFIG, then ./mamwrap.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Region to talk to, e.g. `na` or `eu`.
    #[arg(long, global = true)]
    region: Option<String>,

    #[arg(long, global = true)]
    user: Option<String>,

    /// Seconds between status polls.
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    /// Give up after this many polls. Unbounded when omitted.
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the selectable policies.
    Policies,
    /// Apply policies to an application and wrap it.
    Wrap {
        #[arg(long)]
        app: String,
        /// Policy id to enable; repeat for several. None clears all policies.
        #[arg(long = "policy")]
        policies: Vec<u32>,
        /// Sign the wrapped binary with this credential afterwards.
        #[arg(long)]
        sign_with: Option<String>,
    },
    /// Sign an application with a stored credential.
    Sign {
        #[arg(long)]
        app: String,
        #[arg(long)]
        credential: String,
        /// Return once the platform accepts the request.
        #[arg(long)]
        no_wait: bool,
    },
    /// List stored signing credentials.
    Credentials,
    /// Upload a binary and publish it as a new application.
    Publish {
        #[arg(long)]
        file: PathBuf,
        /// JSON file with the application metadata.
        #[arg(long)]
        metadata: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // RUST_LOG=debug for request-level output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("mamwrap: {}", e);
            std::process::exit(2);
        }
    }
}

/// Run one subcommand. `Ok(false)` means the platform reported a failed job.
fn run(cli: Cli) -> MamResult<bool> {
    let config = ClientConfig::load(LoadOptions {
        config_path: cli.config,
        overrides: ConfigOverrides {
            region: cli.region,
            poll_interval_secs: cli.poll_interval,
            poll_max_attempts: cli.max_attempts,
            user: cli.user,
            ..ConfigOverrides::default()
        },
    })?;

    match cli.command {
        Command::Policies => {
            list_policies(&load_catalog(&config)?);
            Ok(true)
        }
        Command::Wrap { app, policies, sign_with } => {
            wrap(&config, Psk::new(app), policies, sign_with.map(Psk::new))
        }
        Command::Sign { app, credential, no_wait } => {
            let mode = if no_wait { SigningMode::FireAndForget } else { SigningMode::Wait };
            let client = Arc::new(PlatformClient::connect(&config)?);
            sign(&config, client, &Psk::new(app), &Psk::new(credential), mode)
        }
        Command::Credentials => {
            let client = PlatformClient::connect(&config)?;
            for credential in client.credentials()? {
                println!(
                    "{:<10} {}",
                    credential.psk,
                    credential.description.as_deref().unwrap_or("-")
                );
            }
            Ok(true)
        }
        Command::Publish { file, metadata } => {
            let metadata = read_metadata(&metadata)?;
            let client = Arc::new(PlatformClient::connect(&config)?);
            let app_id = Publisher::new(client.clone(), client).publish(&file, &metadata)?;
            println!("published application {}", app_id);
            Ok(true)
        }
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn load_catalog(config: &ClientConfig) -> MamResult<PolicyCatalog> {
    match &config.catalog_path {
        Some(path) => PolicyCatalog::from_file(path),
        None => PolicyCatalog::builtin(),
    }
}

fn list_policies(catalog: &PolicyCatalog) {
    println!("{:>3}  {:<28} {}", "ID", "NAME", "DESCRIPTION");
    for definition in catalog.definitions() {
        println!(
            "{:>3}  {:<28} {}",
            definition.id, definition.display_name, definition.description
        );
    }
}

fn wrap(
    config: &ClientConfig,
    app: Psk,
    policies: Vec<u32>,
    sign_with: Option<Psk>,
) -> MamResult<bool> {
    let catalog = Arc::new(load_catalog(config)?);
    let client = Arc::new(PlatformClient::connect(config)?);

    let driver = WrapJobDriver::new(catalog, client.clone(), client.clone(), client.clone())
        .with_poll_policy(config.poll_policy());
    let report = driver.run(&app, &PolicySelection::new(policies))?;

    info!(job_id = %report.job_id, action = report.action.label(), "wrap finished");
    print_result("wrap", &report.result);

    match sign_with {
        Some(credential) if report.result.is_success() => {
            sign(config, client, &app, &credential, SigningMode::Wait)
        }
        _ => Ok(report.result.is_success()),
    }
}

fn sign(
    config: &ClientConfig,
    client: Arc<PlatformClient>,
    app: &Psk,
    credential: &Psk,
    mode: SigningMode,
) -> MamResult<bool> {
    let driver = SigningJobDriver::new(client.clone(), client).with_poll_policy(config.poll_policy());
    let result = driver.run(app, credential, mode)?;
    print_result("sign", &result);
    Ok(result.is_success())
}

fn print_result(job: &str, result: &JobResult) {
    println!("{}: {} ({} poll(s))", job, result.message(), result.polls().len());
    if let Some(details) = result.details() {
        println!("{}: details {}", job, details);
    }
}

fn read_metadata(path: &Path) -> MamResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| MamError::Config {
        reason: format!("cannot read metadata file '{}': {}", path.display(), e),
    })?;
    serde_json::from_str(&text).map_err(|e| MamError::Config {
        reason: format!("metadata file '{}' is not valid JSON: {}", path.display(), e),
    })
}
