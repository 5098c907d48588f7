use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use cafesync_core::config::{CONFIG_FILE, CafeConfig};
use cafesync_core::error::{CafeError, ConfigError, LlmError, StoreError, UpstreamError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "cafesync",
    version,
    about = "Keep a café dataset in sync with an Instagram account"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Path to the configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Map an error to the process exit code.
///
///   0: success
///   1: general/unknown error
///   2: configuration error (including missing secrets)
///   4: persisted file could not be read or written
///   5: social-media API error
///   6: LLM API error
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return 2;
        }
        if cause.is::<StoreError>() {
            return 4;
        }
        if cause.is::<UpstreamError>() {
            return 5;
        }
        if cause.is::<LlmError>() {
            return 6;
        }
        if let Some(cafe) = cause.downcast_ref::<CafeError>() {
            return match cafe {
                CafeError::Config(_) => 2,
                CafeError::Store(_) => 4,
                CafeError::Upstream(_) => 5,
                CafeError::Llm(_) => 6,
                CafeError::Geocode(_) | CafeError::Export(_) => 1,
            };
        }
    }
    1
}

/// A missing `.env` is normal. Anything else is worth a warning.
fn dotenv_problem(result: dotenvy::Result<PathBuf>) -> Option<dotenvy::Error> {
    match result {
        Ok(_) => None,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => Some(e),
    }
}

fn init_tracing(cli: &Cli, log_file: Option<std::fs::File>) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let dotenv_error = dotenv_problem(dotenvy::dotenv());
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = match CafeConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let log_file = match commands::log_file_for(&cli.command, &config) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(4);
        }
    };
    init_tracing(&cli, log_file);
    if let Some(e) = dotenv_error {
        tracing::warn!(error = %e, "Cannot load .env file");
    }

    // Stages run strictly one after another; one thread is enough.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let ctx = commands::Context {
        config,
        config_path: cli.config.clone(),
        quiet: cli.quiet,
    };
    match runtime.block_on(commands::run(cli.command, ctx)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
