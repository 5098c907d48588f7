pub mod export;
pub mod fetch;
pub mod init;
pub mod refresh;
pub mod status;
pub mod sync;

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Subcommand;

use cafesync_core::config::{CafeConfig, SourceCredentials, llm_api_key};
use cafesync_core::extract::LlmStoreExtractor;
use cafesync_core::geocode::GsiGeocoder;
use cafesync_core::llm::providers::create_provider;
use cafesync_core::progress::{BarReporter, NoopReporter, ProgressReporter};
use cafesync_core::source::InstagramSource;
use cafesync_core::store::JsonStore;
use cafesync_core::throttle::Throttle;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default cafesync.toml and empty data files
    Init(init::InitArgs),
    /// Fetch every post and rewrite the posts snapshot
    Fetch(fetch::FetchArgs),
    /// Enrich new posts and append them to the café store set
    Sync(sync::SyncArgs),
    /// Refresh expired media URLs of stored cafés
    RefreshMedia(refresh::RefreshArgs),
    /// Export the store set to CSV
    Export(export::ExportArgs),
    /// Show counts of posts, stores, skipped and pending ids
    Status(status::StatusArgs),
}

/// Settings shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: CafeConfig,
    pub config_path: PathBuf,
    pub quiet: bool,
}

impl Context {
    pub fn store(&self) -> JsonStore {
        JsonStore::new(&self.config.paths)
    }

    pub fn progress(&self) -> Box<dyn ProgressReporter> {
        if self.quiet {
            Box::new(NoopReporter)
        } else {
            Box::new(BarReporter::visible())
        }
    }

    pub fn source(&self) -> anyhow::Result<InstagramSource> {
        let credentials = SourceCredentials::from_env(&self.config.source)
            .context("Cannot resolve Instagram credentials")?;
        Ok(InstagramSource::new(&self.config.source, &credentials))
    }

    pub fn extractor(&self) -> anyhow::Result<LlmStoreExtractor> {
        let llm = &self.config.llm;
        let api_key = llm_api_key(llm, |key| std::env::var(key).ok())
            .context("Cannot resolve LLM API key")?;
        let provider = create_provider(&llm.provider, &llm.model, &api_key, llm.base_url.as_deref())
            .context("Cannot create LLM provider")?;
        Ok(LlmStoreExtractor::new(
            provider,
            Throttle::every(llm.min_interval()),
            llm.temperature,
        ))
    }

    pub fn geocoder(&self) -> GsiGeocoder {
        let geocoder = &self.config.geocoder;
        GsiGeocoder::new(
            geocoder.endpoint.clone(),
            Throttle::every(geocoder.min_interval()),
        )
    }
}

/// The append-mode log file for commands that keep one.
pub fn log_file_for(
    command: &Command,
    config: &CafeConfig,
) -> anyhow::Result<Option<std::fs::File>> {
    if !matches!(command, Command::RefreshMedia(_)) {
        return Ok(None);
    }
    let path = config.paths.refresh_log_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create data directory: {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Cannot open log file: {}", path.display()))?;
    Ok(Some(file))
}

pub async fn run(cmd: Command, ctx: Context) -> anyhow::Result<()> {
    match cmd {
        Command::Init(args) => init::run(args, &ctx),
        Command::Fetch(args) => fetch::run(args, &ctx).await,
        Command::Sync(args) => sync::run(args, &ctx).await,
        Command::RefreshMedia(args) => refresh::run(args, &ctx).await,
        Command::Export(args) => export::run(args, &ctx),
        Command::Status(args) => status::run(args, &ctx),
    }
}
