use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use commoncrawl_harvester::config;
use commoncrawl_harvester::dispatcher::BoundedDispatcher;
use commoncrawl_harvester::fetch::{FetchSettings, HttpFetcher};
use commoncrawl_harvester::harvest::Harvester;
use commoncrawl_harvester::index::RecordStreamParser;
use commoncrawl_harvester::index_source::{AwsCliIndexSource, AwsCliSettings, SkipList};
use commoncrawl_harvester::moderation::HttpModerationClient;
use commoncrawl_harvester::quota::MimeQuotaRegistry;
use commoncrawl_harvester::stats::HarvestStats;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Maximum number of downloads in flight. Can also be specified in config file.
    pub concurrency: Option<usize>,

    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Root directory for downloaded content and staged index files.
    #[clap(long, value_parser = parse_path, default_value = config::DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Language code accepted in the record `languages` field.
    #[clap(long, default_value = config::DEFAULT_LANGUAGE)]
    pub language: String,

    /// File listing collections to skip, one per line.
    #[clap(long, value_parser = parse_path, default_value = config::DEFAULT_SKIP_LIST)]
    pub skip_list: PathBuf,

    /// Image moderation endpoint.
    #[clap(long)]
    pub moderation_url: Option<String>,

    /// Store images without moderating them.
    #[clap(long)]
    pub no_moderation: bool,

    /// Timeout for each content download, in seconds.
    #[clap(long, default_value_t = config::DEFAULT_FETCH_TIMEOUT_SEC)]
    pub fetch_timeout_sec: u64,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            concurrency: args.concurrency,
            data_dir: Some(args.data_dir.clone()),
            language: Some(args.language.clone()),
            skip_list: Some(args.skip_list.clone()),
            moderation_url: args.moderation_url.clone(),
            no_moderation: args.no_moderation,
            fetch_timeout_sec: Some(args.fetch_timeout_sec),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  concurrency: {}", app_config.concurrency);
    info!("  data_dir: {:?}", app_config.data_dir);
    info!("  language: {}", app_config.language);
    info!("  content types: {}", app_config.mime.allowed.join(", "));

    let stats = Arc::new(HarvestStats::new());
    let registry = Arc::new(MimeQuotaRegistry::new(Arc::new(
        app_config.mime.limits.clone(),
    )));

    let mut fetcher = HttpFetcher::new(
        FetchSettings {
            data_root: app_config.data_dir.clone(),
            timeout_secs: app_config.fetch_timeout_sec,
            trust: app_config.trust.policy(),
            extensions: Arc::new(app_config.mime.extensions.clone()),
        },
        registry.clone(),
        stats.clone(),
    )?;
    if app_config.moderation.enabled {
        info!("Moderating images with {}", app_config.moderation.url);
        let moderator = HttpModerationClient::new(
            app_config.moderation.url.clone(),
            app_config.moderation.timeout_sec,
        )?;
        fetcher = fetcher.with_moderator(Arc::new(moderator), app_config.moderation.policy());
    } else {
        warn!("Image moderation disabled");
    }

    let mut source_settings = AwsCliSettings::new(app_config.staging_dir());
    source_settings.aws_bin = app_config.acquisition.aws_bin.clone();
    source_settings.bucket_url = app_config.acquisition.bucket_url.clone();
    source_settings.skip_index_files = app_config.acquisition.skip_index_files;
    source_settings.retry = app_config.acquisition.retry_policy();
    let skip_list = SkipList::load(&app_config.skip_list)?;
    let source = Arc::new(AwsCliIndexSource::new(source_settings, skip_list));

    let shutdown_token = CancellationToken::new();
    let parser = RecordStreamParser::new(
        registry.clone(),
        BoundedDispatcher::new(app_config.concurrency)?,
        Arc::new(fetcher),
        stats.clone(),
        app_config.language.clone(),
        shutdown_token.clone(),
    );
    let harvester = Harvester::new(
        source,
        parser,
        registry,
        stats,
        shutdown_token.clone(),
    );

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, finishing in-flight downloads");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let summary = harvester.run(app_config.mime.active_set()).await?;

    info!(
        "Harvest stopped ({}) after {} index files",
        summary.stop_reason, summary.files_parsed
    );
    info!(
        "  admitted: {}, stored: {}, untrusted: {}, discarded: {}, failed: {}",
        summary.stats.admitted,
        summary.stats.stored,
        summary.stats.untrusted,
        summary.stats.discarded,
        summary.stats.failed
    );
    for usage in &summary.quota {
        info!(
            "  {}: {:.2} / {:.2} MB",
            usage.mime, usage.used_mb, usage.limit_mb
        );
    }
    if !summary.remaining.is_empty() {
        info!("  still under budget: {}", summary.remaining.join(", "));
    }

    Ok(())
}
