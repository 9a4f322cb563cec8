use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tickwatch::adapters::{ChatGateway, QuoteFetcher};
use tickwatch::config::parse_daily_time;
use tickwatch::error::{Result, WatchError};
use tickwatch::{
    AppConfig, DailyPushConfig, DailyPushScheduler, HttpQuoteProvider, IntervalPushConfig,
    IntervalPushScheduler, WatchlistFile, WatchlistService, WebhookGateway,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tickwatch", about = "Group watchlist push service")]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the push service
    Run,
    /// Load the store, apply migrations, write it back
    Migrate,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config_dir)?;
    init_logging(&config);

    if let Err(errors) = config.validate() {
        for message in &errors {
            error!("config: {message}");
        }
        return Err(WatchError::Validation(format!(
            "{} configuration error(s)",
            errors.len()
        )));
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Migrate => migrate(config).await,
        Commands::Check => {
            info!("configuration OK");
            Ok(())
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let (hour, minute) = parse_daily_time(&config.push.daily_time)
        .ok_or_else(|| WatchError::Validation("bad push.daily_time".to_string()))?;
    let timeout = Duration::from_secs(config.push.outbound_timeout_secs);

    let service = Arc::new(WatchlistService::new(WatchlistFile::new(&config.store.path)));
    let quotes: Arc<dyn QuoteFetcher> =
        Arc::new(HttpQuoteProvider::new(&config.market.quote_url, timeout)?);
    let gateway: Arc<dyn ChatGateway> = Arc::new(WebhookGateway::new(
        config.gateway.webhooks.clone(),
        timeout,
    )?);

    let daily = Arc::new(DailyPushScheduler::new(
        DailyPushConfig {
            hour,
            minute,
            tick_secs: config.push.tick_secs,
            outbound_timeout_secs: config.push.outbound_timeout_secs,
            indices: config.market.indices.clone(),
        },
        service.clone(),
        quotes.clone(),
        gateway.clone(),
    ));
    let interval = Arc::new(IntervalPushScheduler::new(
        IntervalPushConfig {
            tick_secs: config.push.tick_secs,
            outbound_timeout_secs: config.push.outbound_timeout_secs,
            indices: config.market.indices.clone(),
        },
        service,
        quotes,
        gateway,
    ));

    daily.start();
    interval.start();
    info!(
        store = %config.store.path,
        daily_time = %config.push.daily_time,
        "tickwatch running, Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    daily.stop();
    interval.stop();
    Ok(())
}

async fn migrate(config: AppConfig) -> Result<()> {
    let file = WatchlistFile::new(&config.store.path);
    let store = file.load().await?;
    file.save(&store).await?;
    info!(
        version = store.version,
        groups = store.groups.len(),
        "store migrated and saved"
    );
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("info,tickwatch={}", config.logging.level))
    });

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
