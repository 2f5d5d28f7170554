use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epg_relay::{
    config::Config,
    database::Database,
    ingestor::{
        EpgDispatcher, Normalizer, RefreshScheduler, RefreshService, RefreshStateManager,
        RefreshTrigger,
    },
    repositories::{ChannelStore, GuideSink, MemoryStore},
    sources::{
        Authenticator, ChannelSync, Credentials, FetchPolicy, HttpTransport, MirrorRegistry,
        MirrorTransport, ResilientFetcher, UpstreamAuthenticator,
    },
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "epg-relay")]
#[command(version)]
#[command(about = "Aggregates channel guides from redundant upstream mirrors")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL, or `memory` (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Run a single refresh cycle and exit
    #[arg(long)]
    refresh_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("epg_relay={},tower_http=trace", cli.log_level)
    } else {
        format!("epg_relay={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting epg-relay v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let (channels, guides) = open_stores(&config).await?;

    let normalizer = Arc::new(Normalizer::new()?);
    let registry = MirrorRegistry::new(&config.upstream.mirrors);
    let transport: Arc<dyn MirrorTransport> =
        Arc::new(HttpTransport::new(config.fetch.request_timeout())?);
    let authenticator: Arc<dyn Authenticator> = Arc::new(UpstreamAuthenticator::new(
        config.upstream.login_url.clone(),
        config.fetch.request_timeout(),
    )?);
    info!("Using {} upstream mirrors", registry.len());

    let fetcher = ResilientFetcher::new(
        registry.clone(),
        transport.clone(),
        normalizer.clone(),
        FetchPolicy::from(&config.fetch),
    );
    let mut dispatcher = EpgDispatcher::new(
        fetcher,
        normalizer.clone(),
        guides.clone(),
        config.upstream.epg_path_template.clone(),
    )
    .with_inter_channel_delay(config.fetch.inter_channel_delay());
    if let Some(workers) = config.refresh.workers {
        dispatcher = dispatcher.with_workers(workers);
    }
    info!("Refresh dispatcher uses {} workers", dispatcher.workers());

    let credentials = match (&config.upstream.username, &config.upstream.password) {
        (Some(username), Some(password)) => Some(Credentials {
            username: username.clone(),
            password: password.clone(),
            tenant_id: config
                .upstream
                .tenant_id
                .clone()
                .unwrap_or_else(|| config.refresh.tenant_id.clone()),
        }),
        _ => {
            warn!("No upstream credentials configured; channel sync is disabled");
            None
        }
    };
    let channel_sync = credentials.map(|credentials| {
        Arc::new(ChannelSync::new(
            transport.clone(),
            registry.clone(),
            config.upstream.channel_list_path.clone(),
            authenticator.clone(),
            Some(credentials),
            normalizer.clone(),
            channels.clone(),
        ))
    });

    let mut refresh =
        RefreshService::new(channels.clone(), dispatcher, RefreshStateManager::new());
    if let Some(sync) = &channel_sync {
        refresh =
            refresh.with_channel_sync(sync.clone(), config.refresh.sync_channels_before_refresh);
    }

    let tenant_id = config.refresh.tenant_id.clone();

    if cli.refresh_once {
        let report = refresh.refresh(&tenant_id, RefreshTrigger::Cli).await?;
        info!(
            "Refresh complete: {} channels, {} live, {} placeholder, {} persistence failures",
            report.total_channels,
            report.live_channels,
            report.placeholder_channels,
            report.persistence_failures
        );
        return Ok(());
    }

    if let Some(expression) = &config.refresh.cron {
        let scheduler = RefreshScheduler::new(refresh.clone(), expression, tenant_id.clone())?;
        tokio::spawn(scheduler.start());
    }

    if config.refresh.run_on_startup {
        let service = refresh.clone();
        let tenant_id = tenant_id.clone();
        tokio::spawn(async move {
            if let Err(e) = service.refresh(&tenant_id, RefreshTrigger::Startup).await {
                error!("Startup refresh failed: {}", e);
            }
        });
    }

    let state = AppState {
        config: Arc::new(config),
        channels,
        guides,
        normalizer,
        registry,
        refresh,
        channel_sync,
        authenticator,
    };

    WebServer::new(state)?.serve().await?;

    Ok(())
}

async fn open_stores(config: &Config) -> Result<(Arc<dyn ChannelStore>, Arc<dyn GuideSink>)> {
    if config.database.url == "memory" {
        info!("Using in-memory storage; guides are lost on restart");
        let store = MemoryStore::new();
        return Ok((Arc::new(store.clone()), Arc::new(store)));
    }

    info!("Using database: {}", config.database.url);
    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    Ok((Arc::new(database.clone()), Arc::new(database)))
}
