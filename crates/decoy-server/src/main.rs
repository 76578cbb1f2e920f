use anyhow::Context;
use clap::{Parser, ValueEnum};
use decoy_server::config::{Config, RedisConfig, StoreBackend};
use decoy_server::record::Recorder;
use decoy_server::server::{AppState, DecoyServer};
use decoy_server::service::MockService;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "decoy", version, about = "HTTP stub service")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "DECOY_HOST")]
    host: Option<String>,

    /// YAML configuration file
    #[arg(short, long, env = "DECOY_CONFIG")]
    config: Option<PathBuf>,

    /// Path prefix for admin routes
    #[arg(long, env = "DECOY_ADMIN_PREFIX")]
    admin_prefix: Option<String>,

    /// Document store backend: none, inmemory, file or redis
    #[arg(long, env = "DECOY_STORE")]
    store: Option<StoreBackend>,

    /// Root directory for the file store
    #[arg(long, env = "DECOY_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Redis URL for the redis store
    #[arg(long, env = "DECOY_REDIS_URL")]
    redis_url: Option<String>,

    /// Name of the mapping collection
    #[arg(long, env = "DECOY_COLLECTION")]
    collection: Option<String>,

    #[arg(long, value_enum, default_value = "text", env = "DECOY_LOG_FORMAT")]
    log_format: LogFormat,
}

impl Args {
    /// Load the config file (if any) and apply command line overrides.
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(host) = self.host {
            config.listen.host = host;
        }
        if let Some(prefix) = self.admin_prefix {
            config.admin.prefix = prefix;
        }
        if let Some(backend) = self.store {
            config.store.backend = backend;
        }
        if let Some(path) = self.store_path {
            config.store.path = Some(path);
        }
        if let Some(url) = self.redis_url {
            match config.store.redis.as_mut() {
                Some(redis) => redis.url = url,
                None => config.store.redis = Some(RedisConfig::new(url)),
            }
        }
        if let Some(collection) = self.collection {
            config.store.collection = collection;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "decoy=info,decoy_server=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = args.into_config()?;
    tracing::info!("decoy v{} starting", env!("CARGO_PKG_VERSION"));

    let (service, report) = MockService::start(config.store.clone()).await?;
    tracing::info!("Loaded {} mappings from store", report.adopted);

    let recorder = Recorder::new(Duration::from_secs(config.record.timeout_secs))?;
    let state = AppState::new(service, recorder, config.admin.prefix.clone());

    let server = DecoyServer::new(state);
    let addr = config.listen.bind_address();
    tokio::select! {
        result = server.run(&addr) => result.with_context(|| format!("Server on {addr} failed"))?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }
    Ok(())
}
