//! # Fleet Server
//!
//! Controller for a fleet of scanning workers.
//!
//! Workers talk to `/controler` to receive an area, a credential and scan
//! jobs, and post their telemetry to `/raw`. Operators use `/api` for
//! status listings, hot reloads and quest passes.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use fleet_core::database::{FleetStores, PostgresDatabase};
use fleet_core::fleet::Fleet;
use fleet_core::scheduler::FleetScheduler;
use fleet_server::{
    create_app,
    infra::{
        app_state::AppState,
        config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions},
        services::{fleet_services, raw_forwarder},
        startup::{ProdStartupHooks, StartupHooks},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "fleet-server")]
#[command(about = "Controller for a fleet of scanning workers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "FLEET_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Db(DbCommand::Migrate)) = cli.command {
        let config = load_runtime_config(&cli.serve)?;
        let database = connect_database(&config).await?;
        database.migrate().await.context("database migration failed")?;
        info!("Database migrations applied successfully");
        return Ok(());
    }

    run_server(cli.serve).await
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Arc<Config>> {
    let options = ConfigLoaderOptions {
        config_path: args.config.clone(),
        env_file: args.env_file.clone(),
    };
    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::with_options(options)
        .load()
        .context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    let default_filter = if config.general.debug_log {
        "debug,hyper=info,sqlx=warn"
    } else {
        "info,tower_http=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(message = %warning.message, hint = %hint, "configuration warning"),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    Ok(Arc::new(config))
}

async fn connect_database(config: &Config) -> anyhow::Result<PostgresDatabase> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL must be provided for PostgreSQL connections")?;
    PostgresDatabase::connect(url, config.database.max_connections)
        .await
        .context("failed to connect to PostgreSQL")
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    run_server_with_hooks(args, &ProdStartupHooks).await
}

async fn run_server_with_hooks<H>(args: ServeArgs, hooks: &H) -> anyhow::Result<()>
where
    H: StartupHooks,
{
    let config = load_runtime_config(&args)?;

    let database = Arc::new(connect_database(&config).await?);
    database.migrate().await.context("database migration failed")?;

    let fleet = Arc::new(Fleet::new(
        config.fleet_settings(),
        FleetStores::postgres(&database),
        fleet_services(&config)?,
    ));
    let state = AppState::new(
        Arc::clone(&fleet),
        Arc::clone(&config),
        Arc::new(raw_forwarder(&config)?),
    )
    .with_database(Arc::clone(&database));

    hooks.run(&state).await?;

    let scheduler = FleetScheduler::spawn(Arc::clone(&fleet), CancellationToken::new());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        "Starting fleet controller on {}:{}",
        config.server.host, config.server.port
    );

    let router = create_app(state);
    let shutdown = scheduler.token();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    scheduler.shutdown().await;
    info!("fleet controller stopped");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
        }
        _ = token.cancelled() => {}
    }
    token.cancel();
}
