mod api;
mod auth;
mod dispatch;

use clap::{Parser, Subcommand};
use evopanel_core::config::{self, shellexpand};
use evopanel_providers::EvolutionClient;
use evopanel_store::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "evopanel",
    version,
    about = "WhatsApp admin panel backend on Evolution API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and the dispatch queue.
    Start,
    /// Check the database and the Evolution API endpoint.
    Status,
    /// Create an administrator account.
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "EVOPANEL_ADMIN_PASSWORD")]
        password: String,
    },
}

/// Console plus a plain-text file under `{data_dir}/logs`. Keep the guard alive
/// for the life of the process or buffered lines are lost.
fn init_logging(
    cfg: &config::Config,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = format!("{}/logs", shellexpand(&cfg.panel.data_dir));
    std::fs::create_dir_all(&log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("evopanel.log")
        .build(&log_dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.panel.log_level)),
        )
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load(&cli.config)?;
    cfg.apply_env_overrides();
    let _guard = init_logging(&cfg)?;

    match cli.command {
        Commands::Start => {
            cfg.validate()?;

            let store = Store::new(&cfg.store).await?;
            let evolution = Arc::new(EvolutionClient::from_config(&cfg.evolution));
            if !evolution.ping().await {
                warn!(
                    "Evolution API at {} is not reachable yet; sends will fail until it is",
                    cfg.evolution.base_url
                );
            }

            let queue = dispatch::DispatchQueue::new(
                evolution.clone(),
                Duration::from_millis(cfg.dispatch.default_delay_ms),
            );
            let state = api::ApiState::new(
                store,
                evolution.clone(),
                evolution,
                queue,
                &cfg.auth,
                cfg.dispatch.clone(),
            );

            info!("{} starting", cfg.panel.name);
            api::serve(&cfg.api, state).await?;
        }
        Commands::Status => {
            println!("evopanel status\n");
            println!("Config: {}", cli.config);

            let db_path = shellexpand(&cfg.store.db_path);
            match Store::new(&cfg.store).await {
                Ok(store) => {
                    println!("Database: {db_path}");
                    println!("  size: {} bytes", store.db_size().await.unwrap_or(0));
                    println!("  users: {}", store.count_users().await?);
                    println!("  instances: {}", store.count_instances().await?);
                }
                Err(e) => println!("Database: {db_path} ({e})"),
            }
            println!();

            if cfg.evolution.base_url.is_empty() {
                println!("  evolution: not configured");
            } else {
                let evolution = EvolutionClient::from_config(&cfg.evolution);
                println!(
                    "  evolution: {} ({})",
                    cfg.evolution.base_url,
                    if evolution.ping().await {
                        "reachable"
                    } else {
                        "unreachable"
                    }
                );
            }
            println!(
                "  panel token: {}",
                if cfg.auth.panel_token.is_empty() {
                    "disabled"
                } else {
                    "set"
                }
            );
        }
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => {
            if password.is_empty() {
                anyhow::bail!("password must not be empty");
            }
            let store = Store::new(&cfg.store).await?;
            let hash = auth::hash_password(&password)?;
            let user = store
                .create_user(&name, &email, &hash, auth::Role::Admin.as_str())
                .await?;
            println!("Created admin {} (id {})", user.email, user.id);
        }
    }

    Ok(())
}
