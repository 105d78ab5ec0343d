//! pingderp - console ping monitor.
//!
//! Probes the configured hosts on a fixed cadence and keeps a live latency
//! report on the terminal, with per-host average, minimum, and maximum.

mod config;
mod console;
mod monitor;
mod probe;
mod stats;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{AppConfig, ConfigError, StatsBackend};
use monitor::{Monitor, Target};
use probe::Pinger;
use stats::{MemoryStore, SqliteStore, StatsStore};

/// Exit code for configuration problems.
const EXIT_CONFIG: i32 = 1000;
/// Exit code for storage initialisation problems.
const EXIT_STORAGE: i32 = 1010;

#[derive(Parser, Debug)]
#[command(name = "pingderp", about = "Console ping monitor", version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml", env = "PINGDERP_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so they never tear the stdout report
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pingderp=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // The config decides which statistics backend to open, so it loads first
    console::heading("Loading configuration");
    let cfg = match AppConfig::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            console::error("Config file not found");
            std::process::exit(EXIT_CONFIG);
        }
        Err(e) => {
            console::error(&format!("Loading config file: {}", e));
            std::process::exit(EXIT_CONFIG);
        }
    };
    println!();

    console::heading("Initialising statistics");
    let store: Arc<dyn StatsStore> = match cfg.settings.stats {
        StatsBackend::Sqlite => match SqliteStore::open(&cfg.settings.db_path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                console::error(&format!("Initialising database: {}", e));
                std::process::exit(EXIT_STORAGE);
            }
        },
        StatsBackend::Memory => Arc::new(MemoryStore::new()),
    };

    let mut targets = Vec::with_capacity(cfg.targets.len());
    for entry in &cfg.targets {
        match store.register_host(&entry.name, &entry.host) {
            Ok(host_id) => targets.push(Target::new(
                entry.name.clone(),
                entry.host.clone(),
                host_id,
                Pinger,
                Arc::clone(&store),
            )),
            Err(e) => {
                console::error(&format!("Registering {}: {}", entry.name, e));
                std::process::exit(EXIT_STORAGE);
            }
        }
    }
    println!();

    tracing::info!(
        "monitoring {} host(s) every {}ms",
        targets.len(),
        cfg.settings.refresh_ms
    );

    // Leaves any startup warnings on screen for a few seconds
    console::countdown(4).await;

    Monitor::new(
        targets,
        cfg.settings.refresh(),
        cfg.settings.probe_timeout(),
        cfg.settings.polling,
    )
    .run()
    .await;
}
