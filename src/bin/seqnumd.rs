//! seqnumd daemon binary
//!
//! Loads configuration, builds the duplicate-detection store, and runs the
//! maintenance tasks until Ctrl+C. Packets are not handled here: the
//! embedding router wraps the same store in a `SeqNumProcessor` and calls
//! `handle` from its extension hook chain.

use clap::Parser;
use seqnum_guard::{Config, DigestStore, MacKey, MaintenanceTimers, spawn_all};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Sequence number extension guard daemon
#[derive(Parser, Debug)]
#[command(name = "seqnumd", version, about = "Replay suppression for inter-domain packets")]
struct Cli {
    /// Config file override (skips the default search paths)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Print a freshly generated neighbor MAC key and exit
    #[arg(long)]
    generate_key: bool,
}

fn load_config(cli: &Cli) -> Config {
    let result = match &cli.config {
        Some(path) => Config::load_file(path).map(|config| (config, vec![path.clone()])),
        None => Config::load(),
    };

    let (config, loaded_paths) = match result {
        Ok(result) => result,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }
    config
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.generate_key {
        println!("{}", String::from(MacKey::generate()));
        return;
    }

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt().with_env_filter(filter).with_target(true).init();

    info!("seqnumd starting");
    let config = load_config(&cli);

    if cli.print_config {
        match config.to_yaml() {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => {
                error!("Failed to serialize configuration: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    match config.local_domain {
        Some(domain) => info!(domain = %domain, "Local domain"),
        None => warn!("No local_domain configured, packets will only be verified"),
    }

    let store = match DigestStore::from_config(&config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to create digest store: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        shards = store.shard_count(),
        window = store.window_size(),
        range = store.seq_space().range(),
        neighbors = store.neighbor_count(),
        "Digest store ready"
    );

    let shutdown = CancellationToken::new();
    let mut tasks = spawn_all(
        store.clone(),
        MaintenanceTimers::from_config(&config.timers),
        shutdown.clone(),
    );

    let stats_interval = config.timers.stats_log_interval();
    let stats_shutdown = shutdown.clone();
    let stats_store = store.clone();
    tasks.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(stats_interval);
        interval.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = stats_shutdown.cancelled() => break,
                _ = interval.tick() => log_stats(&stats_store),
            }
        }
    }));

    info!("seqnumd running, press Ctrl+C to exit");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    info!("seqnumd shutting down");
    shutdown.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Task ended abnormally: {}", e);
        }
    }

    info!("seqnumd shutdown complete");
}

fn log_stats(store: &DigestStore) {
    info!(
        local_seq = store.local_sequence(),
        writable = store.writable_index(),
        neighbors = store.neighbor_count(),
        "Store stats"
    );

    match serde_json::to_string(&store.shard_fill()) {
        Ok(fill) => info!(shards = %fill, "Shard fill"),
        Err(e) => warn!("Failed to encode shard fill: {}", e),
    }
}
