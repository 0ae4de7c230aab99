//! Keyward Server Binary
//!
//! Starts the key-management daemon.

use std::sync::Arc;

use clap::Parser;
use keyward::network::Server;
use keyward::trusted::AeadModule;
use keyward::{Config, Dispatcher, FileKeyLoader, KeyCache};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::{fmt, EnvFilter};

/// Keyward Server
#[derive(Parser, Debug)]
#[command(name = "keyward-server")]
#[command(about = "Local key-management daemon")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:10600")]
    listen: String,

    /// Control socket path
    #[arg(short, long, default_value = "/tmp/keyward.sock")]
    control: String,

    /// Maximum number of cached keys
    #[arg(short = 'k', long, default_value = "100000")]
    cache_capacity: usize,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Read timeout for a started request, in milliseconds (0 = none)
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,

    /// Write timeout for a response, in milliseconds (0 = none)
    #[arg(long, default_value = "5000")]
    write_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,keyward=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Keyward Server v{}", keyward::VERSION);
    tracing::info!("Listen address: {}", args.listen);
    tracing::info!("Control socket: {}", args.control);

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .control_path(&args.control)
        .cache_capacity(args.cache_capacity)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .write_timeout_ms(args.write_timeout_ms)
        .build();

    if let Err(e) = run(config) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

fn run(config: Config) -> keyward::Result<()> {
    let cache = Arc::new(KeyCache::new(config.cache_capacity, FileKeyLoader::new()));
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&cache), AeadModule::new()));

    let server = Server::bind(config, dispatcher)?;

    let shutdown = server.shutdown_handle();
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, shutdown.flag())?;
    }

    server.run()?;

    match Arc::try_unwrap(cache) {
        Ok(cache) => cache.destroy()?,
        // Remaining handles erase the entries when they drop
        Err(cache) => tracing::warn!(
            "Key cache still shared at exit ({} entries)",
            cache.len()
        ),
    }

    Ok(())
}
