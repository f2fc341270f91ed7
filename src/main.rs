//! linewire: a concurrent TCP server for two connection protocols
//!
//! - Echo: binary-transparent echo with half-close semantics
//! - Prime: newline-delimited JSON requests answered one line each
//!
//! Features:
//! - One lightweight Tokio task per connection on a fixed worker pool
//! - Fixed, reused per-connection buffers
//! - Optional idle timeout and request line length cap
//! - Configuration via CLI arguments or TOML file

mod config;
mod protocols;
mod server;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        protocol = ?config.protocol,
        workers = config.workers,
        buffer_size = config.buffer_size,
        max_line_length = config.max_line_length,
        idle_timeout = config.idle_timeout,
        "Starting linewire server"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let server = Server::bind(&config)?;
        server.run().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
