use clap::Parser;
use tracing_subscriber::EnvFilter;

use volley::config::{BackpressureMode, ServerConfig};

#[derive(Parser)]
#[command(name = "volley")]
#[command(about = "Coroutine-powered echo and validation service", version)]
struct Cli {
    /// Listen address, e.g. 0.0.0.0:8080
    #[arg(long)]
    addr: Option<String>,

    /// Worker coroutines per handler pool
    #[arg(long)]
    workers: Option<usize>,

    /// Maximum queued requests per handler before backpressure
    #[arg(long)]
    queue_bound: Option<usize>,

    /// Backpressure policy when the queue is full: shed or block
    #[arg(long)]
    backpressure: Option<String>,

    /// Per-request handler deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Environment first, CLI flags win.
    let mut config = ServerConfig::from_env();
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }
    if let Some(workers) = cli.workers {
        config.pool.num_workers = workers;
    }
    if let Some(bound) = cli.queue_bound {
        config.pool.queue_bound = bound;
    }
    if let Some(mode) = cli.backpressure {
        config.pool.backpressure_mode = BackpressureMode::parse(&mode)
            .ok_or_else(|| anyhow::anyhow!("unknown backpressure mode: {mode}"))?;
    }
    if let Some(ms) = cli.timeout_ms {
        config.request_timeout = std::time::Duration::from_millis(ms);
    }

    may::config().set_stack_size(config.pool.stack_size);

    tracing::info!(
        addr = %config.addr,
        workers = config.pool.num_workers,
        queue_bound = config.pool.queue_bound,
        backpressure_mode = ?config.pool.backpressure_mode,
        timeout_ms = config.request_timeout.as_millis() as u64,
        "Starting server"
    );

    let handle = unsafe { volley::app::start(&config)? };
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("server coroutine panicked"))?;
    Ok(())
}
