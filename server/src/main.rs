use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use engine::{spawn_batcher_process, spawn_snapshot_sync_process, Canvas, EngineConfig};
use server::context::AppContext;

#[derive(Debug, Parser)]
#[command(name = "canvas-server", about = "Collaborative pixel canvas backend")]
struct Args {
    #[arg(long, default_value_t = 9080)]
    port: u16,

    /// Board edge length; the board holds board-size² cells.
    #[arg(long, default_value_t = engine::config::DEFAULT_BOARD_SIZE)]
    board_size: u32,

    /// Number of valid color indices.
    #[arg(long, default_value_t = engine::config::DEFAULT_PALETTE_SIZE)]
    palette_size: u16,

    /// Minimum wait between placements per user, in milliseconds.
    #[arg(long, default_value_t = engine::config::DEFAULT_COOLDOWN_MS)]
    cooldown_ms: u64,

    /// Seconds between periodic board snapshots.
    #[arg(long, default_value_t = 60)]
    snapshot_interval_secs: u64,

    /// Broadcast batching window in milliseconds.
    #[arg(long, default_value_t = 100)]
    batch_tick_ms: u64,

    /// Root directory for snapshots and the history log.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Shared secret for the /admin routes.
    #[arg(long, default_value = "admin")]
    admin_key: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = EngineConfig {
        board_size: args.board_size,
        palette_size: args.palette_size,
        cooldown_ms: args.cooldown_ms,
        snapshot_interval: Duration::from_secs(args.snapshot_interval_secs),
        batch_tick: Duration::from_millis(args.batch_tick_ms),
        data_dir: args.data_dir,
        ..EngineConfig::default()
    };

    let broadcast = spawn_batcher_process(config.batch_tick);
    let canvas = Arc::new(Canvas::open(&config, broadcast.clone())?);
    canvas.initialize()?;
    spawn_snapshot_sync_process(canvas.clone(), config.snapshot_interval);

    let context = Arc::new(AppContext {
        canvas,
        broadcast,
        admin_key: args.admin_key,
    });

    let addr = SocketAddr::new(IpAddr::from(Ipv4Addr::UNSPECIFIED), args.port);
    tracing::info!(
        board_size = config.board_size,
        cooldown_ms = config.cooldown_ms,
        "canvas server started at {addr}"
    );

    warp::serve(server::routes(context)).run(addr).await;

    Ok(())
}
