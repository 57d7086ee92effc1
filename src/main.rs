//! Point cloud streaming server
//!
//! Serves the synthetic depth source until Ctrl+C.
//!
//! Run with: cargo run -- [OPTIONS]
//!
//! Examples:
//!   depthcast                                  # 0.0.0.0:8765, 30 fps, stride 2
//!   depthcast --bind 127.0.0.1:9000 --fps 15
//!   depthcast --stride 4 --compression 1
//!
//! Log verbosity follows RUST_LOG, e.g. `RUST_LOG=depthcast=debug`.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use depthcast::capture::{Calibration, SyntheticSource};
use depthcast::{BroadcastConfig, BuilderConfig, ServerConfig, StreamServer};

/// Focal length of the synthetic camera in pixels
const SYNTHETIC_FOCAL_LENGTH: f64 = 600.0;

#[derive(Parser, Debug)]
#[command(name = "depthcast")]
#[command(about = "Stream live colored point clouds to WebSocket clients")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8765")]
    bind: SocketAddr,

    /// Broadcast ticks per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Use every Nth pixel in each dimension
    #[arg(long, default_value_t = 2)]
    stride: u32,

    /// Per-client send timeout; must be shorter than one tick
    #[arg(long, default_value_t = 20)]
    send_timeout_ms: u64,

    /// Longest wait for a camera frame per tick
    #[arg(long, default_value_t = 100)]
    frame_timeout_ms: u64,

    /// Maximum concurrent clients (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Synthetic frame width
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Synthetic frame height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Gzip level (0-9)
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
    compression: u32,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let broadcast = BroadcastConfig::default()
            .fps(self.fps)
            .client_send_timeout(Duration::from_millis(self.send_timeout_ms))
            .frame_timeout(Duration::from_millis(self.frame_timeout_ms))
            .builder(BuilderConfig::default().stride(self.stride))
            .compression_level(self.compression);

        ServerConfig::with_addr(self.bind)
            .max_connections(self.max_connections)
            .broadcast(broadcast)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = cli.server_config();

    let calibration = Calibration::centered(SYNTHETIC_FOCAL_LENGTH, cli.width, cli.height);
    let source = SyntheticSource::new(calibration, cli.fps);

    let server = StreamServer::bind(config).await?;
    tracing::info!(
        addr = %server.local_addr()?,
        fps = cli.fps,
        stride = cli.stride,
        "Serving synthetic depth source"
    );
    println!("Press Ctrl+C to stop");

    server
        .run_until(source, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
