//! depthcast: live point cloud streaming over WebSocket
//!
//! A depth camera feeds aligned depth and color frames. On a fixed cadence
//! the server unprojects the latest frame into a colored point cloud,
//! gzip-compresses it as JSON and pushes it to every connected client.
//!
//! ```text
//! FrameSource ──► Broadcaster ──► ClientRegistry ──► Connection ──► WebSocket
//!                  build/encode     snapshot()         writer task
//! ```
//!
//! # Example
//!
//! ```no_run
//! use depthcast::capture::{Calibration, SyntheticSource};
//! use depthcast::{ServerConfig, StreamServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = SyntheticSource::new(Calibration::default(), 30);
//!     let server = StreamServer::bind(ServerConfig::default()).await?;
//!     server
//!         .run_until(source, async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod capture;
pub mod cloud;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use broadcast::{BroadcastConfig, Broadcaster};
pub use capture::{Calibration, FramePair, FrameSource};
pub use cloud::{BuilderConfig, PointCloudBuilder, PointCloudCodec, PointCloudSnapshot};
pub use error::{Error, Result};
pub use registry::{ClientId, ClientRegistry};
pub use server::{ServerConfig, StreamServer};
