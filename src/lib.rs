//! Edge Failover - keeps a home-hosted edge reachable through DNS and a cloud fallback.
//!
//! This crate runs two independent reconciliation loops. The first keeps a DNS
//! record pointed at the host's current public IP. The second probes the
//! primary ISP link and, when it goes down, moves traffic to a cloud fallback:
//! an Auto Scaling group behind a CloudFront origin and a switched DNS record.
//!
//! ## Features
//!
//! - Public IP decoding from plain text, JSON, XML and form bodies
//! - Upserts to every configured hosted zone, even when some fail
//! - Ordered failover: capacity before traffic on entry, traffic before capacity on exit
//! - Delayed scale-down of the fallback group after recovery
//! - Graceful shutdown support
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          edge-failover                            │
//! │                                                                   │
//! │  ┌──────────────┐  public IP   ┌──────────────┐  UPSERT           │
//! │  │ DNS loop     │─────────────▶│ Route 53     │◀───────────┐      │
//! │  │ (interval)   │  resolve     └──────────────┘            │      │
//! │  └──────┬───────┘                                          │      │
//! │         │ status (watch)                                   │      │
//! │         ▼                                                  │      │
//! │  ┌──────────────┐  observe     ┌──────────────┐  retarget  │      │
//! │  │ Reachability │─────────────▶│ Failover     │──────────▶ CloudFront
//! │  │ loop         │  (mpsc)      │ controller   │  scale   ──▶ Auto Scaling
//! │  └──────────────┘              └──────────────┘────────────┘      │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failover
//!
//! ```text
//! probe: transport failure  → closed → capacity 1, CDN fallback, DNS fallback
//! probe: any HTTP response  → open   → CDN normal, capacity 1, DNS normal,
//!                                      capacity 0 after the shutdown delay
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use edge_failover::{Config, FailoverService};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config: Config = config::Config::builder()
//!         .add_source(config::File::with_name("edge-failover.toml"))
//!         .build()?
//!         .try_deserialize()?;
//!
//!     let cancel = CancellationToken::new();
//!     let service = FailoverService::new(config)?;
//!     service.run(cancel).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod capacity;
pub mod cloud;
pub mod config;
pub mod controller;
pub mod decode;
pub mod error;
pub mod failover;
pub mod metrics;
pub mod origin;
pub mod probe;
pub mod reconcile;
pub mod records;
pub mod resolver;
pub mod service;
pub mod telemetry;

// Re-export main types
pub use config::{Config, TelemetryConfig};
pub use controller::FailoverHandle;
pub use error::{FailoverError, ProbeError, RemoteError};
pub use failover::{FailoverMachine, FailoverMode, FailoverPlan, FailoverStatus};
pub use service::FailoverService;
