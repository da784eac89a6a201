//! Redfish Prometheus Exporter
//!
//! Polls Redfish baseboard management controllers (BMCs) and re-exposes their
//! health and telemetry as Prometheus metrics.
//!
//! # Overview
//!
//! Scrapes are driven by Prometheus: each `GET /metrics` polls every configured
//! BMC in parallel, walks its Redfish resource graph, normalizes the vendor's
//! responses into a fixed metric vocabulary and answers with the result. A BMC
//! that fails only affects its own `redfish_up` / `redfish_scrape_status`.
//!
//! # Architecture
//!
//! ```text
//!                         ┌──────────────────────── Exporter ────────────────────────┐
//! ┌────────────┐  HTTP    │ ┌────────┐   ┌─────────────┐   ┌────────────────────────┐ │  HTTPS   ┌──────┐
//! │ Prometheus │ ◄──────► │ │ Server │──►│ Coordinator │──►│ Collector (per target) │ │ ◄──────► │ BMC  │
//! └────────────┘ /metrics │ └────────┘   └─────────────┘   │ Client ► Walker ► Map  │ │ Redfish  └──────┘
//!                         │                                └────────────────────────┘ │
//!                         └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`redfish`] - HTTP client, session cache, resource documents and graph walker
//! - [`mapper`] - Rule table turning resource documents into metric samples
//! - [`metrics`] - Metric vocabulary, samples and Prometheus exposition
//! - [`collector`] - One complete poll of one target
//! - [`scrape`] - Fan-out, single-flight and deadlines across targets
//! - [`server`] - HTTP endpoints and process lifecycle
//! - [`config`] - Configuration management
//! - [`target`] - Target and credential model
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use redfish_exporter::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     server::start(config, "config/Default.toml".to_string()).await?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod mapper;
pub mod metrics;
pub mod redfish;
pub mod scrape;
pub mod server;
pub mod target;
