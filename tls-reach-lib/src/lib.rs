//! # TLS Reach Library
//!
//! Bulk checking of whether domains accept TLS connections.
//!
//! Every domain is resolved, each resolved address is filtered through an
//! optional network allow-list, and every permitted address gets a TCP
//! connect followed by a TLS handshake that uses the domain as server name.
//! A fixed pool of workers keeps a bounded number of checks in flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tls_reach_lib::{CheckConfig, DomainVerifier, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CheckConfig::default().with_parallelism(20);
//!     let verifier = Arc::new(DomainVerifier::from_config(&config)?);
//!     let pipeline = Pipeline::new(verifier, config.parallelism);
//!
//!     let domains = vec!["example.com".to_string(), "example.org".to_string()];
//!     for verdict in pipeline.run(domains).await {
//!         println!("{}", verdict);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Bounded pipeline**: task and result queues sized to the worker count
//! - **Allow-list**: CIDR and single-address filters with `#` comments
//! - **Deadlines**: one budget per address covering connect and handshake
//! - **Configurable**: TOML files, `TR_*` environment variables

// Re-export main public API types and functions
pub use allowlist::{permitted, AllowList, SkippedLine};
pub use checker::DomainVerifier;
pub use concurrent::Pipeline;
pub use config::{
    env_config_from, load_env_config, parse_timeout, ConfigManager, DefaultsConfig, EnvConfig,
    FileConfig,
};
pub use error::{ProbePhase, ReachError};
pub use input::{feed_files, feed_reader, feed_stdin, split_domains};
pub use probe::{Probe, TlsProber};
pub use resolver::{Resolve, SystemResolver};
pub use types::{
    CheckConfig, DomainVerdict, ProbeOutcome, VerdictStatus, DEFAULT_PARALLELISM, DEFAULT_PORT,
    DEFAULT_TIMEOUT, MAX_PARALLELISM,
};

/// Scriptable resolver and prober for tests.
pub mod fakes;

mod allowlist;
mod checker;
mod concurrent;
mod config;
mod error;
mod input;
mod probe;
mod resolver;
mod types;

pub type Result<T> = std::result::Result<T, ReachError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
