//! Core data types for TLS reachability checks.
//!
//! This module defines the run configuration, the per-address probe outcome
//! and the per-domain verdict that flows from the workers to the result sink.

use crate::error::ReachError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-address timeout covering connect and handshake together.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default number of concurrent workers.
pub const DEFAULT_PARALLELISM: usize = 10;

/// Upper bound for the worker pool size.
pub const MAX_PARALLELISM: usize = 1000;

/// Default port to connect to.
pub const DEFAULT_PORT: u16 = 443;

/// Separator used when a verdict lists several addresses.
pub const OUTCOME_SEPARATOR: &str = "; ";

/// Run-level configuration. Fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConfig {
    /// Budget for one address: TCP connect plus TLS handshake.
    /// Default: 1000ms
    pub timeout: Duration,

    /// Number of concurrent workers, also the capacity of both queues.
    /// Default: 10, Range: 1-1000
    pub parallelism: usize,

    /// TCP port probed on every resolved address.
    /// Default: 443
    pub port: u16,

    /// File with allowed networks. `None` means every address is permitted.
    pub networks_file: Option<PathBuf>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            parallelism: DEFAULT_PARALLELISM,
            port: DEFAULT_PORT,
            networks_file: None,
        }
    }
}

impl CheckConfig {
    /// Set the worker count, clamped to 1-1000.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.clamp(1, MAX_PARALLELISM);
        self
    }

    /// Set the per-address timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the probed port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the allow-list file.
    pub fn with_networks_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.networks_file = Some(path.into());
        self
    }
}

/// Result of checking one resolved address of a domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// TCP connect and TLS handshake both completed.
    Success { addr: IpAddr },

    /// TCP connect failed or the deadline ran out while connecting.
    ConnectFailed {
        addr: IpAddr,
        #[serde(serialize_with = "as_display")]
        error: ReachError,
    },

    /// TCP connect succeeded but the TLS handshake did not.
    HandshakeFailed {
        addr: IpAddr,
        #[serde(serialize_with = "as_display")]
        error: ReachError,
    },

    /// Address is outside every configured network; never probed.
    Denied { addr: IpAddr },
}

impl ProbeOutcome {
    pub fn addr(&self) -> IpAddr {
        match self {
            ProbeOutcome::Success { addr }
            | ProbeOutcome::ConnectFailed { addr, .. }
            | ProbeOutcome::HandshakeFailed { addr, .. }
            | ProbeOutcome::Denied { addr } => *addr,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success { .. })
    }

    /// Whether the probe ended because its deadline expired.
    pub fn is_timeout(&self) -> bool {
        match self {
            ProbeOutcome::ConnectFailed { error, .. }
            | ProbeOutcome::HandshakeFailed { error, .. } => error.is_timeout(),
            _ => false,
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Success { addr } => write!(f, "OK: {}", addr),
            ProbeOutcome::ConnectFailed { addr, error } => {
                write!(f, "connect failed: {} ({})", addr, error)
            }
            ProbeOutcome::HandshakeFailed { addr, error } => {
                write!(f, "handshake failed: {} ({})", addr, error)
            }
            ProbeOutcome::Denied { addr } => write!(f, "denied by network filters: {}", addr),
        }
    }
}

/// How far the check of a domain got.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Addresses were resolved; see `DomainVerdict::outcomes`.
    Checked,

    /// DNS resolution failed, nothing was probed.
    LookupFailed(String),

    /// DNS resolution succeeded with an empty address set.
    NoAddresses,
}

/// Final result for one domain task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainVerdict {
    /// The domain as it was submitted
    pub domain: String,

    pub status: VerdictStatus,

    /// One entry per resolved address, in resolution order
    pub outcomes: Vec<ProbeOutcome>,

    /// How long the whole domain took
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_duration: Option<Duration>,
}

impl DomainVerdict {
    pub fn checked(domain: impl Into<String>, outcomes: Vec<ProbeOutcome>) -> Self {
        Self {
            domain: domain.into(),
            status: VerdictStatus::Checked,
            outcomes,
            check_duration: None,
        }
    }

    pub fn lookup_failed(domain: impl Into<String>, error: &ReachError) -> Self {
        Self {
            domain: domain.into(),
            status: VerdictStatus::LookupFailed(error.to_string()),
            outcomes: Vec::new(),
            check_duration: None,
        }
    }

    pub fn no_addresses(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            status: VerdictStatus::NoAddresses,
            outcomes: Vec::new(),
            check_duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.check_duration = Some(duration);
        self
    }

    /// At least one address completed the handshake.
    pub fn is_reachable(&self) -> bool {
        self.outcomes.iter().any(ProbeOutcome::is_success)
    }

    /// Combined human-readable text for the whole domain.
    pub fn summary(&self) -> String {
        match &self.status {
            VerdictStatus::LookupFailed(message) => format!("lookup failed: {}", message),
            VerdictStatus::NoAddresses => "no addresses resolved".to_string(),
            VerdictStatus::Checked => self
                .outcomes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(OUTCOME_SEPARATOR),
        }
    }
}

impl fmt::Display for DomainVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.domain, self.summary())
    }
}

fn as_display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
