//! Error handling for TLS reachability checks.
//!
//! This module defines the error type that covers the different ways a check
//! can fail, from DNS lookups and refused connections to handshake errors and
//! unreadable allow-list files.

use std::fmt;
use std::time::Duration;

/// Main error type for reachability checks.
///
/// Per-address and per-domain variants end up inside a verdict and never
/// leave the pipeline. `AllowListFile` and `ConfigError` are the only
/// variants that abort a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ReachError {
    /// Domain name cannot be used (empty, or not a valid TLS server name)
    InvalidDomain { domain: String, reason: String },

    /// DNS resolution failed
    Lookup { domain: String, message: String },

    /// TCP connection could not be established
    Connect { message: String },

    /// TLS handshake failed after the TCP connection was up
    Handshake { message: String },

    /// The shared probe deadline expired during `phase`
    Timeout {
        phase: ProbePhase,
        duration: Duration,
    },

    /// The allow-list source could not be read
    AllowListFile { path: String, message: String },

    /// Configuration errors (invalid settings, etc.)
    ConfigError { message: String },

    /// File I/O errors when reading domain lists or config files
    FileError { path: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

/// Phase of a probe, used to say where a deadline ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Connect,
    Handshake,
}

impl fmt::Display for ProbePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbePhase::Connect => write!(f, "connect"),
            ProbePhase::Handshake => write!(f, "handshake"),
        }
    }
}

impl ReachError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new lookup error.
    pub fn lookup<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::Lookup {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new connect error.
    pub fn connect<M: Into<String>>(message: M) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Create a new handshake error.
    pub fn handshake<M: Into<String>>(message: M) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(phase: ProbePhase, duration: Duration) -> Self {
        Self::Timeout { phase, duration }
    }

    /// Create a new allow-list file error.
    pub fn allow_list_file<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::AllowListFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error is a deadline expiry rather than a refusal or protocol error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this error must stop the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AllowListFile { .. } | Self::ConfigError { .. })
    }
}

impl fmt::Display for ReachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "invalid domain '{}': {}", domain, reason)
            }
            Self::Lookup { message, .. } => write!(f, "{}", message),
            Self::Connect { message } => write!(f, "{}", message),
            Self::Handshake { message } => write!(f, "{}", message),
            Self::Timeout { phase, duration } => {
                write!(f, "{} timed out after {}ms", phase, duration.as_millis())
            }
            Self::AllowListFile { path, message } => {
                write!(f, "can't read ip filters file '{}': {}", path, message)
            }
            Self::ConfigError { message } => write!(f, "Configuration error: {}", message),
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for ReachError {}

impl From<std::io::Error> for ReachError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
