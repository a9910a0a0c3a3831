//! DNS resolution for domain tasks.
//!
//! The verifier only depends on the [`Resolve`] trait so tests can swap in a
//! fixed table of addresses instead of touching the network.

use crate::error::ReachError;
use async_trait::async_trait;
use std::net::IpAddr;
use tokio::net::lookup_host;
use tracing::debug;

/// Resolve a domain to its IP addresses, in the order the resolver returns them.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, ReachError>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Resolve for SystemResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, ReachError> {
        let addrs = lookup_host((domain, 0))
            .await
            .map_err(|e| ReachError::lookup(domain, e.to_string()))?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            // getaddrinfo may list the same address once per socket type
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }

        debug!("resolved {} to {} addresses", domain, ips.len());
        Ok(ips)
    }
}
