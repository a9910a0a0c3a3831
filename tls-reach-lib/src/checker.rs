//! Per-domain verification.
//!
//! This module provides the `DomainVerifier` that resolves a domain, filters
//! every address through the allow-list and probes the permitted ones.

use crate::allowlist::{permitted, AllowList};
use crate::error::ReachError;
use crate::probe::{Probe, TlsProber};
use crate::resolver::{Resolve, SystemResolver};
use crate::types::{CheckConfig, DomainVerdict, ProbeOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Verifies domains one at a time. Shared by all workers behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// use tls_reach_lib::{CheckConfig, DomainVerifier};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let verifier = DomainVerifier::from_config(&CheckConfig::default())?;
///     let verdict = verifier.verify("example.com").await;
///     println!("{}", verdict);
///     Ok(())
/// }
/// ```
pub struct DomainVerifier {
    resolver: Arc<dyn Resolve>,
    prober: Arc<dyn Probe>,
    /// `None` when no allow-list is configured
    allow_list: Option<Arc<AllowList>>,
    /// Fresh budget given to every address
    timeout: Duration,
    port: u16,
}

impl DomainVerifier {
    /// Create a verifier using the system resolver and a real TLS prober.
    ///
    /// The allow-list file from `config` is loaded here; failing to read it
    /// is an error, since the run must not fall back to "allow everything".
    pub fn from_config(config: &CheckConfig) -> Result<Self, ReachError> {
        let allow_list = match &config.networks_file {
            Some(path) => Some(AllowList::load_file(path)?),
            None => None,
        };

        Ok(Self {
            resolver: Arc::new(SystemResolver::new()),
            prober: Arc::new(TlsProber::new()?),
            allow_list: allow_list.map(Arc::new),
            timeout: config.timeout,
            port: config.port,
        })
    }

    /// Create a verifier from explicit parts.
    pub fn with_parts(
        resolver: Arc<dyn Resolve>,
        prober: Arc<dyn Probe>,
        timeout: Duration,
        port: u16,
    ) -> Self {
        Self {
            resolver,
            prober,
            allow_list: None,
            timeout,
            port,
        }
    }

    /// Replace the allow-list. `None` permits every address.
    pub fn with_allow_list(mut self, allow_list: Option<AllowList>) -> Self {
        self.allow_list = allow_list.map(Arc::new);
        self
    }

    pub fn allow_list(&self) -> Option<&AllowList> {
        self.allow_list.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Check every resolved address of `domain`.
    ///
    /// The checking process:
    /// 1. Resolve the domain; a failed or empty lookup ends the check
    /// 2. Addresses outside the allow-list are recorded as denied, not probed
    /// 3. Every other address is probed with its own `timeout` budget
    ///
    /// Every address is attempted regardless of earlier failures, and the
    /// outcomes keep resolution order.
    pub async fn verify(&self, domain: &str) -> DomainVerdict {
        let started = Instant::now();

        let addrs = match self.resolver.resolve(domain).await {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("lookup of {} failed: {}", domain, e);
                return DomainVerdict::lookup_failed(domain, &e).with_duration(started.elapsed());
            }
        };

        if addrs.is_empty() {
            return DomainVerdict::no_addresses(domain).with_duration(started.elapsed());
        }

        let mut outcomes = Vec::with_capacity(addrs.len());
        for addr in addrs {
            if !permitted(addr, self.allow_list.as_deref()) {
                debug!("{} ({}) denied by network filters", addr, domain);
                outcomes.push(ProbeOutcome::Denied { addr });
                continue;
            }

            let deadline = Instant::now() + self.timeout;
            outcomes.push(self.prober.probe(domain, addr, self.port, deadline).await);
        }

        DomainVerdict::checked(domain, outcomes).with_duration(started.elapsed())
    }
}

impl std::fmt::Debug for DomainVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainVerifier")
            .field("allow_list", &self.allow_list)
            .field("timeout", &self.timeout)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeProber, ProbeBehavior, StaticResolver};
    use crate::types::VerdictStatus;
    use std::net::IpAddr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn verifier(resolver: StaticResolver, prober: Arc<FakeProber>) -> DomainVerifier {
        DomainVerifier::with_parts(Arc::new(resolver), prober, Duration::from_millis(1000), 443)
    }

    #[tokio::test]
    async fn test_lookup_failure_skips_probing() {
        let prober = Arc::new(FakeProber::new());
        let resolver = StaticResolver::new().failing("broken.test", "server misbehaving");

        let verdict = verifier(resolver, prober.clone()).verify("broken.test").await;

        assert_eq!(
            verdict.status,
            VerdictStatus::LookupFailed("server misbehaving".to_string())
        );
        assert!(verdict.outcomes.is_empty());
        assert_eq!(verdict.summary(), "lookup failed: server misbehaving");
        assert_eq!(prober.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_resolution_is_reported_distinctly() {
        let prober = Arc::new(FakeProber::new());
        let resolver = StaticResolver::new().with("empty.test", vec![]);

        let verdict = verifier(resolver, prober.clone()).verify("empty.test").await;

        assert_eq!(verdict.status, VerdictStatus::NoAddresses);
        assert_eq!(verdict.summary(), "no addresses resolved");
        assert_eq!(prober.call_count(), 0);
    }

    #[tokio::test]
    async fn test_every_address_reported_in_resolution_order() {
        let addrs = vec![ip("192.0.2.3"), ip("192.0.2.1"), ip("2001:db8::2")];
        let prober = Arc::new(
            FakeProber::new()
                .with(ip("192.0.2.3"), ProbeBehavior::RefuseConnect("connection refused"))
                .with(ip("192.0.2.1"), ProbeBehavior::FailHandshake("bad certificate")),
        );
        let resolver = StaticResolver::new().with("multi.test", addrs.clone());

        let verdict = verifier(resolver, prober.clone()).verify("multi.test").await;

        let seen: Vec<IpAddr> = verdict.outcomes.iter().map(ProbeOutcome::addr).collect();
        assert_eq!(seen, addrs);
        assert_eq!(
            verdict.summary(),
            "connect failed: 192.0.2.3 (connection refused); \
             handshake failed: 192.0.2.1 (bad certificate); \
             OK: 2001:db8::2"
        );
        // No early exit after the first failure
        assert_eq!(prober.call_count(), 3);
        assert!(verdict.is_reachable());
    }

    #[tokio::test]
    async fn test_allow_list_denies_without_probing() {
        let prober = Arc::new(FakeProber::new());
        let resolver =
            StaticResolver::new().with("mixed.test", vec![ip("10.0.0.5"), ip("93.184.216.34")]);

        let verdict = verifier(resolver, prober.clone())
            .with_allow_list(Some(AllowList::parse("10.0.0.0/8")))
            .verify("mixed.test")
            .await;

        assert_eq!(
            verdict.outcomes,
            vec![
                ProbeOutcome::Success { addr: ip("10.0.0.5") },
                ProbeOutcome::Denied {
                    addr: ip("93.184.216.34")
                },
            ]
        );
        assert_eq!(prober.probed_addrs(), vec![ip("10.0.0.5")]);
    }

    #[tokio::test]
    async fn test_empty_allow_list_denies_everything() {
        let prober = Arc::new(FakeProber::new());
        let resolver = StaticResolver::new().with("any.test", vec![ip("10.0.0.5"), ip("::1")]);

        let verdict = verifier(resolver, prober.clone())
            .with_allow_list(Some(AllowList::default()))
            .verify("any.test")
            .await;

        assert_eq!(verdict.outcomes.len(), 2);
        assert!(verdict
            .outcomes
            .iter()
            .all(|o| matches!(o, ProbeOutcome::Denied { .. })));
        assert_eq!(prober.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_address_gets_a_fresh_budget() {
        // 700ms per probe with a 1000ms timeout: a budget shared across the
        // domain would expire during the second address.
        let addrs = vec![ip("192.0.2.1"), ip("192.0.2.2")];
        let prober = Arc::new(FakeProber::new().with_delay(Duration::from_millis(700)));
        let resolver = StaticResolver::new().with("slow.test", addrs);

        let verdict = verifier(resolver, prober).verify("slow.test").await;

        assert!(verdict.outcomes.iter().all(ProbeOutcome::is_success));
        let took = verdict.check_duration.unwrap();
        assert!(took >= Duration::from_millis(1400) && took < Duration::from_millis(1450));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_address_times_out_at_deadline() {
        let prober = Arc::new(FakeProber::new().with_delay(Duration::from_secs(5)));
        let resolver = StaticResolver::new().with("hang.test", vec![ip("192.0.2.1")]);

        let verdict = verifier(resolver, prober).verify("hang.test").await;

        assert!(verdict.outcomes[0].is_timeout());
        let took = verdict.check_duration.unwrap();
        assert!(took >= Duration::from_millis(1000) && took < Duration::from_millis(1050));
    }

    #[tokio::test]
    async fn test_probe_uses_configured_port() {
        let prober = Arc::new(FakeProber::new());
        let resolver = StaticResolver::new().with("port.test", vec![ip("192.0.2.1")]);

        DomainVerifier::with_parts(Arc::new(resolver), prober.clone(), Duration::from_secs(1), 8443)
            .verify("port.test")
            .await;

        assert_eq!(prober.ports(), vec![8443]);
    }

    #[test]
    fn test_missing_allow_list_file_fails_construction() {
        let config = CheckConfig::default().with_networks_file("/nonexistent/allow.txt");
        let err = DomainVerifier::from_config(&config).unwrap_err();
        assert!(matches!(err, ReachError::AllowListFile { .. }));
    }
}
