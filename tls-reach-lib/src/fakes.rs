//! In-memory fakes for the resolver and prober traits (testing only)
//!
//! Provides `StaticResolver` and `FakeProber` so the verifier and the
//! pipeline can be exercised without DNS or sockets. `FakeProber` records
//! every call and the peak number of concurrent probes.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, sleep_until, Instant};

use crate::error::{ProbePhase, ReachError};
use crate::probe::Probe;
use crate::resolver::Resolve;
use crate::types::ProbeOutcome;

// ---------------------------------------------------------------------------
// StaticResolver
// ---------------------------------------------------------------------------

/// Resolver answering from a fixed table. Unknown names fail the lookup.
#[derive(Debug, Default)]
pub struct StaticResolver {
    table: HashMap<String, Result<Vec<IpAddr>, String>>,
    lookups: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `domain` with `addrs`, in this order.
    pub fn with(mut self, domain: &str, addrs: Vec<IpAddr>) -> Self {
        self.table.insert(domain.to_string(), Ok(addrs));
        self
    }

    /// Fail lookups of `domain` with `message`.
    pub fn failing(mut self, domain: &str, message: &str) -> Self {
        self.table
            .insert(domain.to_string(), Err(message.to_string()));
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, ReachError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match self.table.get(domain) {
            Some(Ok(addrs)) => Ok(addrs.clone()),
            Some(Err(message)) => Err(ReachError::lookup(domain, message.clone())),
            None => Err(ReachError::lookup(domain, "no such host")),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeProber
// ---------------------------------------------------------------------------

/// What a fake probe of one address should report.
#[derive(Debug, Clone)]
pub enum ProbeBehavior {
    Succeed,
    RefuseConnect(&'static str),
    FailHandshake(&'static str),
    /// Never answer; the probe ends at its deadline.
    Stall,
}

/// One recorded call to [`FakeProber::probe`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeCall {
    pub domain: String,
    pub addr: IpAddr,
    pub port: u16,
}

/// Prober with scripted per-address outcomes and an optional fixed delay.
///
/// Addresses without a script succeed. A delay longer than the remaining
/// budget ends in a handshake timeout at the deadline, like a silent server.
#[derive(Debug, Default)]
pub struct FakeProber {
    behaviors: HashMap<IpAddr, ProbeBehavior>,
    delay: Duration,
    calls: Mutex<Vec<ProbeCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, addr: IpAddr, behavior: ProbeBehavior) -> Self {
        self.behaviors.insert(addr, behavior);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    pub fn probed_addrs(&self) -> Vec<IpAddr> {
        self.calls().into_iter().map(|call| call.addr).collect()
    }

    pub fn ports(&self) -> Vec<u16> {
        self.calls().into_iter().map(|call| call.port).collect()
    }

    /// Highest number of probes that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn wait(&self, deadline: Instant) -> Result<(), ReachError> {
        if self.delay.is_zero() {
            return Ok(());
        }

        let budget = deadline.saturating_duration_since(Instant::now());
        if self.delay > budget {
            sleep_until(deadline).await;
            return Err(ReachError::timeout(ProbePhase::Handshake, budget));
        }

        sleep(self.delay).await;
        Ok(())
    }
}

#[async_trait]
impl Probe for FakeProber {
    async fn probe(
        &self,
        domain: &str,
        addr: IpAddr,
        port: u16,
        deadline: Instant,
    ) -> ProbeOutcome {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(ProbeCall {
                domain: domain.to_string(),
                addr,
                port,
            });

        let behavior = self
            .behaviors
            .get(&addr)
            .cloned()
            .unwrap_or(ProbeBehavior::Succeed);

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let waited = match behavior {
            ProbeBehavior::Stall => {
                let budget = deadline.saturating_duration_since(Instant::now());
                sleep_until(deadline).await;
                Err(ReachError::timeout(ProbePhase::Handshake, budget))
            }
            _ => self.wait(deadline).await,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match (waited, behavior) {
            (Err(error), _) => ProbeOutcome::HandshakeFailed { addr, error },
            (Ok(()), ProbeBehavior::RefuseConnect(message)) => ProbeOutcome::ConnectFailed {
                addr,
                error: ReachError::connect(message),
            },
            (Ok(()), ProbeBehavior::FailHandshake(message)) => ProbeOutcome::HandshakeFailed {
                addr,
                error: ReachError::handshake(message),
            },
            (Ok(()), _) => ProbeOutcome::Success { addr },
        }
    }
}
