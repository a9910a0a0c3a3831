//! Result sink for the tls-reach CLI.
//!
//! Verdict lines go to stdout, one per domain, in completion order. The
//! optional `--summary` totals go to stderr so stdout stays machine-readable.

use console::{style, Term};
use std::io::{self, Write};
use std::time::Duration;
use tls_reach_lib::{DomainVerdict, ProbeOutcome, VerdictStatus};

/// Running totals over the verdicts printed so far.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStats {
    pub domains: usize,
    /// Domains with at least one address that completed the handshake
    pub reachable: usize,
    pub lookup_failures: usize,
    pub no_addresses: usize,
    pub denied_addresses: usize,
    pub timeouts: usize,
}

impl RunStats {
    pub fn record(&mut self, verdict: &DomainVerdict) {
        self.domains += 1;
        if verdict.is_reachable() {
            self.reachable += 1;
        }
        match verdict.status {
            VerdictStatus::LookupFailed(_) => self.lookup_failures += 1,
            VerdictStatus::NoAddresses => self.no_addresses += 1,
            VerdictStatus::Checked => {}
        }
        for outcome in &verdict.outcomes {
            if outcome.is_timeout() {
                self.timeouts += 1;
            }
            if matches!(outcome, ProbeOutcome::Denied { .. }) {
                self.denied_addresses += 1;
            }
        }
    }

    pub fn unreachable(&self) -> usize {
        self.domains - self.reachable
    }
}

/// Write one verdict as `domain: text`, or as a JSON object when `json` is set.
pub fn write_verdict<W: Write>(
    out: &mut W,
    verdict: &DomainVerdict,
    json: bool,
) -> io::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, verdict)?;
        writeln!(out)
    } else {
        writeln!(out, "{}", verdict)
    }
}

/// Print the colored totals line to stderr.
pub fn print_summary(stats: &RunStats, elapsed: Duration) {
    let term = Term::stderr();
    let line = format!(
        "{} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(stats.domains).bold(),
        if stats.domains == 1 { "" } else { "s" },
        elapsed.as_secs_f64(),
        style("|").dim(),
        style(format!("{} reachable", stats.reachable)).green(),
        style("|").dim(),
        style(format!("{} unreachable", stats.unreachable())).red(),
        style("|").dim(),
        style(format!("{} lookup failed", stats.lookup_failures)).yellow(),
    );
    let _ = term.write_line(&line);

    if stats.timeouts > 0 || stats.denied_addresses > 0 {
        let _ = term.write_line(&format!(
            "  {} {} timed out, {} denied by network filters",
            style("•").dim(),
            stats.timeouts,
            stats.denied_addresses,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use tls_reach_lib::{ProbePhase, ReachError};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn sample() -> Vec<DomainVerdict> {
        vec![
            DomainVerdict::checked(
                "ok.test",
                vec![
                    ProbeOutcome::Success { addr: ip("10.0.0.5") },
                    ProbeOutcome::Denied {
                        addr: ip("93.184.216.34"),
                    },
                ],
            ),
            DomainVerdict::checked(
                "slow.test",
                vec![ProbeOutcome::ConnectFailed {
                    addr: ip("10.0.0.6"),
                    error: ReachError::timeout(ProbePhase::Connect, Duration::from_millis(1000)),
                }],
            ),
            DomainVerdict::lookup_failed("nx.test", &ReachError::lookup("nx.test", "no such host")),
            DomainVerdict::no_addresses("empty.test"),
        ]
    }

    #[test]
    fn test_text_line() {
        let mut out = Vec::new();
        write_verdict(&mut out, &sample()[0], false).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ok.test: OK: 10.0.0.5; denied by network filters: 93.184.216.34\n"
        );
    }

    #[test]
    fn test_json_line() {
        let mut out = Vec::new();
        write_verdict(&mut out, &sample()[2], true).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.matches('\n').count(), 1);
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["domain"], "nx.test");
        assert_eq!(value["status"]["kind"], "lookup_failed");
    }

    #[test]
    fn test_run_stats() {
        let mut stats = RunStats::default();
        for verdict in &sample() {
            stats.record(verdict);
        }

        assert_eq!(
            stats,
            RunStats {
                domains: 4,
                reachable: 1,
                lookup_failures: 1,
                no_addresses: 1,
                denied_addresses: 1,
                timeouts: 1,
            }
        );
        assert_eq!(stats.unreachable(), 3);
    }
}
