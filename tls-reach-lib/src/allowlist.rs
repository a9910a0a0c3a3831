//! Network allow-list for probe targets.
//!
//! An allow-list is built once before any worker starts and then shared
//! read-only through an `Arc`. "No allow-list" (`None`) permits every address;
//! an allow-list with zero networks permits nothing.

use crate::error::ReachError;
use ipnetwork::IpNetwork;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, warn};

/// Compiled set of permitted networks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllowList {
    networks: Vec<IpNetwork>,
    skipped: Vec<SkippedLine>,
}

/// A line of the allow-list source that could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    /// 1-based line number
    pub line: usize,
    pub content: String,
    pub reason: String,
}

impl AllowList {
    /// Build an allow-list from already-parsed networks.
    pub fn new(networks: Vec<IpNetwork>) -> Self {
        Self {
            networks,
            skipped: Vec::new(),
        }
    }

    /// Parse allow-list text. Never fails: malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut allow_list = Self::default();
        for (idx, line) in text.lines().enumerate() {
            allow_list.push_line(idx + 1, line, "<inline>");
        }
        allow_list
    }

    /// Read an allow-list from any buffered reader.
    ///
    /// `source` only names the input in log messages. A read error is fatal
    /// since running with a partial list would filter the wrong addresses.
    /// Bytes that are not UTF-8 only spoil their own line, which is skipped.
    pub fn from_reader<R: BufRead>(reader: R, source: &str) -> Result<Self, ReachError> {
        let mut allow_list = Self::default();

        for (idx, line) in reader.split(b'\n').enumerate() {
            let line = line.map_err(|e| ReachError::allow_list_file(source, e.to_string()))?;
            let line = String::from_utf8_lossy(&line);
            allow_list.push_line(idx + 1, &line, source);
        }

        debug!(
            "loaded {} networks from '{}' ({} lines skipped)",
            allow_list.networks.len(),
            source,
            allow_list.skipped.len()
        );

        Ok(allow_list)
    }

    /// Load an allow-list file. One network or address per line, `#` comments.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ReachError> {
        let path = path.as_ref();
        let source = path.to_string_lossy();
        let file =
            File::open(path).map_err(|e| ReachError::allow_list_file(source.as_ref(), e.to_string()))?;

        Self::from_reader(BufReader::new(file), &source)
    }

    fn push_line(&mut self, line_num: usize, raw: &str, source: &str) {
        let content = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();

        if content.is_empty() {
            return;
        }

        match parse_network(content) {
            Ok(network) => self.networks.push(network),
            Err(reason) => {
                warn!(
                    "skipping line {} of '{}' ({}): {}",
                    line_num, source, content, reason
                );
                self.skipped.push(SkippedLine {
                    line: line_num,
                    content: content.to_string(),
                    reason,
                });
            }
        }
    }

    /// Whether `addr` lies inside any listed network.
    pub fn contains(&self, addr: IpAddr) -> bool {
        let addr = canonical(addr);
        self.networks.iter().any(|network| network.contains(addr))
    }

    pub fn networks(&self) -> &[IpNetwork] {
        &self.networks
    }

    /// Lines dropped during parsing.
    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

/// Decide whether a probe to `addr` may be attempted.
///
/// `None` means no filter is configured and everything is permitted.
pub fn permitted(addr: IpAddr, allow_list: Option<&AllowList>) -> bool {
    match allow_list {
        None => true,
        Some(list) => list.contains(addr),
    }
}

/// Parse one entry: a CIDR network, or a bare address as a host prefix.
fn parse_network(entry: &str) -> Result<IpNetwork, String> {
    if entry.contains('/') {
        let network: IpNetwork = entry
            .parse()
            .map_err(|e| format!("invalid CIDR network: {}", e))?;
        // Store the base address so the list prints as the network, not the host.
        IpNetwork::new(network.network(), network.prefix())
            .map_err(|e| format!("invalid CIDR network: {}", e))
    } else {
        let addr: IpAddr = entry
            .parse()
            .map_err(|e| format!("invalid IP address: {}", e))?;
        Ok(IpNetwork::from(addr))
    }
}

/// IPv4-mapped IPv6 addresses are matched against IPv4 networks.
fn canonical(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => addr,
        },
        v4 => v4,
    }
}
