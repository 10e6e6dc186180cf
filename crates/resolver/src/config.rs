//! Deserializable surface for upstream groups and bootstrap entries.
//! Reading a config file from disk is an external collaborator's job;
//! this module only describes the shape once it's in hand as a
//! TOML/struct value.
use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::upstream::Upstream;

/// Which record types a bootstrap lookup should request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectIpVersion {
    V4Only,
    V6Only,
    #[default]
    Dual,
}

/// One upstream descriptor as it appears in config, before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UpstreamEntry(pub String);

impl UpstreamEntry {
    pub fn parse(&self) -> Result<Upstream, crate::error::ConfigError> {
        Upstream::from_str(&self.0)
    }
}

/// A bootstrap upstream, with an optional override of the IPs used to
/// reach it when its host isn't already a literal IP.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BootstrapEntry {
    pub upstream: UpstreamEntry,
    #[serde(default)]
    pub ips: Vec<std::net::IpAddr>,
}

/// The resolution strategy used to fan a request out across a group's
/// upstreams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GroupStrategy {
    #[default]
    ParallelBest,
    Strict,
}

/// One named group of upstreams as it appears in config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamGroupEntry {
    #[serde(default)]
    pub strategy: GroupStrategy,
    pub upstreams: Vec<UpstreamEntry>,
}

/// Top-level deserializable upstream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamsConfig {
    #[serde(default)]
    pub bootstrap: Vec<BootstrapEntry>,
    #[serde(default)]
    pub connect_ip_version: ConnectIpVersion,
    /// Per-call timeout, in seconds, bounding a single `UpstreamResolver`
    /// exchange. Zero means no per-call timeout is applied.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub groups: std::collections::HashMap<String, UpstreamGroupEntry>,
}

impl UpstreamsConfig {
    /// The configured timeout as a [`Duration`]. `Duration::ZERO` is the
    /// "no per-call timeout" sentinel; callers check for it rather than
    /// treating it as an instant deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamsConfig {
    fn default() -> Self {
        Self {
            bootstrap: Vec::new(),
            connect_ip_version: ConnectIpVersion::default(),
            timeout_secs: default_timeout_secs(),
            groups: std::collections::HashMap::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_config() {
        let toml_src = r#"
            [groups.default]
            upstreams = ["tcp+udp:9.9.9.9", "tcp+udp:1.1.1.1"]
        "#;
        let cfg: UpstreamsConfig = toml::from_str(toml_src).unwrap();
        assert!(cfg.groups.contains_key("default"));
        assert_eq!(cfg.groups["default"].upstreams.len(), 2);
        assert_eq!(cfg.groups["default"].strategy, GroupStrategy::ParallelBest);
    }

    #[test]
    fn deserializes_bootstrap_with_explicit_ips() {
        let toml_src = r#"
            [[bootstrap]]
            upstream = "https://dns.quad9.net/dns-query"
            ips = ["9.9.9.9"]

            [groups.default]
            upstreams = ["tcp+udp:9.9.9.9"]
        "#;
        let cfg: UpstreamsConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.bootstrap.len(), 1);
        assert_eq!(cfg.bootstrap[0].ips, vec!["9.9.9.9".parse::<std::net::IpAddr>().unwrap()]);
    }
}
