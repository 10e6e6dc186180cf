use std::{fmt, net::IpAddr, str::FromStr};

use crate::error::ConfigError;

/// The wire transport used to reach one upstream.
///
/// `UdpTcp` fires a plain UDP query, retrying over TCP on truncation,
/// exactly like a classic resolver; the other three always use a
/// single connection-oriented transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamTransport {
    /// `tcp+udp:`, UDP first, TCP retry on truncation.
    UdpTcp,
    /// `tcp:`, TCP only.
    Tcp,
    /// `https:`, DNS-over-HTTPS.
    Https,
    /// `tcp-tls:`, DNS-over-TLS.
    Tls,
}

impl UpstreamTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamTransport::UdpTcp => "tcp+udp",
            UpstreamTransport::Tcp => "tcp",
            UpstreamTransport::Https => "https",
            UpstreamTransport::Tls => "tcp-tls",
        }
    }

    /// `UdpTcp` cannot go through Bootstrap (it would need to resolve a
    /// hostname for a transport that itself exists to avoid the cost of
    /// connection setup); every other transport may use a hostname.
    pub fn allows_hostname(&self) -> bool {
        !matches!(self, UpstreamTransport::UdpTcp)
    }
}

impl fmt::Display for UpstreamTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wire-level endpoint descriptor.
///
/// Invariant: for `transport == UdpTcp`, `host` must already be a literal
/// IP; constructing one from a hostname is a [`ConfigError`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Upstream {
    pub transport: UpstreamTransport,
    pub host: String,
    pub port: u16,
    pub path: Option<String>,
    pub tls_common_name: Option<String>,
}

impl Upstream {
    pub fn new(
        transport: UpstreamTransport,
        host: String,
        port: u16,
        path: Option<String>,
        tls_common_name: Option<String>,
    ) -> Result<Self, ConfigError> {
        if !transport.allows_hostname() && host.parse::<IpAddr>().is_err() {
            return Err(ConfigError::InvalidUpstream {
                descriptor: host.clone(),
                reason: format!(
                    "transport {transport} requires a literal IP host, got hostname {host:?}"
                ),
            });
        }
        Ok(Self {
            transport,
            host,
            port,
            path,
            tls_common_name,
        })
    }

    pub fn is_literal_ip(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }

    pub fn literal_ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    fn default_port(&self) -> u16 {
        match self.transport {
            UpstreamTransport::UdpTcp | UpstreamTransport::Tcp => 53,
            UpstreamTransport::Https => 443,
            UpstreamTransport::Tls => 853,
        }
    }

    /// A short, stable identity for logs and weighting, e.g.
    /// `tcp+udp:9.9.9.9:53`.
    pub fn id(&self) -> String {
        format!("{}:{}:{}", self.transport, self.host, self.port)
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Parses the upstream descriptor syntax:
/// `transport:host[:port][/path][#commonName]`.
impl FromStr for Upstream {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ConfigError::InvalidUpstream {
            descriptor: s.to_string(),
            reason,
        };

        let (transport, rest) = if let Some(rest) = s.strip_prefix("tcp+udp:") {
            (UpstreamTransport::UdpTcp, rest)
        } else if let Some(rest) = s.strip_prefix("tcp-tls:") {
            (UpstreamTransport::Tls, rest)
        } else if let Some(rest) = s.strip_prefix("https://") {
            (UpstreamTransport::Https, rest)
        } else if let Some(rest) = s.strip_prefix("https:") {
            (UpstreamTransport::Https, rest)
        } else if let Some(rest) = s.strip_prefix("tcp:") {
            (UpstreamTransport::Tcp, rest)
        } else {
            return Err(invalid(
                "missing or unrecognized transport prefix (expected one of \
                 tcp+udp:, tcp:, tcp-tls:, https:)"
                    .into(),
            ));
        };

        // Pull off an optional `#commonName` suffix first; it always
        // trails the rest of the descriptor.
        let (rest, tls_common_name) = match rest.rsplit_once('#') {
            Some((head, name)) => (head, Some(name.to_string())),
            None => (rest, None),
        };

        // Then an optional `/path` (only meaningful for HTTPS).
        let (rest, path) = match rest.split_once('/') {
            Some((head, tail)) => (head, Some(format!("/{tail}"))),
            None => (rest, None),
        };

        // What remains is `host` or `host:port`. Bracketed IPv6 literals
        // (`[::1]:53`) are split on the closing bracket so a literal
        // address's own colons aren't mistaken for a port separator.
        let (host, port_str) = if let Some(bracket_end) = rest.strip_prefix('[') {
            match bracket_end.split_once(']') {
                Some((addr, tail)) => {
                    let port = tail.strip_prefix(':');
                    (addr.to_string(), port)
                }
                None => return Err(invalid("unterminated IPv6 literal".into())),
            }
        } else {
            match rest.rsplit_once(':') {
                // Only treat this as host:port if the tail parses as a
                // port; otherwise it's a bare IPv6 literal with no port.
                Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
                    (host.to_string(), Some(port))
                }
                _ => (rest.to_string(), None),
            }
        };

        if host.is_empty() {
            return Err(invalid("empty host".into()));
        }

        let mut upstream = Upstream::new(transport, host, 0, path, tls_common_name)?;
        upstream.port = match port_str {
            Some(p) => p
                .parse()
                .map_err(|_| invalid(format!("invalid port {p:?}")))?,
            None => upstream.default_port(),
        };
        Ok(upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_udp_tcp() {
        let u: Upstream = "tcp+udp:9.9.9.9".parse().unwrap();
        assert_eq!(u.transport, UpstreamTransport::UdpTcp);
        assert_eq!(u.host, "9.9.9.9");
        assert_eq!(u.port, 53);
    }

    #[test]
    fn parses_custom_port() {
        let u: Upstream = "tcp+udp:9.9.9.9:5353".parse().unwrap();
        assert_eq!(u.port, 5353);
    }

    #[test]
    fn parses_https_with_path() {
        let u: Upstream = "https://dns.quad9.net/dns-query".parse().unwrap();
        assert_eq!(u.transport, UpstreamTransport::Https);
        assert_eq!(u.host, "dns.quad9.net");
        assert_eq!(u.path.as_deref(), Some("/dns-query"));
        assert_eq!(u.port, 443);
    }

    #[test]
    fn parses_tls_with_common_name() {
        let u: Upstream = "tcp-tls:1.1.1.1:853#cloudflare-dns.com".parse().unwrap();
        assert_eq!(u.transport, UpstreamTransport::Tls);
        assert_eq!(u.tls_common_name.as_deref(), Some("cloudflare-dns.com"));
    }

    #[test]
    fn udp_tcp_rejects_hostname() {
        let err = "tcp+udp:dns.example.com".parse::<Upstream>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUpstream { .. }));
    }

    #[test]
    fn tcp_allows_hostname() {
        let u: Upstream = "tcp:dns.example.com".parse().unwrap();
        assert_eq!(u.host, "dns.example.com");
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert!("quic:9.9.9.9".parse::<Upstream>().is_err());
    }
}
