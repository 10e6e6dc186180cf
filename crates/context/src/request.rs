use std::net::IpAddr;
use std::sync::Arc;

use rdns_dns::DnsMessage;

/// The transport a request arrived on. Distinct from an upstream's own
/// transport (`rdns_resolver::upstream::UpstreamTransport`): this one
/// describes how the *client* reached the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Udp,
    Tcp,
    Https,
    Tls,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
            Protocol::Https => "https",
            Protocol::Tls => "tls",
        }
    }
}

/// Small correlation bag threaded through logging call sites. Kept
/// cheap to clone (`Arc<str>` id) since it rides along on every request.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub request_id: Arc<str>,
    pub protocol: Protocol,
}

impl LogContext {
    pub fn new(request_id: impl Into<Arc<str>>, protocol: Protocol) -> Self {
        Self {
            request_id: request_id.into(),
            protocol,
        }
    }
}

/// An immutable query envelope entering the resolution pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    dns_message: Arc<DnsMessage>,
    client_ip: Option<IpAddr>,
    client_name: Option<Arc<str>>,
    protocol: Protocol,
    log_context: LogContext,
}

impl Request {
    pub fn new(
        dns_message: DnsMessage,
        client_ip: Option<IpAddr>,
        client_name: Option<Arc<str>>,
        protocol: Protocol,
        log_context: LogContext,
    ) -> Self {
        Self {
            dns_message: Arc::new(dns_message),
            client_ip,
            client_name,
            protocol,
            log_context,
        }
    }

    pub fn dns_message(&self) -> &DnsMessage {
        &self.dns_message
    }

    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn log_context(&self) -> &LogContext {
        &self.log_context
    }
}
