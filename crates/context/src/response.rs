use std::sync::Arc;

use rdns_dns::DnsMessage;

/// Tags a [`Response`] with where it came from. This core only ever
/// produces `Resolved`; the other variants exist so collaborators
/// (cache, blocklist) that share the same pipeline can stamp their own
/// outcomes without a separate response type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Resolved,
    Cached,
    Blocked,
}

/// The outcome of resolving a [`crate::Request`].
#[derive(Debug, Clone)]
pub struct Response {
    dns_message: Arc<DnsMessage>,
    reason: Arc<str>,
    response_type: ResponseType,
    resolved_by: Option<Arc<str>>,
}

impl Response {
    pub fn new(
        dns_message: DnsMessage,
        reason: impl Into<Arc<str>>,
        response_type: ResponseType,
        resolved_by: Option<Arc<str>>,
    ) -> Self {
        Self {
            dns_message: Arc::new(dns_message),
            reason: reason.into(),
            response_type,
            resolved_by,
        }
    }

    pub fn resolved(dns_message: DnsMessage, resolved_by: impl Into<Arc<str>>) -> Self {
        Self::new(
            dns_message,
            "resolved by upstream",
            ResponseType::Resolved,
            Some(resolved_by.into()),
        )
    }

    pub fn dns_message(&self) -> &DnsMessage {
        &self.dns_message
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn resolved_by(&self) -> Option<&str> {
        self.resolved_by.as_deref()
    }
}
