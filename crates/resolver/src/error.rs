use thiserror::Error;

/// Tag used by collaborators (e.g. a metrics sink) to bucket a
/// [`ResolveError`] without matching on its full shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveErrorType {
    Config,
    NoSuchHost,
    Transport,
    Timeout,
    Aggregate,
    InvalidRequest,
    InvalidResponse,
}

/// A single upstream's contribution to an [`ResolveError::Aggregate`].
#[derive(Debug, Error)]
#[error("{resolver}: {source}")]
pub struct FailedAttempt {
    pub resolver: String,
    #[source]
    pub source: anyhow::Error,
}

/// All chosen upstreams for one request failed; carries each one's
/// identity and cause.
#[derive(Debug)]
pub struct AggregateFailure(pub Vec<FailedAttempt>);

impl std::fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "all upstreams failed: [")?;
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", attempt.resolver, attempt.source)?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for AggregateFailure {}

/// Errors surfaced by the resolution core.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Malformed upstream list, missing bootstrap IPs, or every upstream in
    /// a group failed construction-time verification. Fatal at construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// Bootstrap resolution returned no A/AAAA records. Retryable by the
    /// caller.
    #[error("no such host: {host}")]
    NoSuchHost { host: String },

    /// Network, TLS, or HTTP failure contacting one upstream.
    #[error("transport error on {resolver}: {source}")]
    Transport {
        resolver: String,
        #[source]
        source: anyhow::Error,
    },

    /// The per-call deadline elapsed. Weighted the same as a transport
    /// error.
    #[error("timeout contacting {resolver}")]
    Timeout { resolver: String },

    /// The request was malformed (e.g. not exactly one question).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An upstream's reply didn't match the request it was sent for.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Every upstream chosen for this request failed or timed out.
    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),
}

impl ResolveError {
    pub fn error_type(&self) -> ResolveErrorType {
        match self {
            ResolveError::Config(_) => ResolveErrorType::Config,
            ResolveError::NoSuchHost { .. } => ResolveErrorType::NoSuchHost,
            ResolveError::Transport { .. } => ResolveErrorType::Transport,
            ResolveError::Timeout { .. } => ResolveErrorType::Timeout,
            ResolveError::InvalidRequest(_) => ResolveErrorType::InvalidRequest,
            ResolveError::InvalidResponse(_) => ResolveErrorType::InvalidResponse,
            ResolveError::Aggregate(_) => ResolveErrorType::Aggregate,
        }
    }

    /// Whether this error should count against a resolver's weighting.
    /// Timeouts are treated the same as transport errors here.
    pub fn counts_against_weight(&self) -> bool {
        matches!(self, ResolveError::Transport { .. } | ResolveError::Timeout { .. })
    }
}

/// Construction-time failures, distinct from per-request [`ResolveError`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid upstream descriptor {descriptor:?}: {reason}")]
    InvalidUpstream { descriptor: String, reason: String },

    #[error(
        "bootstrap upstream {host:?} uses transport {transport} and is not a literal IP; \
         an explicit `ips` list is required for hostname-based bootstrap upstreams"
    )]
    MissingBootstrapIps { host: String, transport: &'static str },

    #[error(
        "bootstrap upstream {host:?} uses transport {transport}, which may not resolve a \
         hostname; only https and tcp-tls bootstrap upstreams may be hostname-based"
    )]
    BootstrapHostnameNotAllowed { host: String, transport: &'static str },

    #[error("upstream group {0:?} has no upstreams")]
    EmptyGroup(String),

    #[error("the \"default\" upstream group is mandatory but was not configured")]
    MissingDefaultGroup,

    #[error("all upstreams in group {0:?} failed construction-time verification")]
    VerificationFailed(String),
}
