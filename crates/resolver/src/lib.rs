use async_trait::async_trait;
use rdns_context::{Request, Response};

pub use error::{ConfigError, ResolveError, ResolveErrorType};

pub mod address;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod group;
pub mod ipset;
pub mod parallel_best;
pub mod resolver;
pub mod status;
pub mod strict;
pub mod transport;
pub mod upstream;

pub use bootstrap::Bootstrap;
pub use group::UpstreamGroupRegistry;
pub use parallel_best::ParallelBestResolver;
pub use resolver::UpstreamResolver;
pub use strict::StrictResolver;

/// The single operation external collaborators (a DNS listener, an
/// HTTP control plane, ...) drive this crate through: hand it a
/// [`Request`], get back a [`Response`] or a [`ResolveError`].
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, request: &Request) -> Result<Response, ResolveError>;

    /// A short tag identifying this resolver's strategy, e.g.
    /// `"upstream"`, `"parallel-best"`, `"strict"`.
    fn kind(&self) -> &'static str;

    /// A human-readable identity for logs.
    fn name(&self) -> String;

    fn is_enabled(&self) -> bool;

    /// Emit this resolver's effective configuration at `info` level,
    /// once, at startup.
    fn log_config(&self);

    /// Current selection weight used by [`ParallelBestResolver`]'s
    /// weighted draw. Only [`UpstreamResolver`] carries real error
    /// history; composite resolvers (strategies wrapping other
    /// resolvers) keep the base weight.
    fn weight(&self) -> u32 {
        status::BASE_WEIGHT
    }
}
