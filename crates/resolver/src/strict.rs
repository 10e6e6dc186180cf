//! StrictResolver: tries upstreams in declared order with a per-step
//! timeout, falling through to the next on failure or deadline. No
//! randomization, no weighting.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rdns_context::{Request, Response};

use crate::{
    error::{AggregateFailure, FailedAttempt, ResolveError},
    Resolver,
};

pub struct StrictResolver {
    resolvers: Vec<Arc<dyn Resolver>>,
    per_step_timeout: Duration,
}

impl StrictResolver {
    pub fn new(resolvers: Vec<Arc<dyn Resolver>>, per_step_timeout: Duration) -> Self {
        Self {
            resolvers,
            per_step_timeout,
        }
    }
}

#[async_trait]
impl Resolver for StrictResolver {
    async fn resolve(&self, request: &Request) -> Result<Response, ResolveError> {
        if self.resolvers.is_empty() {
            return Err(ResolveError::Config("no resolvers in group".into()));
        }
        if self.resolvers.len() == 1 {
            return self.resolvers[0].resolve(request).await;
        }

        let mut failures = Vec::with_capacity(self.resolvers.len());
        for resolver in &self.resolvers {
            let name = resolver.name();
            match tokio::time::timeout(self.per_step_timeout, resolver.resolve(request)).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => failures.push(FailedAttempt {
                    resolver: name,
                    source: anyhow::anyhow!(e),
                }),
                Err(_) => failures.push(FailedAttempt {
                    resolver: name,
                    source: anyhow::anyhow!("timed out after {:?}", self.per_step_timeout),
                }),
            }
        }

        Err(ResolveError::Aggregate(AggregateFailure(failures)))
    }

    fn kind(&self) -> &'static str {
        "strict"
    }

    fn name(&self) -> String {
        format!("strict({} upstreams)", self.resolvers.len())
    }

    fn is_enabled(&self) -> bool {
        !self.resolvers.is_empty()
    }

    fn log_config(&self) {
        tracing::info!(
            upstreams = self.resolvers.len(),
            timeout = ?self.per_step_timeout,
            "strict resolver configured"
        );
        for resolver in &self.resolvers {
            resolver.log_config();
        }
    }
}
