//! ParallelBestResolver: races a weighted-random draw of two distinct
//! resolvers, first success wins.
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rdns_context::{Request, Response};
use tokio::sync::mpsc;

use crate::{
    error::{AggregateFailure, FailedAttempt, ResolveError},
    Resolver,
};

pub struct ParallelBestResolver {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl ParallelBestResolver {
    pub fn new(resolvers: Vec<Arc<dyn Resolver>>) -> Self {
        Self { resolvers }
    }

    /// Weighted-random draw of two distinct indices. Falls back to
    /// whatever index it can find if weights collapse in a pathological
    /// way; callers already guarantee `len() >= 2`.
    fn draw_two(&self) -> (usize, usize) {
        let first = weighted_pick(&self.resolvers, None);
        let second = weighted_pick(&self.resolvers, Some(first));
        (first, second)
    }
}

fn weighted_pick(resolvers: &[Arc<dyn Resolver>], exclude: Option<usize>) -> usize {
    let weights: Vec<(usize, u32)> = resolvers
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != exclude)
        .map(|(i, r)| (i, r.weight()))
        .collect();

    let total: u32 = weights.iter().map(|(_, w)| w).sum();
    if total == 0 {
        return weights.first().map(|(i, _)| *i).unwrap_or(0);
    }

    let mut draw = rand::rng().random_range(0..total);
    for (idx, weight) in &weights {
        if draw < *weight {
            return *idx;
        }
        draw -= weight;
    }
    weights.last().map(|(i, _)| *i).unwrap_or(0)
}

#[async_trait]
impl Resolver for ParallelBestResolver {
    async fn resolve(&self, request: &Request) -> Result<Response, ResolveError> {
        if self.resolvers.is_empty() {
            return Err(ResolveError::Config("no resolvers in group".into()));
        }
        if self.resolvers.len() == 1 {
            return self.resolvers[0].resolve(request).await;
        }

        let (first, second) = self.draw_two();
        let (tx, mut rx) = mpsc::channel(2);

        for idx in [first, second] {
            let resolver = self.resolvers[idx].clone();
            let request = request.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let name = resolver.name();
                let result = resolver.resolve(&request).await;
                // the loser's send still completes into this
                // capacity-two channel; it never blocks.
                let _ = tx.send((name, result)).await;
            });
        }
        drop(tx);

        let mut failures = Vec::with_capacity(2);
        while let Some((name, result)) = rx.recv().await {
            match result {
                Ok(response) => return Ok(response),
                Err(e) => failures.push(FailedAttempt {
                    resolver: name,
                    source: anyhow::anyhow!(e),
                }),
            }
            if failures.len() == 2 {
                break;
            }
        }

        Err(ResolveError::Aggregate(AggregateFailure(failures)))
    }

    fn kind(&self) -> &'static str {
        "parallel_best"
    }

    fn name(&self) -> String {
        format!("parallel_best({} upstreams)", self.resolvers.len())
    }

    fn is_enabled(&self) -> bool {
        !self.resolvers.is_empty()
    }

    fn log_config(&self) {
        tracing::info!(upstreams = self.resolvers.len(), "parallel-best resolver configured");
        for resolver in &self.resolvers {
            resolver.log_config();
        }
    }
}
