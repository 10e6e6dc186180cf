//! Group registry: `groupName -> Resolver`, immutable after
//! construction, with a mandatory `"default"` group. Group selection
//! per request is a collaborator's job (client classification); this
//! registry only answers the plain lookup.
use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    address::{AddressSource, LiteralAddress},
    bootstrap::{Bootstrap, BootstrapHandle},
    config::{GroupStrategy, UpstreamGroupEntry, UpstreamsConfig},
    error::ConfigError,
    parallel_best::ParallelBestResolver,
    resolver::UpstreamResolver,
    strict::StrictResolver,
    Resolver,
};

pub const DEFAULT_GROUP: &str = "default";

pub struct UpstreamGroupRegistry {
    groups: HashMap<String, Arc<dyn Resolver>>,
}

impl UpstreamGroupRegistry {
    /// Pure lookup by name: no first-entry fallback. An unknown name is
    /// the caller's error to avoid, not something this registry papers
    /// over.
    pub fn get(&self, group_name: &str) -> Option<&Arc<dyn Resolver>> {
        self.groups.get(group_name)
    }

    pub fn default_group(&self) -> &Arc<dyn Resolver> {
        self.groups
            .get(DEFAULT_GROUP)
            .expect("constructor guarantees the default group exists")
    }

    pub async fn build(
        config: UpstreamsConfig,
        bootstrap: Arc<Bootstrap>,
        per_step_timeout: Duration,
        verify_on_construction: bool,
    ) -> Result<Self, ConfigError> {
        if !config.groups.contains_key(DEFAULT_GROUP) {
            return Err(ConfigError::MissingDefaultGroup);
        }

        let upstream_timeout = config.timeout();
        let mut groups = HashMap::with_capacity(config.groups.len());
        for (name, entry) in config.groups {
            let resolver = build_group(
                &name,
                entry,
                &bootstrap,
                upstream_timeout,
                per_step_timeout,
                verify_on_construction,
            )
            .await?;
            groups.insert(name, resolver);
        }

        Ok(Self { groups })
    }
}

async fn build_group(
    name: &str,
    entry: UpstreamGroupEntry,
    bootstrap: &Arc<Bootstrap>,
    upstream_timeout: Duration,
    per_step_timeout: Duration,
    verify_on_construction: bool,
) -> Result<Arc<dyn Resolver>, ConfigError> {
    if entry.upstreams.is_empty() {
        return Err(ConfigError::EmptyGroup(name.to_string()));
    }

    let mut verified = Vec::with_capacity(entry.upstreams.len());
    let mut any_passed = false;

    for descriptor in &entry.upstreams {
        let upstream = descriptor.parse()?;
        let address_source: Arc<dyn AddressSource> = match upstream.literal_ip() {
            Some(ip) => Arc::new(LiteralAddress(ip)),
            None => Arc::new(BootstrapHandle::Strong(bootstrap.clone())),
        };
        let resolver = UpstreamResolver::new(upstream, address_source, upstream_timeout);

        let passed = if verify_on_construction {
            resolver.self_test().await
        } else {
            true
        };
        any_passed |= passed;
        verified.push((resolver, passed));
    }

    if verify_on_construction && !any_passed {
        return Err(ConfigError::VerificationFailed(name.to_string()));
    }

    let resolvers: Vec<Arc<dyn Resolver>> = verified
        .into_iter()
        .map(|(resolver, _)| Arc::new(resolver) as Arc<dyn Resolver>)
        .collect();

    let strategy_resolver: Arc<dyn Resolver> = match entry.strategy {
        GroupStrategy::ParallelBest => Arc::new(ParallelBestResolver::new(resolvers)),
        GroupStrategy::Strict => Arc::new(StrictResolver::new(resolvers, per_step_timeout)),
    };

    strategy_resolver.log_config();
    Ok(strategy_resolver)
}
