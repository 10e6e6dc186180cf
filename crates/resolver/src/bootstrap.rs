//! Bootstrap: the mini-resolver that turns an upstream's *hostname*
//! into an IP without ever recursing into the regular resolution path.
//! Two modes: delegate to the OS resolver when no bootstrap upstreams
//! are configured, or run its own tiny filter -> cache ->
//! `ParallelBestResolver` chain when they are.
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use rand::Rng;
use rdns_cache::{BootstrapCache, BootstrapCacheKey, IpQuery};
use rdns_context::{LogContext, Protocol, Request};
use rdns_dns::{domain_name::DomainName, ClassType, DnsMessageBuilder, DnsQuestion, DnsRecordData, RecordType};

use crate::{
    address::AddressSource,
    config::{BootstrapEntry, ConnectIpVersion},
    error::ConfigError,
    ipset::IPSet,
    parallel_best::ParallelBestResolver,
    resolver::UpstreamResolver,
    upstream::UpstreamTransport,
    Resolver,
};

impl From<ConnectIpVersion> for IpQuery {
    fn from(v: ConnectIpVersion) -> Self {
        match v {
            ConnectIpVersion::V4Only => IpQuery::V4Only,
            ConnectIpVersion::V6Only => IpQuery::V6Only,
            ConnectIpVersion::Dual => IpQuery::Dual,
        }
    }
}

enum Mode {
    System,
    Upstreams(Arc<ParallelBestResolver>),
}

/// Handle held by an [`UpstreamResolver`] that needs Bootstrap for
/// address resolution. Resolvers Bootstrap builds for its own upstream
/// list hold a `Weak` handle so the two don't keep each other alive;
/// everyone else holds `Strong`.
#[derive(Clone)]
pub enum BootstrapHandle {
    Strong(Arc<Bootstrap>),
    Weak(Weak<Bootstrap>),
}

#[async_trait]
impl AddressSource for BootstrapHandle {
    async fn resolve(&self, host: &str) -> anyhow::Result<IpAddr> {
        let bootstrap = match self {
            BootstrapHandle::Strong(b) => b.clone(),
            BootstrapHandle::Weak(w) => w
                .upgrade()
                .ok_or_else(|| anyhow::anyhow!("bootstrap dropped"))?,
        };
        bootstrap.resolve_host(host).await
    }
}

pub struct Bootstrap {
    mode: Mode,
    cache: BootstrapCache,
    query: ConnectIpVersion,
    /// Pre-resolved IPs for Bootstrap's own upstream hostnames. Checked
    /// before anything else so Bootstrap never asks itself to resolve
    /// one of its own upstreams.
    own_hosts: HashMap<String, IPSet>,
}

impl Bootstrap {
    /// System-resolver-delegation mode: no bootstrap upstreams
    /// configured, hostnames are resolved via the OS.
    pub fn system() -> Arc<Self> {
        Arc::new(Self {
            mode: Mode::System,
            cache: BootstrapCache::new(),
            query: ConnectIpVersion::Dual,
            own_hosts: HashMap::new(),
        })
    }

    /// Builds Bootstrap's own upstream chain. Every non-literal-IP
    /// entry must carry an explicit `ips` override; Bootstrap has no
    /// other way to learn its own upstreams' addresses.
    pub fn with_upstreams(
        entries: Vec<BootstrapEntry>,
        query: ConnectIpVersion,
    ) -> Result<Arc<Self>, ConfigError> {
        let mut own_hosts = HashMap::new();
        let mut parsed = Vec::with_capacity(entries.len());

        for entry in &entries {
            let upstream = entry.upstream.parse()?;
            if !upstream.is_literal_ip() {
                if !matches!(upstream.transport, UpstreamTransport::Https | UpstreamTransport::Tls) {
                    return Err(ConfigError::BootstrapHostnameNotAllowed {
                        host: upstream.host.clone(),
                        transport: upstream.transport.as_str(),
                    });
                }
                if entry.ips.is_empty() {
                    return Err(ConfigError::MissingBootstrapIps {
                        host: upstream.host.clone(),
                        transport: upstream.transport.as_str(),
                    });
                }
                let set = IPSet::new(entry.ips.clone())
                    .expect("checked non-empty above");
                own_hosts.insert(upstream.host.clone(), set);
            }
            parsed.push(upstream);
        }

        Ok(Arc::new_cyclic(|weak: &Weak<Bootstrap>| {
            let handle = BootstrapHandle::Weak(weak.clone());
            let resolvers: Vec<Arc<dyn Resolver>> = parsed
                .into_iter()
                .map(|upstream| {
                    Arc::new(UpstreamResolver::new(
                        upstream,
                        Arc::new(handle.clone()),
                        crate::resolver::DEFAULT_TIMEOUT,
                    )) as Arc<dyn Resolver>
                })
                .collect();

            Bootstrap {
                mode: Mode::Upstreams(Arc::new(ParallelBestResolver::new(resolvers))),
                cache: BootstrapCache::new(),
                query,
                own_hosts,
            }
        }))
    }

    /// The recursion-breaking, cache-fronted hostname-to-IP lookup every
    /// transport-owning resolver calls through.
    pub async fn resolve_host(&self, host: &str) -> anyhow::Result<IpAddr> {
        if let Some(set) = self.own_hosts.get(host) {
            return Ok(set.next());
        }

        let key = BootstrapCacheKey {
            host: Arc::from(host),
            query: self.query.into(),
        };

        let ips = match &self.mode {
            Mode::System => {
                let host = host.to_string();
                let query = self.query;
                self.cache
                    .get_or_refresh(key, move || {
                        let host = host.clone();
                        async move { system_lookup(&host, query).await }
                    })
                    .await?
            }
            Mode::Upstreams(chain) => {
                let chain = chain.clone();
                let host = host.to_string();
                let query = self.query;
                self.cache
                    .get_or_refresh(key, move || {
                        let chain = chain.clone();
                        let host = host.clone();
                        async move { chain_lookup(chain, &host, query).await }
                    })
                    .await?
            }
        };

        if ips.is_empty() {
            return Err(anyhow::anyhow!("no such host: {host}"));
        }
        let i = rand::rng().random_range(0..ips.len());
        Ok(ips[i])
    }
}

async fn system_lookup(host: &str, query: ConnectIpVersion) -> anyhow::Result<Vec<IpAddr>> {
    let addrs = tokio::net::lookup_host((host, 0)).await?;
    Ok(filter_by_version(addrs.map(|a| a.ip()).collect(), query))
}

async fn chain_lookup(
    chain: Arc<ParallelBestResolver>,
    host: &str,
    query: ConnectIpVersion,
) -> anyhow::Result<Vec<IpAddr>> {
    let qname = DomainName::from_ascii(format!("{host}."))?;
    let mut ips = Vec::new();
    if matches!(query, ConnectIpVersion::V4Only | ConnectIpVersion::Dual) {
        ips.extend(query_once(&chain, &qname, RecordType::A).await?);
    }
    if matches!(query, ConnectIpVersion::V6Only | ConnectIpVersion::Dual) {
        ips.extend(query_once(&chain, &qname, RecordType::AAAA).await?);
    }
    Ok(filter_by_version(ips, query))
}

async fn query_once(
    chain: &Arc<ParallelBestResolver>,
    qname: &DomainName,
    record_type: RecordType,
) -> anyhow::Result<Vec<IpAddr>> {
    let question = DnsQuestion::new(qname.clone(), record_type, ClassType::IN);
    let message = DnsMessageBuilder::new()
        .with_id(rand::rng().random())
        .add_question(question)
        .build();

    let request = Request::new(
        message,
        None,
        None,
        Protocol::Udp,
        LogContext::new("bootstrap", Protocol::Udp),
    );

    let response = chain
        .resolve(&request)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let ips = response
        .dns_message()
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            DnsRecordData::Ipv4(addr) => Some(IpAddr::V4(*addr)),
            DnsRecordData::Ipv6(addr) => Some(IpAddr::V6(*addr)),
            _ => None,
        })
        .collect();
    Ok(ips)
}

fn filter_by_version(ips: Vec<IpAddr>, query: ConnectIpVersion) -> Vec<IpAddr> {
    ips.into_iter()
        .filter(|ip| match query {
            ConnectIpVersion::V4Only => ip.is_ipv4(),
            ConnectIpVersion::V6Only => ip.is_ipv6(),
            ConnectIpVersion::Dual => true,
        })
        .collect()
}
