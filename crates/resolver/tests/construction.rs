//! Construction-time behavior: the verification gate and Bootstrap's
//! recursion break.
use std::{collections::HashMap, net::Ipv4Addr, time::Duration};

use rdns_resolver::{
    bootstrap::Bootstrap,
    config::{BootstrapEntry, ConnectIpVersion, GroupStrategy, UpstreamEntry, UpstreamGroupEntry, UpstreamsConfig},
    group::UpstreamGroupRegistry,
    ConfigError, Resolver,
};

fn wrong_and_unreachable_config() -> UpstreamsConfig {
    let mut groups = HashMap::new();
    groups.insert(
        "default".to_string(),
        UpstreamGroupEntry {
            strategy: GroupStrategy::ParallelBest,
            upstreams: vec![
                UpstreamEntry("tcp+udp:203.0.113.1".to_string()),
                UpstreamEntry("tcp+udp:203.0.113.2".to_string()),
            ],
        },
    );
    UpstreamsConfig {
        bootstrap: Vec::new(),
        connect_ip_version: ConnectIpVersion::Dual,
        timeout_secs: 5,
        groups,
    }
}

#[tokio::test]
async fn s1_verification_gate_rejects_all_unreachable_group() {
    let bootstrap = Bootstrap::system();
    let result = UpstreamGroupRegistry::build(
        wrong_and_unreachable_config(),
        bootstrap,
        Duration::from_millis(200),
        true,
    )
    .await;

    assert!(matches!(result, Err(ConfigError::VerificationFailed(_))));
}

#[tokio::test]
async fn s2_skipping_verification_defers_the_failure_to_resolve_time() {
    let bootstrap = Bootstrap::system();
    let registry = UpstreamGroupRegistry::build(
        wrong_and_unreachable_config(),
        bootstrap,
        Duration::from_millis(200),
        false,
    )
    .await
    .expect("construction succeeds when verification is skipped");

    let group = registry.get("default").expect("default group exists");

    let qname = rdns_dns::domain_name::DomainName::from_ascii("example.com.").unwrap();
    let question = rdns_dns::DnsQuestion::new(qname, rdns_dns::RecordType::A, rdns_dns::ClassType::IN);
    let message = rdns_dns::DnsMessageBuilder::new().with_id(1).add_question(question).build();
    let request = rdns_context::Request::new(
        message,
        None,
        None,
        rdns_context::Protocol::Udp,
        rdns_context::LogContext::new("test", rdns_context::Protocol::Udp),
    );

    let result = group.resolve(&request).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn bootstrap_literal_ip_entry_needs_no_explicit_ips() {
    let entries = vec![BootstrapEntry {
        upstream: UpstreamEntry("tcp+udp:9.9.9.9".to_string()),
        ips: Vec::new(),
    }];
    assert!(Bootstrap::with_upstreams(entries, ConnectIpVersion::Dual).is_ok());
}

#[tokio::test]
async fn bootstrap_hostname_entry_without_explicit_ips_is_rejected() {
    let entries = vec![BootstrapEntry {
        upstream: UpstreamEntry("https://dns.quad9.net/dns-query".to_string()),
        ips: Vec::new(),
    }];
    let err = Bootstrap::with_upstreams(entries, ConnectIpVersion::Dual).unwrap_err();
    assert!(matches!(err, ConfigError::MissingBootstrapIps { .. }));
}

#[tokio::test]
async fn bootstrap_own_host_resolves_from_the_override_without_a_network_call() {
    let entries = vec![BootstrapEntry {
        upstream: UpstreamEntry("https://dns.quad9.net/dns-query".to_string()),
        ips: vec![Ipv4Addr::new(9, 9, 9, 9).into()],
    }];
    let bootstrap = Bootstrap::with_upstreams(entries, ConnectIpVersion::Dual).unwrap();

    // `resolve_host` is given the bootstrap upstream's own hostname: this
    // must be answered from the pre-populated override table, never by
    // re-entering the bootstrap chain.
    let ip = bootstrap.resolve_host("dns.quad9.net").await.unwrap();
    assert_eq!(ip, Ipv4Addr::new(9, 9, 9, 9));
}
