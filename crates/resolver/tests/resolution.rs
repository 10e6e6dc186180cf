//! Integration tests against in-process mock UDP upstreams, covering
//! resolution strategy behavior end to end.
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use rdns_context::{LogContext, Protocol, Request};
use rdns_dns::{ClassType, DnsFlags, DnsMessage, DnsMessageBuilder, DnsQuestion, DnsRecord, DnsRecordData, RecordType};
use rdns_resolver::{
    address::LiteralAddress, parallel_best::ParallelBestResolver, strict::StrictResolver,
    upstream::{Upstream, UpstreamTransport}, resolver::{UpstreamResolver, DEFAULT_TIMEOUT}, Resolver,
};
use tokio::net::UdpSocket;

fn query_request(name: &str) -> Request {
    let qname = rdns_dns::domain_name::DomainName::from_ascii(name).unwrap();
    let question = DnsQuestion::new(qname, RecordType::A, ClassType::IN);
    let message = DnsMessageBuilder::new().with_id(42).add_question(question).build();
    Request::new(message, None, None, Protocol::Udp, LogContext::new("test", Protocol::Udp))
}

fn answer_for(query: &DnsMessage, ip: Ipv4Addr, ttl: u32) -> DnsMessage {
    let question = query.questions().first().unwrap().clone();
    let record = DnsRecord {
        name: question.qname.clone(),
        record_type: RecordType::A,
        class: ClassType::IN,
        ttl,
        data: DnsRecordData::Ipv4(ip),
    };
    DnsMessageBuilder::new()
        .with_id(query.id)
        .with_flags(DnsFlags {
            qr: true,
            ..Default::default()
        })
        .add_question(question)
        .add_answer(record)
        .build()
}

/// Behavior of one mock upstream: always answer with an IP, never
/// answer at all (simulating unreachable), or sleep before answering.
enum MockBehavior {
    Answer(Ipv4Addr),
    Silent,
    Delayed(Duration, Ipv4Addr),
}

struct MockUpstream {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

async fn spawn_mock(behavior: MockBehavior) -> MockUpstream {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_task = hits.clone();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let (n, peer) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };
            hits_task.fetch_add(1, Ordering::SeqCst);
            let query = match DnsMessage::decode(&buf[..n]) {
                Ok(q) => q,
                Err(_) => continue,
            };

            match &behavior {
                MockBehavior::Silent => continue,
                MockBehavior::Answer(ip) => {
                    let resp = answer_for(&query, *ip, 123).encode().unwrap();
                    let _ = socket.send_to(&resp, peer).await;
                }
                MockBehavior::Delayed(delay, ip) => {
                    tokio::time::sleep(*delay).await;
                    let resp = answer_for(&query, *ip, 123).encode().unwrap();
                    let _ = socket.send_to(&resp, peer).await;
                }
            }
        }
    });

    MockUpstream { addr, hits }
}

fn upstream_resolver(addr: SocketAddr) -> Arc<dyn Resolver> {
    let upstream = Upstream::new(UpstreamTransport::UdpTcp, addr.ip().to_string(), addr.port(), None, None).unwrap();
    Arc::new(UpstreamResolver::new(upstream, Arc::new(LiteralAddress(addr.ip())), DEFAULT_TIMEOUT))
}

fn extract_ip(response: &rdns_context::Response) -> Ipv4Addr {
    match &response.dns_message().answers().first().unwrap().data {
        DnsRecordData::Ipv4(ip) => *ip,
        _ => panic!("expected an A record"),
    }
}

#[tokio::test]
async fn single_resolver_equivalence_parallel_best() {
    let mock = spawn_mock(MockBehavior::Answer(Ipv4Addr::new(123, 124, 122, 1))).await;
    let resolver = ParallelBestResolver::new(vec![upstream_resolver(mock.addr)]);

    for _ in 0..3 {
        resolver.resolve(&query_request("example.com.")).await.unwrap();
    }
    assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn single_resolver_equivalence_strict() {
    let mock = spawn_mock(MockBehavior::Answer(Ipv4Addr::new(123, 124, 122, 1))).await;
    let resolver = StrictResolver::new(vec![upstream_resolver(mock.addr)], Duration::from_millis(500));

    for _ in 0..3 {
        resolver.resolve(&query_request("example.com.")).await.unwrap();
    }
    assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn s3_strict_returns_first_upstream_answer() {
    let fast_a = spawn_mock(MockBehavior::Answer(Ipv4Addr::new(123, 124, 122, 122))).await;
    let fast_b = spawn_mock(MockBehavior::Answer(Ipv4Addr::new(123, 124, 122, 123))).await;

    let resolver = StrictResolver::new(
        vec![upstream_resolver(fast_a.addr), upstream_resolver(fast_b.addr)],
        Duration::from_millis(500),
    );

    let response = resolver.resolve(&query_request("example.com.")).await.unwrap();
    assert_eq!(extract_ip(&response), Ipv4Addr::new(123, 124, 122, 122));
}

#[tokio::test]
async fn s4_strict_falls_over_to_next_on_timeout() {
    let slow_a = spawn_mock(MockBehavior::Delayed(
        Duration::from_millis(300),
        Ipv4Addr::new(123, 124, 122, 1),
    ))
    .await;
    let fast_b = spawn_mock(MockBehavior::Answer(Ipv4Addr::new(123, 124, 122, 2))).await;

    let resolver = StrictResolver::new(
        vec![upstream_resolver(slow_a.addr), upstream_resolver(fast_b.addr)],
        Duration::from_millis(50),
    );

    let response = resolver.resolve(&query_request("example.com.")).await.unwrap();
    assert_eq!(extract_ip(&response), Ipv4Addr::new(123, 124, 122, 2));
}

#[tokio::test]
async fn s5_strict_all_timeout_is_an_error() {
    let slow_a = spawn_mock(MockBehavior::Delayed(
        Duration::from_millis(300),
        Ipv4Addr::new(123, 124, 122, 1),
    ))
    .await;
    let slow_b = spawn_mock(MockBehavior::Delayed(
        Duration::from_millis(300),
        Ipv4Addr::new(123, 124, 122, 2),
    ))
    .await;

    let resolver = StrictResolver::new(
        vec![upstream_resolver(slow_a.addr), upstream_resolver(slow_b.addr)],
        Duration::from_millis(50),
    );

    let result = resolver.resolve(&query_request("example.com.")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn s6_strict_skips_silent_upstream() {
    let silent = spawn_mock(MockBehavior::Silent).await;
    let fast_b = spawn_mock(MockBehavior::Answer(Ipv4Addr::new(123, 124, 122, 123))).await;

    let resolver = StrictResolver::new(
        vec![upstream_resolver(silent.addr), upstream_resolver(fast_b.addr)],
        Duration::from_millis(100),
    );

    let response = resolver.resolve(&query_request("example.com.")).await.unwrap();
    assert_eq!(extract_ip(&response), Ipv4Addr::new(123, 124, 122, 123));
}

#[tokio::test]
async fn s7_parallel_best_races_consistently() {
    let silent = spawn_mock(MockBehavior::Silent).await;
    let fast_b = spawn_mock(MockBehavior::Answer(Ipv4Addr::new(123, 124, 122, 200))).await;

    let resolver = ParallelBestResolver::new(vec![
        upstream_resolver(silent.addr),
        upstream_resolver(fast_b.addr),
    ]);

    for _ in 0..20 {
        let response = resolver.resolve(&query_request("example.com.")).await.unwrap();
        assert_eq!(extract_ip(&response), Ipv4Addr::new(123, 124, 122, 200));
    }
}

#[tokio::test]
async fn upstream_resolver_times_out_on_its_own_configured_timeout() {
    let silent = spawn_mock(MockBehavior::Silent).await;
    let upstream = Upstream::new(UpstreamTransport::UdpTcp, silent.addr.ip().to_string(), silent.addr.port(), None, None).unwrap();
    let resolver = UpstreamResolver::new(
        upstream,
        Arc::new(LiteralAddress(silent.addr.ip())),
        Duration::from_millis(50),
    );

    let result = resolver.resolve(&query_request("example.com.")).await;
    assert!(matches!(result, Err(rdns_resolver::ResolveError::Timeout { .. })));
}

#[tokio::test]
async fn zero_timeout_disables_the_per_call_deadline() {
    let delayed = spawn_mock(MockBehavior::Delayed(
        Duration::from_millis(200),
        Ipv4Addr::new(123, 124, 122, 1),
    ))
    .await;
    let upstream = Upstream::new(UpstreamTransport::UdpTcp, delayed.addr.ip().to_string(), delayed.addr.port(), None, None).unwrap();
    let resolver = UpstreamResolver::new(
        upstream,
        Arc::new(LiteralAddress(delayed.addr.ip())),
        Duration::ZERO,
    );

    let response = resolver.resolve(&query_request("example.com.")).await.unwrap();
    assert_eq!(extract_ip(&response), Ipv4Addr::new(123, 124, 122, 1));
}

#[tokio::test]
async fn all_upstreams_failing_surfaces_aggregate_error() {
    let silent_a = spawn_mock(MockBehavior::Silent).await;
    let silent_b = spawn_mock(MockBehavior::Silent).await;

    let resolver = ParallelBestResolver::new(vec![
        upstream_resolver(silent_a.addr),
        upstream_resolver(silent_b.addr),
    ]);

    let err = resolver.resolve(&query_request("example.com.")).await.unwrap_err();
    assert!(matches!(err, rdns_resolver::ResolveError::Aggregate(_)));
}
