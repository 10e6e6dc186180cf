//! `UpstreamResolver`: one wire-level resolver backing a single
//! [`Upstream`] descriptor. Selection of transport, transaction-ID
//! handling, and self-test are all grounded on the forward-resolver's
//! single-attempt wire exchange.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use rdns_context::{Request, Response};
use rdns_dns::{
    helpers::{extract_transaction_id, is_truncated},
    ClassType, DnsMessage, DnsMessageBuilder, DnsQuestion, RecordType,
};
use tokio::time::Instant;

use crate::{
    address::AddressSource,
    error::ResolveError,
    status::ResolverStatus,
    transport::{https::HttpsConn, tcp::TcpPool, tls::TlsConn, udp::UdpConn},
    upstream::{Upstream, UpstreamTransport},
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Stand-in deadline horizon used when `timeout` is zero ("no per-call
/// timeout"); transports still need a concrete [`Instant`] to compute
/// their own internal deadlines against.
const NO_TIMEOUT_HORIZON: Duration = Duration::from_secs(365 * 24 * 3600);
const SELF_TEST_HOST: &str = "github.com.";

pub struct UpstreamResolver {
    upstream: Upstream,
    address_source: Arc<dyn AddressSource>,
    status: ResolverStatus,
    tcp_pool: Option<Arc<TcpPool>>,
    timeout: Duration,
}

impl UpstreamResolver {
    /// `timeout` of `Duration::ZERO` disables the per-call deadline
    /// entirely; any other value bounds each wire exchange.
    pub fn new(upstream: Upstream, address_source: Arc<dyn AddressSource>, timeout: Duration) -> Self {
        let tcp_pool = match upstream.transport {
            UpstreamTransport::UdpTcp | UpstreamTransport::Tcp => upstream
                .literal_ip()
                .map(|ip| TcpPool::new(SocketAddr::new(ip, upstream.port), Default::default())),
            _ => None,
        };
        if let Some(pool) = &tcp_pool {
            pool.start_reaper();
        }
        Self {
            upstream,
            address_source,
            status: ResolverStatus::new(),
            tcp_pool,
            timeout,
        }
    }

    fn deadline_horizon(&self) -> Duration {
        if self.timeout.is_zero() {
            NO_TIMEOUT_HORIZON
        } else {
            self.timeout
        }
    }

    pub fn id(&self) -> String {
        self.upstream.id()
    }

    pub fn status(&self) -> &ResolverStatus {
        &self.status
    }

    pub fn weight(&self) -> u32 {
        self.status.weight()
    }

    /// Construction-time verification: issue a synthetic query and
    /// confirm the upstream answers at all.
    pub async fn self_test(&self) -> bool {
        let query = match self_test_query() {
            Ok(q) => q,
            Err(_) => return false,
        };
        self.exchange(&query, Instant::now() + self.deadline_horizon())
            .await
            .is_ok()
    }

    async fn resolve_address(&self) -> Result<std::net::IpAddr, ResolveError> {
        if let Some(ip) = self.upstream.literal_ip() {
            return Ok(ip);
        }
        self.address_source
            .resolve(&self.upstream.host)
            .await
            .map_err(|source| ResolveError::Transport {
                resolver: self.id(),
                source,
            })
    }

    async fn exchange(&self, query: &[u8], deadline: Instant) -> anyhow::Result<bytes::Bytes> {
        let ip = self
            .resolve_address()
            .await
            .map_err(anyhow::Error::from)?;
        let addr = SocketAddr::new(ip, self.upstream.port);

        match self.upstream.transport {
            UpstreamTransport::UdpTcp => {
                let udp = UdpConn::connect(addr).await?;
                let resp = udp.send_and_receive(query, deadline).await?;
                if is_truncated(&resp).unwrap_or(false) {
                    self.exchange_tcp(addr, query, deadline).await
                } else {
                    Ok(resp)
                }
            }
            UpstreamTransport::Tcp => self.exchange_tcp(addr, query, deadline).await,
            UpstreamTransport::Https => {
                let path = self.upstream.path.as_deref().unwrap_or("/dns-query");
                let conn = HttpsConn::new(ip, self.upstream.port, &self.upstream.host, path)?;
                conn.send_and_receive(query, deadline).await
            }
            UpstreamTransport::Tls => {
                let server_name = self
                    .upstream
                    .tls_common_name
                    .clone()
                    .unwrap_or_else(|| self.upstream.host.clone());
                let mut conn = TlsConn::connect(addr, &server_name, self.timeout).await?;
                conn.send_and_receive(query, deadline).await
            }
        }
    }

    async fn exchange_tcp(
        &self,
        addr: SocketAddr,
        query: &[u8],
        deadline: Instant,
    ) -> anyhow::Result<bytes::Bytes> {
        let pool = match &self.tcp_pool {
            Some(pool) => pool.clone(),
            None => TcpPool::new(addr, Default::default()),
        };
        let mut conn = pool.get_or_connect(deadline).await?;
        match conn.send_and_receive(query, deadline).await {
            Ok(resp) => {
                pool.put_back(conn, true);
                Ok(resp)
            }
            Err(e) => {
                pool.put_back(conn, false);
                Err(e)
            }
        }
    }

    /// Full request/response cycle: randomize the outgoing transaction
    /// ID, dispatch over the configured transport, verify the reply
    /// matches, and record success/failure against [`ResolverStatus`].
    pub async fn resolve(&self, request: &Request) -> Result<Response, ResolveError> {
        let raw = request
            .dns_message()
            .encode()
            .map_err(|e| ResolveError::InvalidRequest(e.to_string()))?;

        let (query, request_tid) = randomize_tid(&raw);
        let deadline = Instant::now() + self.deadline_horizon();

        let result = if self.timeout.is_zero() {
            Ok(self.exchange(&query, deadline).await)
        } else {
            tokio::time::timeout_at(deadline, self.exchange(&query, deadline)).await
        };

        let resp_bytes = match result {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(source)) => {
                self.status.record_error();
                return Err(ResolveError::Transport {
                    resolver: self.id(),
                    source,
                });
            }
            Err(_) => {
                self.status.record_error();
                return Err(ResolveError::Timeout {
                    resolver: self.id(),
                });
            }
        };

        let response_tid = extract_transaction_id(&resp_bytes).ok_or_else(|| {
            ResolveError::InvalidResponse("response missing transaction id".into())
        })?;
        if response_tid != request_tid {
            return Err(ResolveError::InvalidResponse(
                "response transaction id does not match request".into(),
            ));
        }

        let mut message = DnsMessage::decode(&resp_bytes)
            .map_err(|e| ResolveError::InvalidResponse(e.to_string()))?;
        message.id = request.dns_message().id;

        self.status.record_success();

        Ok(Response::resolved(message, self.id()))
    }
}

#[async_trait]
impl crate::Resolver for UpstreamResolver {
    async fn resolve(&self, request: &Request) -> Result<Response, ResolveError> {
        UpstreamResolver::resolve(self, request).await
    }

    fn kind(&self) -> &'static str {
        "upstream"
    }

    fn name(&self) -> String {
        self.id()
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn weight(&self) -> u32 {
        self.status.weight()
    }

    fn log_config(&self) {
        tracing::info!(upstream = %self.id(), transport = %self.upstream.transport, "configured upstream resolver");
    }
}

fn randomize_tid(query: &[u8]) -> (bytes::Bytes, u16) {
    let id: u16 = rand::rng().random();
    let mut bytes = bytes::BytesMut::from(query);
    bytes[0] = (id >> 8) as u8;
    bytes[1] = (id & 0xff) as u8;
    (bytes.freeze(), id)
}

fn self_test_query() -> anyhow::Result<bytes::Bytes> {
    let qname = rdns_dns::domain_name::DomainName::from_ascii(SELF_TEST_HOST)?;
    let question = DnsQuestion::new(qname, RecordType::A, ClassType::IN);
    let message = DnsMessageBuilder::new()
        .with_id(rand::rng().random())
        .add_question(question)
        .build();
    message.encode()
}
