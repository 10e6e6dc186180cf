//! DNS-over-HTTPS transport (RFC 8484). `reqwest`'s DNS resolution is
//! pinned to the one IP the caller already resolved via `rdns_resolver`'s
//! own address resolution (Bootstrap or a literal IP) so the HTTP client
//! never performs its own, independent name lookup.
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use bytes::Bytes;
use reqwest::{
    dns::{Addrs, Name, Resolve, Resolving},
    Client,
};

/// Always resolves to a single, fixed address --- the pinned IP for one
/// upstream's hostname --- regardless of what name is asked for.
#[derive(Clone)]
struct PinnedResolve {
    addr: SocketAddr,
}

impl Resolve for PinnedResolve {
    fn resolve(&self, _name: Name) -> Resolving {
        let addr = self.addr;
        Box::pin(async move {
            let addrs: Addrs = Box::new(std::iter::once(addr));
            Ok(addrs)
        })
    }
}

pub struct HttpsConn {
    client: Client,
    url: String,
}

impl HttpsConn {
    pub fn new(ip: IpAddr, port: u16, host: &str, path: &str) -> anyhow::Result<Self> {
        let resolve = Arc::new(PinnedResolve {
            addr: SocketAddr::new(ip, port),
        });
        let client = Client::builder()
            .dns_resolver(resolve)
            .build()
            .context("building DoH client")?;
        let url = format!("https://{host}:{port}{path}");
        Ok(Self { client, url })
    }

    pub async fn send_and_receive(&self, query: &[u8], deadline: tokio::time::Instant) -> anyhow::Result<Bytes> {
        let timeout = deadline.saturating_duration_since(tokio::time::Instant::now());
        let resp = self
            .client
            .post(&self.url)
            .header("content-type", "application/dns-message")
            .header("accept", "application/dns-message")
            .timeout(timeout)
            .body(query.to_vec())
            .send()
            .await
            .context("DoH request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("DoH server returned status {}", resp.status());
        }
        resp.bytes().await.context("reading DoH response body")
    }
}
