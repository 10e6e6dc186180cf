//! DNS-over-TLS transport (RFC 7858): the same length-prefixed framing
//! as plain DNS/TCP, wrapped in a `rustls` client session.
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use bytes::Bytes;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::ServerName;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{timeout, timeout_at, Duration, Instant},
};
use tokio_rustls::{client::TlsStream, TlsConnector};

fn client_config() -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

pub struct TlsConn {
    stream: TlsStream<TcpStream>,
}

impl TlsConn {
    pub async fn connect(
        addr: SocketAddr,
        server_name: &str,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let tcp = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .context("tls tcp connect timeout")??;
        tcp.set_nodelay(true)?;

        let connector = TlsConnector::from(client_config());
        let name = ServerName::try_from(server_name.to_string())
            .context("invalid TLS server name")?;

        let stream = timeout(connect_timeout, connector.connect(name, tcp))
            .await
            .context("tls handshake timeout")??;

        Ok(Self { stream })
    }

    pub async fn send_and_receive(&mut self, query: &[u8], deadline: Instant) -> anyhow::Result<Bytes> {
        if query.len() > u16::MAX as usize {
            anyhow::bail!("query too large for DNS/TLS: {}", query.len());
        }

        let len_prefix = (query.len() as u16).to_be_bytes();
        timeout_at(deadline, self.stream.write_all(&len_prefix))
            .await
            .context("write length timeout")??;
        timeout_at(deadline, self.stream.write_all(query))
            .await
            .context("write body timeout")??;

        let mut resp_len = [0u8; 2];
        timeout_at(deadline, self.stream.read_exact(&mut resp_len))
            .await
            .context("read length timeout")??;
        let n = u16::from_be_bytes(resp_len) as usize;

        let mut buf = vec![0u8; n];
        timeout_at(deadline, self.stream.read_exact(&mut buf))
            .await
            .context("read body timeout")??;

        Ok(Bytes::from(buf))
    }
}
