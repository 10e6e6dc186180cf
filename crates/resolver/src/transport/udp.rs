//! DNS/UDP transport: one bound-and-connected socket per upstream,
//! guarded by a single-permit semaphore so only one query is in flight
//! on it at a time, with a receive loop that discards stale or foreign
//! replies by checking transaction ID and the QR bit.
use std::net::SocketAddr;

use anyhow::Context;
use bytes::Bytes;
use rdns_dns::helpers::extract_transaction_id;
use tokio::{
    net::UdpSocket,
    sync::Semaphore,
    time::{timeout_at, Instant},
};

const MAX_RECEIVE_BUFFER_SIZE: usize = 65_536;

pub struct UdpConn {
    socket: UdpSocket,
    guard: Semaphore,
}

impl UdpConn {
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = if addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;
        Ok(Self {
            socket,
            guard: Semaphore::new(1),
        })
    }

    pub async fn send_and_receive(&self, query: &[u8], deadline: Instant) -> anyhow::Result<Bytes> {
        if query.len() > u16::MAX as usize {
            anyhow::bail!("query too large for DNS/UDP: {}", query.len());
        }
        let want_id = extract_transaction_id(query).context("query missing transaction id")?;

        let _permit = self.guard.acquire().await?;

        timeout_at(deadline, self.socket.send(query))
            .await
            .context("send timeout")??;

        let mut buf = vec![0u8; MAX_RECEIVE_BUFFER_SIZE];
        loop {
            let n = timeout_at(deadline, self.socket.recv(&mut buf))
                .await
                .context("recv timeout")??;

            if n < 12 {
                continue;
            }
            let got_id = u16::from_be_bytes([buf[0], buf[1]]);
            let is_response = (buf[2] & 0x80) != 0;
            if is_response && got_id == want_id {
                buf.truncate(n);
                return Ok(Bytes::from(buf));
            }
            // stale or foreign packet; keep waiting until the deadline
        }
    }
}
