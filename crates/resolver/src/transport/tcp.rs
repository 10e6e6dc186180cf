//! Length-prefixed DNS/TCP framing with a reusable connection pool per
//! upstream, grounded on the plain-TCP transport's pooling shape: a
//! bounded semaphore caps total connections, a lock-free idle queue
//! holds warm ones, and a background reaper drops ones past their TTL.
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::Context;
use bytes::{Bytes, BytesMut};
use crossbeam_queue::SegQueue;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{timeout, timeout_at, Duration, Instant},
};

const MAX_RECEIVE_BUFFER_SIZE: usize = 65_536;

#[derive(Clone, Copy, Debug)]
pub struct TcpLimits {
    pub max_connections: usize,
    pub max_idle: usize,
    pub connect_timeout: Duration,
    pub idle_ttl: Duration,
}

impl Default for TcpLimits {
    fn default() -> Self {
        Self {
            max_connections: 16,
            max_idle: 4,
            connect_timeout: Duration::from_secs(3),
            idle_ttl: Duration::from_secs(30),
        }
    }
}

pub struct TcpPool {
    addr: SocketAddr,
    limits: TcpLimits,
    idle: SegQueue<TcpConn>,
    idle_count: AtomicUsize,
    connections: Arc<Semaphore>,
}

impl TcpPool {
    pub fn new(addr: SocketAddr, limits: TcpLimits) -> Arc<Self> {
        Arc::new(Self {
            addr,
            limits,
            idle: SegQueue::new(),
            idle_count: AtomicUsize::new(0),
            connections: Arc::new(Semaphore::new(limits.max_connections)),
        })
    }

    pub fn start_reaper(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.limits.idle_ttl);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                for _ in 0..this.idle_count.load(Ordering::Relaxed) {
                    match this.idle.pop() {
                        Some(conn) if conn.expires_at > now => this.idle.push(conn),
                        Some(_) => {
                            this.idle_count.fetch_sub(1, Ordering::Relaxed);
                        }
                        None => break,
                    }
                }
            }
        });
    }

    fn try_get(&self) -> Option<TcpConn> {
        let conn = self.idle.pop()?;
        self.idle_count.fetch_sub(1, Ordering::Relaxed);
        Some(conn)
    }

    pub fn put_back(&self, conn: TcpConn, healthy: bool) {
        if healthy && self.idle_count.load(Ordering::Relaxed) < self.limits.max_idle {
            self.idle.push(conn);
            self.idle_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn get_or_connect(&self, deadline: Instant) -> anyhow::Result<TcpConn> {
        if let Some(conn) = self.try_get() {
            return Ok(conn);
        }

        let connections = self.connections.clone();
        let permit = timeout(
            deadline.saturating_duration_since(Instant::now()),
            connections.acquire_owned(),
        )
        .await
        .context("tcp pool exhausted")??;

        let connect_timeout = self
            .limits
            .connect_timeout
            .min(deadline.saturating_duration_since(Instant::now()));
        TcpConn::connect(self.addr, connect_timeout, permit, Instant::now() + self.limits.idle_ttl)
            .await
    }
}

pub struct TcpConn {
    stream: TcpStream,
    _permit: OwnedSemaphorePermit,
    expires_at: Instant,
    buffer: BytesMut,
}

impl TcpConn {
    async fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        permit: OwnedSemaphorePermit,
        expires_at: Instant,
    ) -> anyhow::Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .context("tcp connect timeout")??;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            _permit: permit,
            expires_at,
            buffer: BytesMut::with_capacity(MAX_RECEIVE_BUFFER_SIZE),
        })
    }

    pub async fn send_and_receive(&mut self, query: &[u8], deadline: Instant) -> anyhow::Result<Bytes> {
        if query.len() > u16::MAX as usize {
            anyhow::bail!("query too large for DNS/TCP: {}", query.len());
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

        self.buffer.resize(n, 0);
        timeout_at(deadline, self.stream.read_exact(&mut self.buffer[..]))
            .await
            .context("read body timeout")??;

        Ok(self.buffer.split().freeze())
    }
}
