use std::{
    net::IpAddr,
    sync::atomic::{AtomicUsize, Ordering},
};

/// A non-empty, round-robin rotated set of IPs backing one upstream.
/// Rotation is lock-free; a lost update under a race is harmless, the
/// next call just rotates one extra step.
#[derive(Debug)]
pub struct IPSet {
    ips: Vec<IpAddr>,
    index: AtomicUsize,
}

impl IPSet {
    pub fn new(ips: Vec<IpAddr>) -> Option<Self> {
        if ips.is_empty() {
            return None;
        }
        Some(Self {
            ips,
            index: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The IP currently at the front of rotation, without advancing it.
    pub fn current(&self) -> IpAddr {
        let i = self.index.load(Ordering::Relaxed) % self.ips.len();
        self.ips[i]
    }

    /// Advances the rotation and returns the IP that was current before
    /// the advance.
    pub fn next(&self) -> IpAddr {
        let len = self.ips.len();
        let prev = self
            .index
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| {
                Some((i + 1) % len)
            })
            .unwrap_or(0);
        self.ips[prev % len]
    }

    pub fn all(&self) -> &[IpAddr] {
        &self.ips
    }
}
