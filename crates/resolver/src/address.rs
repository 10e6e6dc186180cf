use std::net::IpAddr;

use async_trait::async_trait;

/// How an [`crate::resolver::UpstreamResolver`] turns its upstream's
/// configured host into an IP it can dial. A literal-IP upstream never
/// needs to ask anyone; a hostname-based one asks [`crate::bootstrap::Bootstrap`].
#[async_trait]
pub trait AddressSource: Send + Sync {
    async fn resolve(&self, host: &str) -> anyhow::Result<IpAddr>;
}

pub struct LiteralAddress(pub IpAddr);

#[async_trait]
impl AddressSource for LiteralAddress {
    async fn resolve(&self, _host: &str) -> anyhow::Result<IpAddr> {
        Ok(self.0)
    }
}
