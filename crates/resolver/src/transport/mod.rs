pub mod https;
pub mod tcp;
pub mod tls;
pub mod udp;
