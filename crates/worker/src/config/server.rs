//! Status Listener Config

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Args;

/// Where the worker serves `/healthcheck` and `/metrics`.
#[derive(Debug, Args)]
pub struct StatusListenerConfig {
    #[arg(
        long,
        env = "WORKER_STATUS_HOST",
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    )]
    pub status_host: IpAddr,

    #[arg(long, env = "WORKER_STATUS_PORT", default_value_t = 8699)]
    pub status_port: u16,
}

impl StatusListenerConfig {
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.status_host, self.status_port)
    }
}
