use anyhow::{Result, bail};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// A live node as seen by the local membership view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub address: SocketAddr,
}

/// Membership notifications. Only ever logged, ownership never depends on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    Joined(Member),
    Left(Member),
    Updated(Member),
}

/// The eventually-consistent view of the cluster a worker consumes.
pub trait Membership {
    /// Contacts the seeds, returning how many nodes answered.
    fn join(&self, seeds: &[SocketAddr]) -> impl Future<Output = Result<usize>> + Send;

    /// Currently live members, the local node included.
    fn members(&self) -> Vec<Member>;

    /// Announces a graceful departure to the cluster.
    fn leave(&self, timeout: Duration) -> impl Future<Output = Result<()>> + Send;

    /// Stops the local transport.
    fn shutdown(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Produces the seed addresses a join attempt should contact.
pub trait SeedSource {
    fn resolve(&self) -> impl Future<Output = Result<Vec<SocketAddr>>> + Send;
}

/// Resolves a rendezvous name to seeds: either a literal socket address or a
/// DNS name (with or without port) looked up on every attempt.
#[derive(Debug, Clone)]
pub struct Rendezvous {
    pub name: String,
    pub default_port: u16,
}

impl Rendezvous {
    pub fn new(name: impl Into<String>, default_port: u16) -> Self {
        Self {
            name: name.into(),
            default_port,
        }
    }

    fn host_and_port(&self) -> (&str, u16) {
        match self.name.rsplit_once(':') {
            // a bare IPv6 address has colons but no port
            Some((host, port)) if !host.contains(':') => match port.parse() {
                Ok(port) => (host, port),
                Err(_) => (self.name.as_str(), self.default_port),
            },
            _ => (self.name.as_str(), self.default_port),
        }
    }
}

impl SeedSource for Rendezvous {
    async fn resolve(&self) -> Result<Vec<SocketAddr>> {
        if let Ok(address) = self.name.parse::<SocketAddr>() {
            return Ok(vec![address]);
        }

        if let Ok(ip) = self.name.parse() {
            return Ok(vec![SocketAddr::new(ip, self.default_port)]);
        }

        let (host, port) = self.host_and_port();
        let seeds: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await?
            .unique()
            .collect();

        if seeds.is_empty() {
            bail!("rendezvous '{}' resolved to no addresses", self.name);
        }

        Ok(seeds)
    }
}

/// Sorted member names, the bucket set of a ring.
pub fn member_names(members: &[Member]) -> Vec<String> {
    members
        .iter()
        .map(|member| member.name.clone())
        .sorted()
        .dedup()
        .collect()
}
