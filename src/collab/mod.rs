//! Coordinator-free partitioning of entities across worker nodes.
//!
//! Every node learns the live members through gossip, builds a consistent
//! hash ring with one bucket per member and keeps the entities the ring
//! assigns to itself. Nodes never talk about ownership directly: they agree
//! because they hash the same membership the same way.
//!
//! Membership is only eventually consistent, so while nodes join or leave an
//! entity can briefly be owned by two nodes or by none.

pub mod gossip;
pub mod membership;
pub mod network;
pub mod ring;

use anyhow::{Result, bail};

pub use membership::{Member, Membership, MembershipEvent, Rendezvous, SeedSource};
pub use ring::ConsistentHash;

/// The node identity used as bucket name: the override when given,
/// otherwise the host name.
pub fn node_name(name_override: &str) -> Result<String> {
    let name_override = name_override.trim();
    if !name_override.is_empty() {
        return Ok(name_override.to_string());
    }

    let hostname = hostname::get()?.to_string_lossy().into_owned();
    if hostname.is_empty() {
        bail!("host name is empty, set NODE_NAME");
    }

    Ok(hostname)
}
