use get_if_addrs::{IfAddr, get_if_addrs};
use std::net::{IpAddr, SocketAddr};

/// Checks if an IP address is acceptable (IPv6 ULA or IPv4 private).
fn is_acceptable_address(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V6(ipv6) => ipv6.is_unique_local(),
        IpAddr::V4(ipv4) => ipv4.is_private(),
    }
}

/// Gets the first private network address with the given port, to be
/// advertised to gossip peers (prioritizing IPv6 ULA over IPv4 private).
///
/// Returns `None` if no private addresses are found or if retrieving interfaces fails.
pub fn get_first_network_address(port: u16) -> Option<SocketAddr> {
    let mut if_addrs = get_if_addrs().ok()?;

    if_addrs.sort_by_key(|interface| match interface.addr {
        IfAddr::V6(_) => 0,
        IfAddr::V4(_) => 1,
    });

    if_addrs
        .into_iter()
        .map(|interface| match interface.addr {
            IfAddr::V6(addr) => IpAddr::V6(addr.ip),
            IfAddr::V4(addr) => IpAddr::V4(addr.ip),
        })
        .find(is_acceptable_address)
        .map(|ip_addr| SocketAddr::new(ip_addr, port))
}
