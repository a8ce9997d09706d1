//! Enumerating the hosts of a CIDR block

use std::{
    collections::HashSet,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use cidr::IpCidr;
use tracing::debug;

use crate::{PortTrackError, locate::validate_addresses};

/// Largest block [expand] will enumerate.
pub const MAX_SUBNET_ADDRESSES: u128 = 65536;

/// Usable host addresses of `cidr`, minus `excluded`.
///
/// IPv4 drops the network and broadcast addresses and IPv6 the subnet-router anycast
/// address, except on point-to-point (/31, /127) and single-host blocks.
pub fn expand<S: AsRef<str>>(cidr: &str, excluded: &[S]) -> Result<Vec<IpAddr>, PortTrackError> {
    let network = IpCidr::from_str(cidr.trim())?;
    let excluded: HashSet<IpAddr> = validate_addresses(excluded)?.into_iter().collect();

    let (bits, first) = match network.first_address() {
        IpAddr::V4(address) => (32u32, u128::from(u32::from(address))),
        IpAddr::V6(address) => (128u32, u128::from(address)),
    };
    let host_bits = bits - u32::from(network.network_length());
    if host_bits > 16 {
        return Err(PortTrackError::InvalidSubnet(format!(
            "{network} holds more than {MAX_SUBNET_ADDRESSES} addresses"
        )));
    }
    let size = 1u128 << host_bits;

    let (start, end) = match (network.is_ipv4(), host_bits) {
        (_, 0 | 1) => (first, first + size),
        (true, _) => (first + 1, first + size - 1),
        (false, _) => (first + 1, first + size),
    };

    let hosts: Vec<IpAddr> = (start..end)
        .map(|value| to_address(network.is_ipv4(), value))
        .filter(|address| !excluded.contains(address))
        .collect();
    debug!(
        "{} expanded to {} host(s) after {} exclusion(s)",
        network,
        hosts.len(),
        excluded.len()
    );
    Ok(hosts)
}

fn to_address(ipv4: bool, value: u128) -> IpAddr {
    if ipv4 {
        // host_bits <= 16 keeps every value inside the block's u32 range
        IpAddr::V4(Ipv4Addr::from(value as u32))
    } else {
        IpAddr::V6(Ipv6Addr::from(value))
    }
}
