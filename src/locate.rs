//! Resolving addresses to switch ports

use std::{collections::HashSet, net::IpAddr};

use tracing::debug;

use crate::{HostRecord, PortTrackError, PortTypeFilter, tables::NetworkSnapshot};

/// Parse every address up front so a bad one fails the request before any lookup.
pub fn validate_addresses<S: AsRef<str>>(addresses: &[S]) -> Result<Vec<IpAddr>, PortTrackError> {
    addresses
        .iter()
        .map(|address| {
            let address = address.as_ref().trim();
            address
                .parse::<IpAddr>()
                .map_err(|_| PortTrackError::InvalidAddress(address.to_string()))
        })
        .collect()
}

/// Look up where each address is attached.
///
/// One [HostRecord] per distinct address, in first-occurrence order. Addresses that do not
/// resolve, or whose bindings are all filtered out, get a single sentinel interface.
pub fn resolve<S: AsRef<str>>(
    snapshot: &NetworkSnapshot,
    addresses: &[S],
    filter: PortTypeFilter,
) -> Result<Vec<HostRecord>, PortTrackError> {
    let addresses = validate_addresses(addresses)?;
    Ok(resolve_parsed(snapshot, &addresses, filter))
}

pub(crate) fn resolve_parsed(
    snapshot: &NetworkSnapshot,
    addresses: &[IpAddr],
    filter: PortTypeFilter,
) -> Vec<HostRecord> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .iter()
        .filter(|address| seen.insert(**address))
        .map(|&address| {
            let mac = snapshot.mac_for(&address);
            let bindings = mac
                .map(|mac| {
                    snapshot
                        .bindings_for(&mac)
                        .iter()
                        .filter(|binding| filter.allows(binding.port_type))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            let record = HostRecord::new(address, mac, bindings);
            debug!(
                "{} resolved to {:?} with {} {} binding(s)",
                address,
                mac.map(|mac| mac.to_string()),
                record.interfaces.iter().filter(|i| !i.is_sentinel()).count(),
                filter
            );
            record
        })
        .collect()
}
