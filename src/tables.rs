//! ARP and MAC location tables
//!
//! Reducers turn a finished collection batch into the two lookup tables. They run on one
//! task after the batch completes, so the maps are never shared while being built.

use std::{collections::HashMap, net::IpAddr};

use chrono::{DateTime, Utc};
use mac_address::MacAddress;
use tracing::{debug, warn};

use crate::{PortBinding, PortType, collect::DeviceResult, parse_hardware_address};

/// Address to hardware address, as learnt by routers.
pub type ArpTable = HashMap<IpAddr, MacAddress>;

/// Hardware address to every port it was seen on, in switch iteration order.
pub type MacLocationTable = HashMap<MacAddress, Vec<PortBinding>>;

/// Everything one collection cycle produced.
#[derive(Debug, Clone, Default)]
pub struct NetworkSnapshot {
    pub arp: ArpTable,
    pub mac_locations: MacLocationTable,
    /// One line per device that failed during the cycle
    pub errors: Vec<String>,
    /// `None` until the first cycle completes
    pub collected_at: Option<DateTime<Utc>>,
}

impl NetworkSnapshot {
    pub fn mac_for(&self, address: &IpAddr) -> Option<MacAddress> {
        self.arp.get(address).copied()
    }

    pub fn bindings_for(&self, mac: &MacAddress) -> &[PortBinding] {
        self.mac_locations
            .get(mac)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Merge the first parsed output of every successful router into `table`.
///
/// Returns the number of entries written.
pub fn merge_arp(table: &mut ArpTable, results: &[DeviceResult]) -> usize {
    let mut written = 0;
    for result in results {
        let Some(rows) = result
            .outputs()
            .and_then(|outputs| outputs.first())
            .and_then(|output| output.rows())
        else {
            continue;
        };

        for row in rows {
            let (Some(address), Some(mac)) = (row.get("address"), row.get("mac")) else {
                continue;
            };
            let Ok(address) = address.trim().parse::<IpAddr>() else {
                warn!(
                    "Skipping ARP row from {} with bad address '{}'",
                    result.device.address, address
                );
                continue;
            };
            let Some(mac) = parse_hardware_address(mac) else {
                // "Incomplete" entries land here
                debug!(
                    "Skipping ARP row for {} from {} without a hardware address",
                    address, result.device.address
                );
                continue;
            };
            table.insert(address, mac);
            written += 1;
        }
    }
    written
}

/// Append one binding per MAC table row of every successful switch to `table`.
///
/// Ports are classified from the interface status output when the switch sent one.
/// Returns the number of bindings appended.
pub fn merge_mac_locations(table: &mut MacLocationTable, results: &[DeviceResult]) -> usize {
    let mut appended = 0;
    for result in results {
        let Some(outputs) = result.outputs() else {
            continue;
        };
        let Some(mac_rows) = outputs.first().and_then(|output| output.rows()) else {
            continue;
        };

        let port_types: HashMap<&str, PortType> = outputs
            .get(1)
            .and_then(|output| output.rows())
            .unwrap_or_default()
            .iter()
            .filter_map(|row| {
                let port = row.get("port")?;
                let vlan = row.get("vlan").unwrap_or_default();
                Some((port, PortType::from_status_vlan(vlan)))
            })
            .collect();

        for row in mac_rows {
            let (Some(mac), Some(port)) =
                (row.get("destination_address"), row.get("destination_port"))
            else {
                continue;
            };
            let Some(mac) = parse_hardware_address(mac) else {
                warn!(
                    "Skipping MAC table row from {} with bad address '{}'",
                    result.device.address, mac
                );
                continue;
            };
            let port_type = port_types
                .get(port)
                .copied()
                .unwrap_or(PortType::Access);
            table
                .entry(mac)
                .or_default()
                .push(PortBinding::new(result.device.address, port, port_type));
            appended += 1;
        }
        debug!(
            "Switch {} classified {} port(s)",
            result.device.address,
            port_types.len()
        );
    }
    appended
}
