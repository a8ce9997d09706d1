//! Device inventory lookups
//!
//! The collection engine only ever asks the inventory one question: which devices belong
//! to this group, or which device has this address. [DeviceDirectory] is that seam, and
//! [Inventory] answers it from the device list in the configuration file.

use std::net::IpAddr;

use tracing::debug;

use crate::{
    PortTrackError,
    config::{AppConfig, Credentials, DeviceBrand, InventoryDevice},
};

/// A device the engine can talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub address: IpAddr,
    pub brand: DeviceBrand,
    pub credentials: Credentials,
}

pub trait DeviceDirectory: Send + Sync + 'static {
    /// Resolve a group name, or a single device address, to device records.
    ///
    /// An unknown group yields an empty list; an unknown address is
    /// [PortTrackError::HostGroupNotFound].
    fn resolve(&self, group_or_address: &str) -> Result<Vec<DeviceRecord>, PortTrackError>;
}

#[derive(Debug, Clone)]
pub struct Inventory {
    devices: Vec<InventoryDevice>,
    credentials: Credentials,
}

impl Inventory {
    pub fn new(devices: Vec<InventoryDevice>, credentials: Credentials) -> Self {
        Self {
            devices,
            credentials,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.devices.clone(), config.credentials.clone())
    }

    fn record(&self, device: &InventoryDevice) -> DeviceRecord {
        DeviceRecord {
            address: device.address,
            brand: device.brand.clone(),
            credentials: self.credentials.clone(),
        }
    }
}

impl DeviceDirectory for Inventory {
    fn resolve(&self, group_or_address: &str) -> Result<Vec<DeviceRecord>, PortTrackError> {
        let key = group_or_address.trim();
        if let Ok(address) = key.parse::<IpAddr>() {
            return self
                .devices
                .iter()
                .find(|device| device.address == address)
                .map(|device| vec![self.record(device)])
                .ok_or_else(|| PortTrackError::HostGroupNotFound(key.to_string()));
        }

        let records: Vec<DeviceRecord> = self
            .devices
            .iter()
            .filter(|device| device.groups.iter().any(|group| group == key))
            .map(|device| self.record(device))
            .collect();
        debug!("Group '{}' resolved to {} device(s)", key, records.len());
        Ok(records)
    }
}
