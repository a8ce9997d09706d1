use std::{fs, net::IpAddr, path::Path};

use serde::{Deserialize, Serialize};

use crate::PortTrackError;

/// Default command-channel pool size for the interface command phase.
pub const DEFAULT_COMMAND_POOL_SIZE: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceBrand {
    #[default]
    Cisco,
    Unknown,
    Other(String),
}

impl std::fmt::Display for DeviceBrand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceBrand::Cisco => write!(f, "Cisco"),
            DeviceBrand::Unknown => write!(f, "Unknown"),
            DeviceBrand::Other(name) => write!(f, "{name}"),
        }
    }
}

/// The single identity used to log in to every device.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
    pub key_path: Option<String>,
    pub key_passphrase: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// What happens to the previous cycle's tables when a new collection cycle runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RefreshMode {
    /// Build every cycle's tables from scratch, dropping bindings nobody reports any more.
    #[default]
    Replace,
    /// Merge-update ARP entries and append MAC bindings onto the previous cycle's tables.
    Merge,
}

/// Which table a collection group feeds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GroupRole {
    /// First command output is an ARP table.
    Arp,
    /// First output is the MAC address table, second the interface status table.
    MacLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionGroup {
    /// Inventory group name (or a single device address)
    pub group: String,
    pub role: GroupRole,
    /// Maximum number of devices in this group polled at once
    pub pool_size: usize,
    pub commands: Vec<String>,
}

impl CollectionGroup {
    pub fn routers() -> Self {
        Self {
            group: "router".to_string(),
            role: GroupRole::Arp,
            pool_size: 5,
            commands: vec!["show ip arp".to_string()],
        }
    }

    pub fn switches() -> Self {
        Self {
            group: "switch".to_string(),
            role: GroupRole::MacLocation,
            pool_size: 10,
            commands: vec![
                "show mac address-table".to_string(),
                "show interfaces status".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryDevice {
    pub address: IpAddr,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub brand: DeviceBrand,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub ssh_port: u16,
    pub ssh_timeout_seconds: u64,
    pub refresh_mode: RefreshMode,
    pub collection: Vec<CollectionGroup>,
    pub command_pool_size: usize,
    pub devices: Vec<InventoryDevice>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials {
                username: "admin".to_string(),
                ..Default::default()
            },
            ssh_port: 22,
            ssh_timeout_seconds: 30,
            refresh_mode: RefreshMode::default(),
            collection: vec![CollectionGroup::routers(), CollectionGroup::switches()],
            command_pool_size: DEFAULT_COMMAND_POOL_SIZE,
            devices: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PortTrackError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PortTrackError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PortTrackError> {
        if self.collection.is_empty() {
            return Err(PortTrackError::Config(
                "No collection groups configured".to_string(),
            ));
        }
        for group in &self.collection {
            if group.pool_size == 0 {
                return Err(PortTrackError::Config(format!(
                    "Collection group '{}' has a pool size of zero",
                    group.group
                )));
            }
            if group.commands.is_empty() {
                return Err(PortTrackError::Config(format!(
                    "Collection group '{}' has no commands",
                    group.group
                )));
            }
        }
        if self.command_pool_size == 0 {
            return Err(PortTrackError::Config(
                "command_pool_size must be at least 1".to_string(),
            ));
        }
        if self.credentials.username.is_empty() {
            return Err(PortTrackError::Config(
                "credentials.username must be set".to_string(),
            ));
        }
        Ok(())
    }
}
