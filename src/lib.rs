#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

use std::{
    fmt::Display,
    net::{AddrParseError, IpAddr},
};

use cidr::errors::NetworkParseError;
use mac_address::MacAddress;
use serde::{Deserialize, Serialize};

use crate::ssh::SshError;

pub mod brand;
pub mod channel;
pub mod cli;
pub mod collect;
pub mod config;
pub mod export;
pub mod interface_commands;
pub mod inventory;
pub mod locate;
pub mod ssh;
pub mod subnet;
pub mod tables;
pub mod tracker;

/// How a switch port carries traffic, as reported by the interface status table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Access,
    Trunk,
}

impl PortType {
    /// Classify a port from the VLAN column of `show interfaces status`.
    pub fn from_status_vlan(vlan: &str) -> Self {
        if vlan.trim().eq_ignore_ascii_case("trunk") {
            PortType::Trunk
        } else {
            PortType::Access
        }
    }
}

impl Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::Access => write!(f, "access"),
            PortType::Trunk => write!(f, "trunk"),
        }
    }
}

/// Which bindings a lookup keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PortTypeFilter {
    #[default]
    Access,
    Trunk,
    All,
}

impl PortTypeFilter {
    pub fn allows(self, port_type: PortType) -> bool {
        match self {
            PortTypeFilter::All => true,
            PortTypeFilter::Access => port_type == PortType::Access,
            PortTypeFilter::Trunk => port_type == PortType::Trunk,
        }
    }
}

impl Display for PortTypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortTypeFilter::Access => write!(f, "access"),
            PortTypeFilter::Trunk => write!(f, "trunk"),
            PortTypeFilter::All => write!(f, "all"),
        }
    }
}

/// A hardware address learnt on one port of one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub switch: IpAddr,
    pub port: String,
    pub port_type: PortType,
}

impl PortBinding {
    pub fn new(switch: IpAddr, port: impl Into<String>, port_type: PortType) -> Self {
        Self {
            switch,
            port: port.into(),
            port_type,
        }
    }
}

/// One interface row of a [HostRecord]. `binding` is `None` for the placeholder entry
/// used when nothing resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceEntry {
    pub binding: Option<PortBinding>,
    pub command_output: Option<String>,
}

impl InterfaceEntry {
    pub fn sentinel() -> Self {
        Self::default()
    }

    pub fn is_sentinel(&self) -> bool {
        self.binding.is_none()
    }
}

impl From<PortBinding> for InterfaceEntry {
    fn from(binding: PortBinding) -> Self {
        Self {
            binding: Some(binding),
            command_output: None,
        }
    }
}

/// Where a tracked address was found. Always holds at least one interface entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub address: IpAddr,
    pub hardware_address: Option<MacAddress>,
    pub interfaces: Vec<InterfaceEntry>,
}

impl HostRecord {
    pub fn new(
        address: IpAddr,
        hardware_address: Option<MacAddress>,
        bindings: Vec<PortBinding>,
    ) -> Self {
        let interfaces = if bindings.is_empty() {
            vec![InterfaceEntry::sentinel()]
        } else {
            bindings.into_iter().map(InterfaceEntry::from).collect()
        };
        Self {
            address,
            hardware_address,
            interfaces,
        }
    }

    /// True when at least one real port binding was found.
    pub fn is_located(&self) -> bool {
        self.interfaces.iter().any(|iface| !iface.is_sentinel())
    }
}

/// Normalise a hardware address in Cisco dotted (`aabb.cc00.0100`), colon or dash form.
pub fn parse_hardware_address(value: &str) -> Option<MacAddress> {
    let hex: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '.' | ':' | '-'))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let mut bytes = [0u8; 6];
    for (index, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16).ok()?;
    }
    Some(MacAddress::new(bytes))
}

#[derive(Debug)]
pub enum PortTrackError {
    Config(String),
    DeviceUnreachable { device: IpAddr, message: String },
    ExportEmpty,
    Generic(String),
    HostGroupNotFound(String),
    InvalidAddress(String),
    InvalidSubnet(String),
    Io(std::io::Error),
    Parse(String),
    Regex(regex::Error),
    Serde(String),
    Ssh(SshError),
}

impl PartialEq for PortTrackError {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl From<AddrParseError> for PortTrackError {
    fn from(err: AddrParseError) -> Self {
        PortTrackError::Parse(err.to_string())
    }
}

impl From<SshError> for PortTrackError {
    fn from(err: SshError) -> Self {
        PortTrackError::Ssh(err)
    }
}

impl From<std::io::Error> for PortTrackError {
    fn from(err: std::io::Error) -> Self {
        PortTrackError::Io(err)
    }
}

impl From<serde_json::Error> for PortTrackError {
    fn from(err: serde_json::Error) -> Self {
        PortTrackError::Serde(err.to_string())
    }
}

impl From<regex::Error> for PortTrackError {
    fn from(err: regex::Error) -> Self {
        PortTrackError::Regex(err)
    }
}

impl From<NetworkParseError> for PortTrackError {
    fn from(err: NetworkParseError) -> Self {
        PortTrackError::InvalidSubnet(err.to_string())
    }
}

impl std::fmt::Display for PortTrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortTrackError::Config(error) => write!(f, "Config error: {error}"),
            PortTrackError::DeviceUnreachable { device, message } => {
                write!(f, "Device {device} unreachable: {message}")
            }
            PortTrackError::ExportEmpty => write!(f, "Nothing to export, no rows were produced"),
            PortTrackError::Generic(error) => write!(f, "Generic error: {error}"),
            PortTrackError::HostGroupNotFound(error) => write!(f, "Host not found: {error}"),
            PortTrackError::InvalidAddress(error) => write!(f, "Invalid IP address: {error}"),
            PortTrackError::InvalidSubnet(error) => write!(f, "Invalid subnet: {error}"),
            PortTrackError::Io(error) => write!(f, "IO error: {error}"),
            PortTrackError::Parse(error) => write!(f, "Parse error: {error}"),
            PortTrackError::Regex(error) => write!(f, "Regex error: {error}"),
            PortTrackError::Serde(error) => write!(f, "Serde error: {error}"),
            PortTrackError::Ssh(error) => write!(f, "SSH error: {error}"),
        }
    }
}

impl std::error::Error for PortTrackError {}
