use super::prelude::*;

/// Cisco IOS / IOS-XE output parsers.
///
/// Row keys follow the column names the collection builders read:
/// - `show ip arp`: `protocol`, `address`, `age`, `mac`, `type`, `interface`
/// - `show mac address-table`: `vlan`, `destination_address`, `type`, `destination_port`
/// - `show interfaces status`: `port`, `name`, `status`, `vlan`, `duplex`, `speed`, `type`
#[derive(Debug, Clone, Copy, Default)]
pub struct Cisco;

const CISCO_MAC: &str = r"^[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}$";

const ARP_LINE: &str = r"^(?P<protocol>\S+)\s+(?P<address>\S+)\s+(?P<age>\S+)\s+(?P<mac>[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}\.[0-9a-fA-F]{4})\s+(?P<type>\S+)(?:\s+(?P<interface>\S+))?\s*$";

/// Everything from the `Status` column onwards.
const INTERFACE_STATUS_TAIL: &str = r"^(?P<status>\S+)\s+(?P<vlan>\S+)\s+(?P<duplex>\S+)\s+(?P<speed>\S+)(?:\s+(?P<type>.*?))?\s*$";

/// Where the `Name` and `Status` columns start, read off the header line.
///
/// The description is free text and may hold status words of its own, so it is cut out by
/// position rather than matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StatusColumns {
    name: usize,
    status: usize,
}

impl StatusColumns {
    fn from_header(line: &str) -> Option<Self> {
        if !line.trim_start().starts_with("Port") || !line.contains("Vlan") {
            return None;
        }
        let name = line.find("Name")?;
        let status = line.find("Status")?;
        (name < status).then_some(Self { name, status })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CiscoCommand {
    IpArp,
    MacAddressTable,
    InterfaceStatus,
}

/// `token` is an accepted IOS abbreviation of `keyword`.
fn abbreviates(token: &str, keyword: &str, min_len: usize) -> bool {
    token.len() >= min_len && keyword.starts_with(token)
}

impl CiscoCommand {
    pub(crate) fn identify(command: &str) -> Option<Self> {
        let lowered = command.to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();
        let (first, rest) = tokens.split_first()?;
        if !abbreviates(first, "show", 2) {
            return None;
        }

        match rest {
            [ip, arp, ..] if *ip == "ip" && abbreviates(arp, "arp", 2) => Some(Self::IpArp),
            [arp, ..] if abbreviates(arp, "arp", 3) => Some(Self::IpArp),
            [mac, table, ..] if *mac == "mac" && abbreviates(table, "address-table", 3) => {
                Some(Self::MacAddressTable)
            }
            [table, ..] if abbreviates(table, "mac-address-table", 5) => {
                Some(Self::MacAddressTable)
            }
            [interfaces, status, ..]
                if abbreviates(interfaces, "interfaces", 2) && abbreviates(status, "status", 2) =>
            {
                Some(Self::InterfaceStatus)
            }
            _ => None,
        }
    }
}

fn captures_to_row(regex: &Regex, captures: &regex::Captures<'_>) -> Row {
    regex
        .capture_names()
        .flatten()
        .map(|name| {
            let value = captures
                .name(name)
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

impl OutputParser for Cisco {
    fn parse_arp_table(&self, input_data: &str) -> Result<Vec<Row>, PortTrackError> {
        let arp_line = Regex::new(ARP_LINE)?;
        let mut rows = Vec::new();

        for line in input_data.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match arp_line.captures(line) {
                Some(captures) => rows.push(captures_to_row(&arp_line, &captures)),
                None => trace!("Skipping ARP line: {line}"),
            }
        }

        debug!("Parsed {} ARP entries", rows.len());
        Ok(rows)
    }

    fn parse_mac_address_table(&self, input_data: &str) -> Result<Vec<Row>, PortTrackError> {
        let mac_finder = Regex::new(CISCO_MAC)?;
        let mut rows = Vec::new();

        for line in input_data.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(mac_index) = tokens.iter().position(|token| mac_finder.is_match(token))
            else {
                continue;
            };

            // The destination port is always the last column
            let port = match tokens.last() {
                Some(port) if tokens.len() - 1 > mac_index => *port,
                _ => {
                    trace!("No port on MAC table line: {line}");
                    continue;
                }
            };
            // CPU, Router, Drop and friends are not switch ports
            if !port.chars().any(|c| c.is_ascii_digit()) {
                trace!("Skipping non-interface destination {port}");
                continue;
            }

            let vlan = tokens[..mac_index]
                .iter()
                .rev()
                .find(|token| token.chars().all(|c| c.is_ascii_digit()) || **token == "All")
                .copied()
                .unwrap_or_default();
            let entry_type = tokens
                .get(mac_index + 1)
                .filter(|token| token.chars().all(|c| c.is_ascii_alphabetic()))
                .copied()
                .unwrap_or_default();

            rows.push(
                Row::new()
                    .with("vlan", vlan)
                    .with("destination_address", tokens[mac_index])
                    .with("type", entry_type)
                    .with("destination_port", port),
            );
        }

        debug!("Parsed {} MAC address table entries", rows.len());
        Ok(rows)
    }

    fn parse_interface_status(&self, input_data: &str) -> Result<Vec<Row>, PortTrackError> {
        let tail_line = Regex::new(INTERFACE_STATUS_TAIL)?;
        let mut columns: Option<StatusColumns> = None;
        let mut rows = Vec::new();

        for line in input_data.lines() {
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            let Some(header) = columns else {
                columns = StatusColumns::from_header(line);
                if columns.is_none() {
                    trace!("Skipping line before interface status header: {line}");
                }
                continue;
            };

            let Some(port) = line.split_whitespace().next() else {
                continue;
            };
            if !port.chars().any(|c| c.is_ascii_digit()) {
                continue;
            }
            let port_end = line.len() - line.trim_start().len() + port.len();

            let (Some(name), Some(tail)) = (
                line.get(port_end.max(header.name)..header.status),
                line.get(header.status..),
            ) else {
                trace!("Interface status line does not fit the header columns: {line}");
                continue;
            };
            let Some(captures) = tail_line.captures(tail.trim_start()) else {
                trace!("Skipping interface status line: {line}");
                continue;
            };

            let mut row = captures_to_row(&tail_line, &captures);
            row.insert("port", port);
            row.insert("name", name.trim());
            rows.push(row);
        }

        if columns.is_none() && !input_data.trim().is_empty() {
            warn!("No header found in interface status output, no ports classified");
        }
        debug!("Parsed {} interface status entries", rows.len());
        Ok(rows)
    }

    fn parse_command(
        &self,
        command: &str,
        input_data: &str,
    ) -> Result<CommandOutput, PortTrackError> {
        let rows = match CiscoCommand::identify(command) {
            Some(CiscoCommand::IpArp) => self.parse_arp_table(input_data)?,
            Some(CiscoCommand::MacAddressTable) => self.parse_mac_address_table(input_data)?,
            Some(CiscoCommand::InterfaceStatus) => self.parse_interface_status(input_data)?,
            None => {
                warn!("No Cisco parser for '{command}', returning raw output");
                return Ok(CommandOutput::Text(input_data.to_string()));
            }
        };
        Ok(CommandOutput::Rows(rows))
    }
}
