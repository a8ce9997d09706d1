pub mod cisco;
pub(crate) mod prelude;

use crate::config::DeviceBrand;
use prelude::*;

/// Turns the raw text a platform prints for a command into rows.
///
/// Implementations return [CommandOutput::Text] for commands they have no parser for.
pub trait OutputParser {
    fn parse_arp_table(&self, input_data: &str) -> Result<Vec<Row>, PortTrackError>;
    fn parse_mac_address_table(&self, input_data: &str) -> Result<Vec<Row>, PortTrackError>;
    fn parse_interface_status(&self, input_data: &str) -> Result<Vec<Row>, PortTrackError>;
    fn parse_command(&self, command: &str, input_data: &str)
    -> Result<CommandOutput, PortTrackError>;
}

pub fn parse_output(
    brand: &DeviceBrand,
    command: &str,
    input_data: &str,
) -> Result<CommandOutput, PortTrackError> {
    match brand {
        DeviceBrand::Cisco => cisco::Cisco.parse_command(command, input_data),
        _ => {
            debug!("No output parser for brand {brand}, returning raw text for '{command}'");
            Ok(CommandOutput::Text(input_data.to_string()))
        }
    }
}
