//! Flattening host records into rows for display and export
//!
//! Every (address, interface) pair becomes one [HostRow]. Rows go to a terminal table,
//! JSON, or a CSV file with every field quoted.

use std::{fs::File, io::Write, path::Path};

use comfy_table::{Cell, Table};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{HostRecord, PortTrackError, PortType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRow {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "MAC")]
    pub mac: Option<String>,
    pub switch: Option<String>,
    pub port: Option<String>,
    pub port_type: Option<PortType>,
    #[serde(
        rename = "show commands",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub show_commands: Option<String>,
}

impl HostRow {
    /// Column names, in the order [HostRow::values] returns them.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = vec!["IP", "MAC", "switch", "port", "port_type"];
        if self.show_commands.is_some() {
            names.push("show commands");
        }
        names
    }

    /// Column values, `None` where the field is null.
    pub fn values(&self) -> Vec<Option<String>> {
        let mut values = vec![
            Some(self.ip.clone()),
            self.mac.clone(),
            self.switch.clone(),
            self.port.clone(),
            self.port_type.map(|port_type| port_type.to_string()),
        ];
        if let Some(output) = &self.show_commands {
            values.push(Some(output.clone()));
        }
        values
    }
}

/// One row per interface of every record, in record order.
pub fn flatten(records: &[HostRecord], include_command_output: bool) -> Vec<HostRow> {
    records
        .iter()
        .flat_map(|record| {
            record.interfaces.iter().map(move |iface| {
                let binding = iface.binding.as_ref();
                HostRow {
                    ip: record.address.to_string(),
                    mac: record.hardware_address.map(|mac| mac.to_string()),
                    switch: binding.map(|b| b.switch.to_string()),
                    port: binding.map(|b| b.port.clone()),
                    port_type: binding.map(|b| b.port_type),
                    show_commands: include_command_output
                        .then(|| iface.command_output.clone().unwrap_or_default()),
                }
            })
        })
        .collect()
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Write `rows` as CSV with a header taken from the first row.
pub fn write_csv<W: Write>(writer: &mut W, rows: &[HostRow]) -> Result<(), PortTrackError> {
    let Some(first) = rows.first() else {
        return Err(PortTrackError::ExportEmpty);
    };
    let header: Vec<String> = first.field_names().into_iter().map(quote).collect();
    writeln!(writer, "{}", header.join(","))?;
    let width = header.len();

    for row in rows {
        let fields: Vec<String> = row
            .values()
            .into_iter()
            .chain(std::iter::repeat(None))
            .take(width)
            .map(|value| quote(value.as_deref().unwrap_or_default()))
            .collect();
        writeln!(writer, "{}", fields.join(","))?;
    }
    Ok(())
}

/// Write `rows` to a CSV file at `path`. No file is created when there are no rows.
pub fn export_csv<P: AsRef<Path>>(rows: &[HostRow], path: P) -> Result<(), PortTrackError> {
    if rows.is_empty() {
        return Err(PortTrackError::ExportEmpty);
    }
    let mut file = File::create(path.as_ref())?;
    write_csv(&mut file, rows)?;
    file.flush()?;
    info!("Exported {} row(s) to {}", rows.len(), path.as_ref().display());
    Ok(())
}

pub fn to_json(rows: &[HostRow]) -> Result<String, PortTrackError> {
    Ok(serde_json::to_string_pretty(rows)?)
}

/// Render rows as a terminal table. Multi-line command output stays inside its cell.
pub fn format_table(rows: &[HostRow]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let header = first.field_names();
    let width = header.len();

    let mut table = Table::new();
    table.set_header(header);

    for row in rows {
        table.add_row(
            row.values()
                .into_iter()
                .chain(std::iter::repeat(None))
                .take(width)
                .map(|value| Cell::new(value.unwrap_or_default())),
        );
    }
    table.to_string()
}
