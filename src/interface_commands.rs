//! Running diagnostic commands against the ports hosts were found on
//!
//! Every switch gets one connection carrying the commands for all of its ports, ordered
//! port by port. The flat response is cut back into per-port chunks of
//! `templates.len()` outputs, which only works because the channel answers in request
//! order.

use std::{
    collections::{HashMap, hash_map::Entry},
    net::IpAddr,
    sync::Arc,
};

use tracing::{debug, info, warn};

use crate::{
    HostRecord, PortTrackError,
    channel::{CommandChannel, CommandOutput},
    collect::{CommandJob, DeviceResult, run_jobs},
    inventory::DeviceDirectory,
};

/// Replaced with the port name in every command template.
pub const PORT_PLACEHOLDER: &str = "{}";

/// Output attached to interfaces with no switch.
pub const NOT_APPLICABLE: &str = "NA";

const INCOMPLETE_OUTPUT: &str = "incomplete output";

/// Ports to query, grouped per switch in first-seen order.
type SwitchPorts = Vec<(IpAddr, Vec<String>)>;

fn ports_by_switch(records: &[HostRecord]) -> SwitchPorts {
    let mut index: HashMap<IpAddr, usize> = HashMap::new();
    let mut switches: SwitchPorts = Vec::new();

    for binding in records
        .iter()
        .flat_map(|record| record.interfaces.iter())
        .filter_map(|iface| iface.binding.as_ref())
    {
        let slot = match index.entry(binding.switch) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                switches.push((binding.switch, Vec::new()));
                *entry.insert(switches.len() - 1)
            }
        };
        let ports = &mut switches[slot].1;
        if !ports.contains(&binding.port) {
            ports.push(binding.port.clone());
        }
    }
    switches
}

/// Substitute every port into every template, all commands for the first port first.
pub fn build_command_list(ports: &[String], templates: &[String]) -> Vec<String> {
    ports
        .iter()
        .flat_map(|port| {
            templates
                .iter()
                .map(move |template| template.replace(PORT_PLACEHOLDER, port))
        })
        .collect()
}

/// Cut a flat response back into one text block per port.
///
/// Ports without a complete chunk get `None`.
pub fn split_outputs(
    ports: &[String],
    outputs: Vec<CommandOutput>,
    commands_per_port: usize,
) -> Vec<(String, Option<String>)> {
    let mut outputs = outputs.into_iter();
    ports
        .iter()
        .map(|port| {
            let chunk: Vec<String> = outputs
                .by_ref()
                .take(commands_per_port)
                .map(CommandOutput::into_text)
                .collect();
            let text = (chunk.len() == commands_per_port).then(|| chunk.join("\n"));
            (port.clone(), text)
        })
        .collect()
}

fn unreachable_marker(reason: impl std::fmt::Display) -> String {
    format!("unreachable: {reason}")
}

/// Run `templates` against every port the records were found on and attach the output.
///
/// Never fails as a whole: a switch that cannot be resolved or reached marks its
/// interfaces as unreachable, and sentinel interfaces get [NOT_APPLICABLE].
pub async fn annotate<D: DeviceDirectory, C: CommandChannel>(
    directory: &D,
    channel: &Arc<C>,
    mut records: Vec<HostRecord>,
    templates: &[String],
    pool_size: usize,
) -> Vec<HostRecord> {
    let switches = if templates.is_empty() {
        Vec::new()
    } else {
        ports_by_switch(&records)
    };

    let mut port_output: HashMap<(IpAddr, String), String> = HashMap::new();
    let mut jobs = Vec::with_capacity(switches.len());
    let mut job_ports: HashMap<IpAddr, Vec<String>> = HashMap::new();

    for (switch, ports) in switches {
        let device = match directory.resolve(&switch.to_string()) {
            Ok(devices) => devices.into_iter().next(),
            Err(err) => {
                warn!("Could not resolve switch {}: {}", switch, err);
                for port in &ports {
                    port_output.insert((switch, port.clone()), unreachable_marker(&err));
                }
                continue;
            }
        };
        let Some(device) = device else {
            for port in &ports {
                port_output.insert(
                    (switch, port.clone()),
                    unreachable_marker("not in the device inventory"),
                );
            }
            continue;
        };

        debug!("Switch {} gets {} port(s) of commands", switch, ports.len());
        jobs.push(CommandJob {
            device,
            commands: build_command_list(&ports, templates),
        });
        job_ports.insert(switch, ports);
    }

    if !jobs.is_empty() {
        info!(
            "Running {} command(s) per port on {} switch(es)",
            templates.len(),
            jobs.len()
        );
    }

    for DeviceResult { device, outcome } in run_jobs(channel, jobs, pool_size, false).await {
        let switch = device.address;
        let Some(ports) = job_ports.remove(&switch) else {
            continue;
        };
        match outcome {
            Ok(outputs) => {
                for (port, text) in split_outputs(&ports, outputs, templates.len()) {
                    let text = text.unwrap_or_else(|| {
                        warn!("Switch {} returned no complete output for {}", switch, port);
                        unreachable_marker(INCOMPLETE_OUTPUT)
                    });
                    port_output.insert((switch, port), text);
                }
            }
            Err(err) => {
                let reason = match err {
                    PortTrackError::DeviceUnreachable { message, .. } => message,
                    other => other.to_string(),
                };
                for port in ports {
                    port_output.insert((switch, port), unreachable_marker(&reason));
                }
            }
        }
    }

    for iface in records.iter_mut().flat_map(|record| record.interfaces.iter_mut()) {
        iface.command_output = Some(match &iface.binding {
            None => NOT_APPLICABLE.to_string(),
            Some(binding) => port_output
                .get(&(binding.switch, binding.port.clone()))
                .cloned()
                .unwrap_or_default(),
        });
    }
    records
}
