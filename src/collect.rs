//! Bounded fan-out of command batches across devices
//!
//! Every device runs on its own tokio task, with a semaphore capping how many talk to
//! the network at once. A device that fails only fails its own [DeviceResult]; the
//! batch always completes and results come back in the order the devices were given.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    PortTrackError,
    channel::{CommandChannel, CommandOutput},
    inventory::{DeviceDirectory, DeviceRecord},
};

/// What one device returned for its command batch.
#[derive(Debug)]
pub struct DeviceResult {
    pub device: DeviceRecord,
    pub outcome: Result<Vec<CommandOutput>, PortTrackError>,
}

impl DeviceResult {
    pub fn outputs(&self) -> Option<&[CommandOutput]> {
        self.outcome.as_ref().ok().map(Vec::as_slice)
    }

    /// The error log line for a failed device, `None` if it succeeded.
    pub fn error_message(&self) -> Option<String> {
        self.outcome.as_ref().err().map(ToString::to_string)
    }
}

/// A device and the commands to run on it.
#[derive(Debug, Clone)]
pub struct CommandJob {
    pub device: DeviceRecord,
    pub commands: Vec<String>,
}

/// Run each job on its own task, at most `pool_size` at a time.
pub async fn run_jobs<C: CommandChannel>(
    channel: &Arc<C>,
    jobs: Vec<CommandJob>,
    pool_size: usize,
    parsed: bool,
) -> Vec<DeviceResult> {
    let semaphore = Arc::new(Semaphore::new(pool_size.max(1)));
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let channel = channel.clone();
        let semaphore = semaphore.clone();
        let device = job.device.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    return Err(PortTrackError::Generic(format!(
                        "Worker pool closed: {err}"
                    )));
                }
            };
            debug!("Running {} command(s) on {}", job.commands.len(), job.device.address);
            channel.execute(&job.device, &job.commands, parsed).await
        });

        handles.push((device, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (device, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("Task for device {} failed: {}", device.address, err);
                Err(PortTrackError::Generic(format!("Task join error: {err}")))
            }
        };
        let outcome = outcome.map_err(|err| {
            warn!("Device {} failed: {}", device.address, err);
            PortTrackError::DeviceUnreachable {
                device: device.address,
                message: err.to_string(),
            }
        });
        results.push(DeviceResult { device, outcome });
    }

    results
}

/// Resolve `group` and run `commands` on every member, returning parsed output.
///
/// Only a directory failure (such as an unknown device address) fails the call.
pub async fn collect<D: DeviceDirectory, C: CommandChannel>(
    directory: &D,
    channel: &Arc<C>,
    group: &str,
    commands: &[String],
    pool_size: usize,
) -> Result<Vec<DeviceResult>, PortTrackError> {
    let devices = directory.resolve(group)?;
    info!(
        "Collecting from {} device(s) in '{}' with up to {} at a time",
        devices.len(),
        group,
        pool_size
    );

    let jobs = devices
        .into_iter()
        .map(|device| CommandJob {
            device,
            commands: commands.to_vec(),
        })
        .collect();

    let results = run_jobs(channel, jobs, pool_size, true).await;
    let failed = results.iter().filter(|r| r.outcome.is_err()).count();
    info!(
        "Collection from '{}' finished: {} succeeded, {} failed",
        group,
        results.len() - failed,
        failed
    );
    Ok(results)
}
