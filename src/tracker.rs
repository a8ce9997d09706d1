//! The host tracker: collection cycles and the queries that run against them
//!
//! A cycle polls every collection group, reduces the results into fresh tables and then
//! publishes them as one [NetworkSnapshot]. Queries clone the current snapshot's `Arc`
//! and never hold the lock while they work, so they always see a complete cycle.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    HostRecord, PortTrackError, PortTypeFilter,
    channel::CommandChannel,
    collect::collect,
    config::{AppConfig, CollectionGroup, DEFAULT_COMMAND_POOL_SIZE, GroupRole, RefreshMode},
    export::{HostRow, flatten},
    interface_commands::annotate,
    inventory::DeviceDirectory,
    locate::{resolve, resolve_parsed},
    subnet::expand,
    tables::{NetworkSnapshot, merge_arp, merge_mac_locations},
};

#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub collection: Vec<CollectionGroup>,
    pub refresh_mode: RefreshMode,
    /// Switches queried at once when running interface commands
    pub command_pool_size: usize,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            collection: vec![CollectionGroup::routers(), CollectionGroup::switches()],
            refresh_mode: RefreshMode::default(),
            command_pool_size: DEFAULT_COMMAND_POOL_SIZE,
        }
    }
}

impl From<&AppConfig> for TrackerOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            collection: config.collection.clone(),
            refresh_mode: config.refresh_mode,
            command_pool_size: config.command_pool_size,
        }
    }
}

pub struct HostTracker<D: DeviceDirectory, C: CommandChannel> {
    directory: D,
    channel: Arc<C>,
    options: TrackerOptions,
    snapshot: RwLock<Arc<NetworkSnapshot>>,
    cycle_lock: Mutex<()>,
}

impl<D: DeviceDirectory, C: CommandChannel> HostTracker<D, C> {
    pub fn new(directory: D, channel: Arc<C>, options: TrackerOptions) -> Self {
        Self {
            directory,
            channel,
            options,
            snapshot: RwLock::new(Arc::new(NetworkSnapshot::default())),
            cycle_lock: Mutex::new(()),
        }
    }

    /// Run one full collection cycle and publish its tables.
    ///
    /// Returns the cycle's error log. Unreachable devices only add log lines; a
    /// directory failure aborts the cycle and leaves the previous snapshot in place.
    pub async fn load(&self) -> Result<Vec<String>, PortTrackError> {
        let _cycle = self.cycle_lock.lock().await;

        let mut next = match self.options.refresh_mode {
            RefreshMode::Replace => NetworkSnapshot::default(),
            RefreshMode::Merge => {
                let previous = self.snapshot().await;
                NetworkSnapshot {
                    arp: previous.arp.clone(),
                    mac_locations: previous.mac_locations.clone(),
                    ..Default::default()
                }
            }
        };

        for group in &self.options.collection {
            let results = collect(
                &self.directory,
                &self.channel,
                &group.group,
                &group.commands,
                group.pool_size,
            )
            .await?;

            for message in results.iter().filter_map(|result| result.error_message()) {
                warn!("{}", message);
                next.errors.push(message);
            }

            let merged = match group.role {
                GroupRole::Arp => merge_arp(&mut next.arp, &results),
                GroupRole::MacLocation => merge_mac_locations(&mut next.mac_locations, &results),
            };
            debug!(
                "Group '{}' ({:?}) contributed {} entries",
                group.group, group.role, merged
            );
        }

        next.collected_at = Some(Utc::now());
        info!(
            "Collection cycle complete: {} ARP entries, {} hardware addresses located, {} error(s)",
            next.arp.len(),
            next.mac_locations.len(),
            next.errors.len()
        );
        let errors = next.errors.clone();
        *self.snapshot.write().await = Arc::new(next);
        Ok(errors)
    }

    /// The most recently published snapshot.
    pub async fn snapshot(&self) -> Arc<NetworkSnapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn error_log(&self) -> Vec<String> {
        self.snapshot().await.errors.clone()
    }

    pub async fn locate<S: AsRef<str>>(
        &self,
        addresses: &[S],
        filter: PortTypeFilter,
    ) -> Result<Vec<HostRecord>, PortTrackError> {
        let snapshot = self.snapshot().await;
        resolve(&snapshot, addresses, filter)
    }

    pub async fn track_hosts<S: AsRef<str>>(
        &self,
        addresses: &[S],
        filter: PortTypeFilter,
    ) -> Result<Vec<HostRow>, PortTrackError> {
        Ok(flatten(&self.locate(addresses, filter).await?, false))
    }

    /// Every host of `cidr` that resolved to a hardware address, minus `excluded`.
    pub async fn track_subnet<S: AsRef<str>>(
        &self,
        cidr: &str,
        filter: PortTypeFilter,
        excluded: &[S],
    ) -> Result<Vec<HostRow>, PortTrackError> {
        let candidates = expand(cidr, excluded)?;
        let snapshot = self.snapshot().await;
        let found: Vec<HostRecord> = resolve_parsed(&snapshot, &candidates, filter)
            .into_iter()
            .filter(|record| record.hardware_address.is_some())
            .collect();
        info!(
            "{} of {} address(es) in {} resolved",
            found.len(),
            candidates.len(),
            cidr
        );
        Ok(flatten(&found, false))
    }

    /// Locate `addresses`, then run `templates` against the ports they were found on.
    pub async fn track_with_commands<S: AsRef<str>>(
        &self,
        addresses: &[S],
        templates: &[String],
        filter: PortTypeFilter,
    ) -> Result<Vec<HostRow>, PortTrackError> {
        let records = self.locate(addresses, filter).await?;
        let annotated = annotate(
            &self.directory,
            &self.channel,
            records,
            templates,
            self.options.command_pool_size,
        )
        .await;
        Ok(flatten(&annotated, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = AppConfig {
            refresh_mode: RefreshMode::Merge,
            command_pool_size: 4,
            ..Default::default()
        };
        let options = TrackerOptions::from(&config);
        assert_eq!(options.refresh_mode, RefreshMode::Merge);
        assert_eq!(options.command_pool_size, 4);
        assert_eq!(options.collection, config.collection);

        let defaults = TrackerOptions::default();
        assert_eq!(defaults.collection.len(), 2);
        assert_eq!(defaults.command_pool_size, DEFAULT_COMMAND_POOL_SIZE);
    }
}
