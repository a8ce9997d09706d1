use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use porttrack::channel::{CommandChannel, CommandOutput, Row};
use porttrack::config::{AppConfig, Credentials, DeviceBrand, InventoryDevice, RefreshMode};
use porttrack::export::export_csv;
use porttrack::inventory::{DeviceDirectory, DeviceRecord, Inventory};
use porttrack::ssh::SshError;
use porttrack::tracker::{HostTracker, TrackerOptions};
use porttrack::{PortTrackError, PortType, PortTypeFilter};

const ROUTER: &str = "10.0.0.1";
const SWITCH_A: &str = "192.168.0.2";
const SWITCH_B: &str = "192.168.0.3";

fn ip(address: &str) -> IpAddr {
    address.parse().unwrap()
}

/// What the fake devices currently report. Tests change it between cycles.
#[derive(Default)]
struct NetworkState {
    arp: HashMap<IpAddr, Vec<(String, String)>>,
    /// switch -> (mac, port)
    mac_table: HashMap<IpAddr, Vec<(String, String)>>,
    /// switch -> (port, vlan column)
    status: HashMap<IpAddr, Vec<(String, String)>>,
    unreachable: HashSet<IpAddr>,
    /// Devices that answer collection commands but drop the connection on anything else
    fail_interface_commands: HashSet<IpAddr>,
}

#[derive(Default)]
struct FakeNetwork {
    state: Mutex<NetworkState>,
    calls: Mutex<Vec<(IpAddr, Vec<String>)>>,
}

impl FakeNetwork {
    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl CommandChannel for FakeNetwork {
    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        device: &DeviceRecord,
        commands: &[String],
        parsed: bool,
    ) -> impl Future<Output = Result<Vec<CommandOutput>, PortTrackError>> + Send {
        async move {
            self.calls
                .lock()
                .unwrap()
                .push((device.address, commands.to_vec()));

            let state = self.state.lock().unwrap();
            if state.unreachable.contains(&device.address) {
                return Err(PortTrackError::Ssh(SshError::Connection(
                    "connection refused".to_string(),
                )));
            }

            let mut outputs = Vec::new();
            for command in commands {
                let rows = |pairs: Option<&Vec<(String, String)>>, keys: (&str, &str)| {
                    CommandOutput::Rows(
                        pairs
                            .map(|pairs| {
                                pairs
                                    .iter()
                                    .map(|(a, b)| {
                                        Row::new().with(keys.0, a.as_str()).with(keys.1, b.as_str())
                                    })
                                    .collect()
                            })
                            .unwrap_or_default(),
                    )
                };
                let output = match command.as_str() {
                    "show ip arp" if parsed => {
                        rows(state.arp.get(&device.address), ("address", "mac"))
                    }
                    "show mac address-table" if parsed => rows(
                        state.mac_table.get(&device.address),
                        ("destination_address", "destination_port"),
                    ),
                    "show interfaces status" if parsed => {
                        rows(state.status.get(&device.address), ("port", "vlan"))
                    }
                    other => {
                        if state.fail_interface_commands.contains(&device.address) {
                            return Err(PortTrackError::Ssh(SshError::Timeout));
                        }
                        CommandOutput::Text(format!("{} {}", device.address, other))
                    }
                };
                outputs.push(output);
            }
            Ok(outputs)
        }
    }
}

fn inventory() -> Inventory {
    let device = |address: &str, group: &str| InventoryDevice {
        address: ip(address),
        hostname: None,
        brand: DeviceBrand::Cisco,
        groups: vec![group.to_string()],
        notes: None,
    };
    Inventory::new(
        vec![
            device(ROUTER, "router"),
            device(SWITCH_A, "switch"),
            device(SWITCH_B, "switch"),
        ],
        Credentials {
            username: "admin".to_string(),
            ..Default::default()
        },
    )
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

/// 10.0.0.5 sits behind trunk Gi1/0/1 on switch A, 10.0.0.6 on access Gi1/0/7 of switch
/// B, and 10.0.0.2 is on access Gi1/0/3 of switch A.
fn network() -> Arc<FakeNetwork> {
    let network = FakeNetwork::default();
    {
        let mut state = network.state.lock().unwrap();
        state.arp.insert(
            ip(ROUTER),
            pairs(&[
                ("10.0.0.5", "aabb.ccdd.ee01"),
                ("10.0.0.6", "aabb.ccdd.ee02"),
                ("10.0.0.1", "aabb.ccdd.ee03"),
                ("10.0.0.2", "aabb.ccdd.ee04"),
            ]),
        );
        state.mac_table.insert(
            ip(SWITCH_A),
            pairs(&[
                ("aabb.ccdd.ee01", "Gi1/0/1"),
                ("aabb.ccdd.ee04", "Gi1/0/3"),
            ]),
        );
        state.status.insert(
            ip(SWITCH_A),
            pairs(&[("Gi1/0/1", "trunk"), ("Gi1/0/3", "10")]),
        );
        state
            .mac_table
            .insert(ip(SWITCH_B), pairs(&[("aabb.ccdd.ee02", "Gi1/0/7")]));
        state
            .status
            .insert(ip(SWITCH_B), pairs(&[("Gi1/0/7", "20")]));
    }
    Arc::new(network)
}

fn tracker(
    network: &Arc<FakeNetwork>,
    refresh_mode: RefreshMode,
) -> HostTracker<Inventory, FakeNetwork> {
    HostTracker::new(
        inventory(),
        network.clone(),
        TrackerOptions {
            refresh_mode,
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_trunk_binding_hidden_from_access_lookup() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Replace);
    assert!(tracker.load().await.unwrap().is_empty());

    let rows = tracker
        .track_hosts(&["10.0.0.5"], PortTypeFilter::Access)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].mac.as_deref(), Some("AA:BB:CC:DD:EE:01"));
    assert_eq!(rows[0].switch, None);
    assert_eq!(rows[0].port, None);

    let rows = tracker
        .track_hosts(&["10.0.0.5"], PortTypeFilter::Trunk)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].switch.as_deref(), Some(SWITCH_A));
    assert_eq!(rows[0].port.as_deref(), Some("Gi1/0/1"));
    assert_eq!(rows[0].port_type, Some(PortType::Trunk));
}

#[tokio::test]
async fn test_unknown_address_yields_one_empty_row() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Replace);
    tracker.load().await.unwrap();

    let rows = tracker
        .track_hosts(&["10.0.0.9", "10.0.0.6"], PortTypeFilter::All)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].ip, "10.0.0.9");
    assert_eq!(rows[0].mac, None);
    assert_eq!(rows[0].switch, None);
    assert_eq!(rows[1].ip, "10.0.0.6");
    assert_eq!(rows[1].switch.as_deref(), Some(SWITCH_B));
}

#[tokio::test]
async fn test_track_subnet_drops_excluded_and_unresolved() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Replace);
    tracker.load().await.unwrap();

    let rows = tracker
        .track_subnet("10.0.0.0/30", PortTypeFilter::Access, &["10.0.0.2"])
        .await
        .unwrap();
    // .1 resolves but has no bindings, .2 is excluded
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ip, "10.0.0.1");
    assert_eq!(rows[0].switch, None);

    let rows = tracker
        .track_subnet::<&str>("10.0.0.4/30", PortTypeFilter::All, &[])
        .await
        .unwrap();
    let ips: Vec<&str> = rows.iter().map(|row| row.ip.as_str()).collect();
    assert_eq!(ips, vec!["10.0.0.5", "10.0.0.6"]);
}

#[tokio::test]
async fn test_export_of_empty_subnet_creates_no_file() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Replace);
    tracker.load().await.unwrap();

    let rows = tracker
        .track_subnet::<&str>("10.20.0.0/29", PortTypeFilter::All, &[])
        .await
        .unwrap();
    assert!(rows.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.csv");
    assert_eq!(
        export_csv(&rows, &path).unwrap_err(),
        PortTrackError::ExportEmpty
    );
    assert!(!path.exists());
}

#[tokio::test]
async fn test_invalid_address_contacts_no_device() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Replace);
    tracker.load().await.unwrap();
    let before = network.call_count();

    let err = tracker
        .track_with_commands(
            &["10.0.0.5", "bogus"],
            &["show interface {}".to_string()],
            PortTypeFilter::All,
        )
        .await
        .unwrap_err();
    assert_eq!(err, PortTrackError::InvalidAddress("bogus".to_string()));
    assert_eq!(network.call_count(), before);

    let err = tracker
        .track_subnet("10.0.0.0/30", PortTypeFilter::All, &["10.0.0.x"])
        .await
        .unwrap_err();
    assert!(matches!(err, PortTrackError::InvalidAddress(_)));
}

#[tokio::test]
async fn test_unreachable_switch_is_logged_and_skipped() {
    let network = network();
    network
        .state
        .lock()
        .unwrap()
        .unreachable
        .insert(ip(SWITCH_B));
    let tracker = tracker(&network, RefreshMode::Replace);

    let errors = tracker.load().await.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(SWITCH_B));
    assert_eq!(tracker.error_log().await, errors);

    let snapshot = tracker.snapshot().await;
    assert!(snapshot.collected_at.is_some());
    assert!(
        snapshot
            .mac_locations
            .values()
            .flatten()
            .all(|binding| binding.switch != ip(SWITCH_B))
    );

    let rows = tracker
        .track_hosts(&["10.0.0.2"], PortTypeFilter::Access)
        .await
        .unwrap();
    assert_eq!(rows[0].port.as_deref(), Some("Gi1/0/3"));
}

#[tokio::test]
async fn test_error_log_resets_each_cycle() {
    let network = network();
    network.state.lock().unwrap().unreachable.insert(ip(ROUTER));
    let tracker = tracker(&network, RefreshMode::Replace);

    assert_eq!(tracker.load().await.unwrap().len(), 1);
    assert!(tracker.snapshot().await.arp.is_empty());

    network.state.lock().unwrap().unreachable.clear();
    assert!(tracker.load().await.unwrap().is_empty());
    assert!(tracker.error_log().await.is_empty());
    assert_eq!(tracker.snapshot().await.arp.len(), 4);
}

#[tokio::test]
async fn test_replace_mode_drops_stale_bindings() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Replace);
    tracker.load().await.unwrap();

    network.state.lock().unwrap().mac_table.remove(&ip(SWITCH_B));
    tracker.load().await.unwrap();

    let records = tracker
        .locate(&["10.0.0.6"], PortTypeFilter::All)
        .await
        .unwrap();
    assert!(records[0].hardware_address.is_some());
    assert!(!records[0].is_located());
}

#[tokio::test]
async fn test_merge_mode_accumulates_bindings() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Merge);
    tracker.load().await.unwrap();

    {
        let mut state = network.state.lock().unwrap();
        state.mac_table.remove(&ip(SWITCH_B));
        state.arp.clear();
    }
    tracker.load().await.unwrap();

    // still known from the first cycle
    let records = tracker
        .locate(&["10.0.0.6"], PortTypeFilter::All)
        .await
        .unwrap();
    assert!(records[0].is_located());

    // switch A reported its table twice, so its bindings are appended again
    let records = tracker
        .locate(&["10.0.0.2"], PortTypeFilter::All)
        .await
        .unwrap();
    assert_eq!(records[0].interfaces.len(), 2);
}

#[tokio::test]
async fn test_track_with_commands_annotates_ports() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Replace);
    tracker.load().await.unwrap();
    let before = network.call_count();

    let templates = vec![
        "show interface {}".to_string(),
        "show run interface {}".to_string(),
    ];
    let rows = tracker
        .track_with_commands(
            &["10.0.0.2", "10.0.0.6", "10.0.0.9"],
            &templates,
            PortTypeFilter::Access,
        )
        .await
        .unwrap();

    // one connection per switch
    assert_eq!(network.call_count(), before + 2);
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0].show_commands.as_deref(),
        Some("192.168.0.2 show interface Gi1/0/3\n192.168.0.2 show run interface Gi1/0/3")
    );
    assert_eq!(
        rows[1].show_commands.as_deref(),
        Some("192.168.0.3 show interface Gi1/0/7\n192.168.0.3 show run interface Gi1/0/7")
    );
    assert_eq!(rows[2].show_commands.as_deref(), Some("NA"));
}

#[tokio::test]
async fn test_switch_failing_interface_commands_is_marked_unreachable() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Replace);
    tracker.load().await.unwrap();
    network
        .state
        .lock()
        .unwrap()
        .fail_interface_commands
        .insert(ip(SWITCH_B));

    let rows = tracker
        .track_with_commands(
            &["10.0.0.2", "10.0.0.6"],
            &["show interface {}".to_string()],
            PortTypeFilter::Access,
        )
        .await
        .unwrap();
    assert_eq!(
        rows[0].show_commands.as_deref(),
        Some("192.168.0.2 show interface Gi1/0/3")
    );
    assert!(
        rows[1]
            .show_commands
            .as_deref()
            .unwrap()
            .starts_with("unreachable: ")
    );
}

/// An inventory whose lookups start failing once `missing` is set.
struct ShrinkingInventory {
    inventory: Inventory,
    missing: Arc<AtomicBool>,
}

impl DeviceDirectory for ShrinkingInventory {
    fn resolve(&self, group_or_address: &str) -> Result<Vec<DeviceRecord>, PortTrackError> {
        if self.missing.load(Ordering::SeqCst) {
            return Err(PortTrackError::HostGroupNotFound(group_or_address.to_string()));
        }
        self.inventory.resolve(group_or_address)
    }
}

#[tokio::test]
async fn test_failed_cycle_keeps_previous_snapshot() {
    let network = network();
    let missing = Arc::new(AtomicBool::new(false));
    let tracker = HostTracker::new(
        ShrinkingInventory {
            inventory: inventory(),
            missing: missing.clone(),
        },
        network.clone(),
        TrackerOptions::default(),
    );
    tracker.load().await.unwrap();
    let first = tracker.snapshot().await;

    network.state.lock().unwrap().arp.clear();
    missing.store(true, Ordering::SeqCst);
    let err = tracker.load().await.unwrap_err();
    assert_eq!(err, PortTrackError::HostGroupNotFound("router".to_string()));

    let current = tracker.snapshot().await;
    assert!(Arc::ptr_eq(&first, &current));
    assert_eq!(current.arp.len(), 4);
    assert_eq!(current.collected_at, first.collected_at);

    let rows = tracker
        .track_hosts(&["10.0.0.2"], PortTypeFilter::Access)
        .await
        .unwrap();
    assert_eq!(rows[0].port.as_deref(), Some("Gi1/0/3"));
}

#[tokio::test]
async fn test_concurrent_loads_run_one_after_another() {
    let network = network();
    let tracker = tracker(&network, RefreshMode::Merge);

    let (first, second) = tokio::join!(tracker.load(), tracker.load());
    assert!(first.unwrap().is_empty());
    assert!(second.unwrap().is_empty());
    assert_eq!(network.call_count(), 6);

    // the second cycle started from the first cycle's tables
    let records = tracker
        .locate(&["10.0.0.2"], PortTypeFilter::All)
        .await
        .unwrap();
    assert_eq!(records[0].interfaces.len(), 2);
}

#[tokio::test]
async fn test_tracker_options_follow_config() {
    let config = AppConfig {
        refresh_mode: RefreshMode::Merge,
        ..Default::default()
    };
    let network = network();
    let tracker = HostTracker::new(
        Inventory::from_config(&config),
        network.clone(),
        TrackerOptions::from(&config),
    );
    // no devices in the default inventory, so nothing is contacted
    assert!(tracker.load().await.unwrap().is_empty());
    assert_eq!(network.call_count(), 0);
}
