//! Integration tests for parsing VI/JSON data.
//!
//! These tests validate that the vsphere-vim read models deserialize property values as
//! vCenter actually returns them, including the many properties the models ignore.

use std::fs;
use std::path::PathBuf;
use vsphere_core::types::{GuestOsFamily, TaskState};
use vsphere_vim::models::{HostSummary, ResourcePoolConfig, TaskInfo, VmConfig};

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_fixture(name: &str) -> String {
    let fixture_path = fixtures_dir().join(name);
    fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    })
}

#[test]
fn test_deserialize_vm_config() {
    let json_data = load_fixture("vm_config.json");
    let config: VmConfig = serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize VM config: {}", e));

    assert_eq!(config.name, "tpl-ubuntu-22.04");
    assert!(config.template);
    assert_eq!(config.guest_id.as_deref(), Some("ubuntu64Guest"));
    assert_eq!(config.hardware.num_cpu, 2);
    assert_eq!(config.hardware.memory_mb, 4096);
    assert_eq!(config.hardware.device.len(), 5);

    let family = GuestOsFamily::from_guest_id(config.guest_id.as_deref().unwrap_or_default());
    assert_eq!(family, GuestOsFamily::Linux);
}

#[test]
fn test_vm_config_devices() {
    let json_data = load_fixture("vm_config.json");
    let config: VmConfig = serde_json::from_str(&json_data).unwrap();

    let disk = config.first_disk().expect("template has a disk");
    assert_eq!(disk.key(), Some(2000));
    assert_eq!(disk.capacity_in_kb(), Some(40 * 1024 * 1024));
    assert_eq!(config.total_disk_gb(), 50);

    let nic = config.first_ethernet_card().expect("template has a NIC");
    assert_eq!(nic.type_name(), Some("VirtualVmxnet3"));
    assert_eq!(nic.key(), Some(4000));
    assert_eq!(
        nic.backing().and_then(|b| b.get("deviceName")).and_then(|v| v.as_str()),
        Some("VM Network")
    );
}

#[test]
fn test_device_round_trip_preserves_unknown_properties() {
    let json_data = load_fixture("vm_config.json");
    let config: VmConfig = serde_json::from_str(&json_data).unwrap();
    let nic = config.first_ethernet_card().unwrap().clone();

    let value = serde_json::to_value(&nic).unwrap();
    assert_eq!(value["macAddress"], "00:50:56:a1:2b:3c");
    assert_eq!(value["controllerKey"], 100);
}

#[test]
fn test_deserialize_host_summary() {
    let json_data = load_fixture("host_summary.json");
    let summary: HostSummary = serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize host summary: {}", e));

    let hardware = summary.hardware.expect("hardware summary present");
    assert_eq!(hardware.num_cpu_cores, 40);
    assert_eq!(hardware.cpu_mhz, 2095);
    assert_eq!(hardware.memory_size, 256 * 1024 * 1024 * 1024);
    assert_eq!(summary.quick_stats.overall_cpu_usage, Some(12873));
    assert_eq!(summary.quick_stats.overall_memory_usage, Some(151_234));
}

#[test]
fn test_deserialize_failed_task() {
    let json_data = load_fixture("task_info.json");
    let task: TaskInfo = serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize task info: {}", e));

    assert_eq!(task.key, "task-1042");
    assert_eq!(task.state, TaskState::Error);
    assert_eq!(task.description_id.as_deref(), Some("VirtualMachine.clone"));
    assert_eq!(task.entity_name.as_deref(), Some("tpl-ubuntu-22.04"));
    assert_eq!(
        task.error.map(|e| e.localized_message).as_deref(),
        Some("The name 'web-01' already exists.")
    );
    assert!(task.queue_time.is_some());
    assert!(task.complete_time > task.start_time);
}

#[test]
fn test_deserialize_resource_pool_config() {
    let json_data = load_fixture("resource_pool_config.json");
    let config: ResourcePoolConfig = serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize resource pool config: {}", e));

    assert_eq!(config.cpu_allocation.limit, Some(20000));
    assert_eq!(config.memory_allocation.limit, Some(-1));
}
