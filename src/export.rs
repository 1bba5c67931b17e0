use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;

/// JSON projection of a [`Snapshot`].
///
/// The document always carries exactly these four top-level keys, in this
/// order. A metric that was unavailable when the snapshot was taken
/// serializes as an explicit `null` rather than disappearing, so consumers
/// can tell "not available here" from "field never existed".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportDocument {
    pub cpu_percent: Option<Vec<f32>>,
    pub virtual_memory: Option<MemoryExport>,
    pub disks: Option<BTreeMap<String, Option<DiskExport>>>,
    pub network: Option<NetworkExport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryExport {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskExport {
    pub total: u64,
    pub used: u64,
    pub percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkExport {
    pub interface: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    /// `null` while the rate tracker has no baseline yet.
    pub sent_bytes_per_sec: Option<f64>,
    pub recv_bytes_per_sec: Option<f64>,
}

/// Projects a snapshot into its export document. Pure: never triggers a new
/// sample and never mutates sampler state.
pub fn document(snapshot: &Snapshot) -> ExportDocument {
    let cpu_percent = snapshot.cpu_percent.available().cloned();

    let virtual_memory = snapshot.memory.available().map(|memory| MemoryExport {
        total: memory.total,
        used: memory.used,
        available: memory.available,
        percent: memory.percent,
    });

    // Keyed by device in sorted order; partitions without a recognized
    // filesystem (pseudo mounts) are left out entirely, while a partition
    // whose usage query failed keeps its key with a null value.
    let disks = snapshot.disks.available().map(|views| {
        views
            .iter()
            .filter(|view| !view.file_system.is_empty())
            .map(|view| {
                let usage = view.usage.available().map(|usage| DiskExport {
                    total: usage.total,
                    used: usage.used,
                    percent: usage.percent(),
                });
                (view.device.clone(), usage)
            })
            .collect::<BTreeMap<_, _>>()
    });

    let network = snapshot.network.available().map(|view| NetworkExport {
        interface: view.interface.clone(),
        bytes_sent: view.counters.bytes_sent,
        bytes_recv: view.counters.bytes_recv,
        sent_bytes_per_sec: view.throughput.map(|rate| rate.sent_bytes_per_sec),
        recv_bytes_per_sec: view.throughput.map(|rate| rate.recv_bytes_per_sec),
    });

    ExportDocument {
        cpu_percent,
        virtual_memory,
        disks,
        network,
    }
}

/// The export document as pretty-printed JSON. Deterministic: the same
/// snapshot always yields byte-identical output.
pub fn to_pretty_json(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(&document(snapshot))?)
}

/// Writes the export document to `path` as pretty-printed JSON.
pub fn write_json(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let json = to_pretty_json(snapshot)?;
    std::fs::write(path, json).map_err(|err| match err.kind() {
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_path_buf()),
        _ => Error::Io(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{DiskView, NetworkView, Reading, Throughput};
    use crate::system::{DiskUsage, MemoryStats, NetCounters};
    use std::time::Duration;

    fn snapshot_with_disks(disks: Reading<Vec<DiskView>>) -> Snapshot {
        Snapshot {
            tick: 3,
            uptime: Reading::Available(Duration::from_secs(90_061)),
            cpu_percent: Reading::Available(vec![10.5, 20.0]),
            memory: Reading::Available(MemoryStats {
                total: 1000,
                used: 400,
                available: 500,
                percent: 50.0,
            }),
            disks,
            network: Reading::Available(NetworkView {
                interface: "eth0".into(),
                counters: NetCounters {
                    bytes_sent: 1500,
                    bytes_recv: 2200,
                },
                throughput: Some(Throughput {
                    sent_bytes_per_sec: 500.0,
                    recv_bytes_per_sec: 200.0,
                }),
            }),
            temperatures: Reading::Unavailable("temperature sensors not supported".into()),
        }
    }

    #[test]
    fn projection_copies_values() {
        let snapshot = snapshot_with_disks(Reading::Available(vec![DiskView {
            device: "sda1".into(),
            mount_point: "/".into(),
            file_system: "ext4".into(),
            usage: Reading::Available(DiskUsage {
                total: 1000,
                used: 250,
            }),
        }]));
        let document = document(&snapshot);

        assert_eq!(document.cpu_percent, Some(vec![10.5, 20.0]));
        let memory = document.virtual_memory.unwrap();
        assert_eq!(memory.total, 1000);
        assert_eq!(memory.percent, 50.0);
        let disks = document.disks.unwrap();
        let disk = disks.get("sda1").unwrap().unwrap();
        assert_eq!(disk.used, 250);
        assert_eq!(disk.percent, 25.0);
        let network = document.network.unwrap();
        assert_eq!(network.interface, "eth0");
        assert_eq!(network.sent_bytes_per_sec, Some(500.0));
    }

    #[test]
    fn empty_filesystem_partitions_are_left_out() {
        let snapshot = snapshot_with_disks(Reading::Available(vec![
            DiskView {
                device: "sda1".into(),
                mount_point: "/".into(),
                file_system: "ext4".into(),
                usage: Reading::Available(DiskUsage {
                    total: 1000,
                    used: 250,
                }),
            },
            DiskView {
                device: "loop0".into(),
                mount_point: "/snap".into(),
                file_system: String::new(),
                usage: Reading::Available(DiskUsage { total: 10, used: 10 }),
            },
        ]));
        let disks = document(&snapshot).disks.unwrap();
        assert_eq!(disks.len(), 1);
        assert!(disks.contains_key("sda1"));
    }

    #[test]
    fn failed_partition_keeps_key_with_null_usage() {
        let snapshot = snapshot_with_disks(Reading::Available(vec![DiskView {
            device: "sdb1".into(),
            mount_point: "/data".into(),
            file_system: "xfs".into(),
            usage: Reading::Unavailable("device busy".into()),
        }]));
        let disks = document(&snapshot).disks.unwrap();
        assert_eq!(disks.get("sdb1"), Some(&None));
    }

    #[test]
    fn unavailable_disk_enumeration_is_null() {
        let snapshot = snapshot_with_disks(Reading::Unavailable("disk scan failed".into()));
        assert_eq!(document(&snapshot).disks, None);
    }
}
