use crate::{
    CommandExecutor, DeviceKind, DeviceLister, Partition, PartitionManager, Result, TableType,
};
use byte_unit::Byte;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A partitioned device together with its partitions.
#[derive(Debug, Clone)]
pub struct RawDevice {
    pub name: Arc<str>,
    pub kind: DeviceKind,
    pub model: Option<Arc<str>>,
    pub size: Option<Byte>,
    pub table_type: TableType,
    pub partitions: Vec<Partition>,
}

/// Collects partitions across every device the lister knows about.
///
/// Best effort: a device that cannot be read is logged and left out. Only a
/// failure to enumerate devices fails the call.
pub struct Aggregator<'a, E, L> {
    manager: &'a PartitionManager<E, L>,
}

impl<'a, E: CommandExecutor, L: DeviceLister> Aggregator<'a, E, L> {
    pub fn new(manager: &'a PartitionManager<E, L>) -> Self {
        Self { manager }
    }

    fn has_table(&self, device: &str) -> bool {
        match self.manager.table_type(device) {
            Ok(TableType::Unknown) => {
                debug!(device, "no partition table, skipping");
                false
            }
            Ok(_) => true,
            Err(error) => {
                warn!(device, %error, "failed to get partition table type, skipping");
                false
            }
        }
    }

    pub fn list_partitions(&self) -> Result<Vec<Partition>> {
        let devices = self.manager.lister().list_devices()?;
        let mut partitions = Vec::new();

        for device in &devices {
            info!(%device, "listing partitions");
            if !self.has_table(device) {
                continue;
            }
            match self.manager.partitions(device) {
                Ok(found) => partitions.extend(found),
                Err(error) => warn!(%device, %error, "failed to list partitions, skipping"),
            }
        }

        Ok(partitions)
    }

    /// One [`RawDevice`] per parent of a device the lister classifies as a
    /// partition, in the order the parents are first seen.
    pub fn list_device_partitions(&self) -> Result<Vec<RawDevice>> {
        let details = self.manager.lister().list_devices_detail(None)?;
        let parents = details
            .iter()
            .filter(|d| d.kind == DeviceKind::Part)
            .filter_map(|d| d.parent.as_deref())
            .unique()
            .collect::<Vec<_>>();

        let mut devices = Vec::new();
        for parent in parents {
            if !self.has_table(parent) {
                continue;
            }
            let table = match self.manager.table(parent) {
                Ok(table) => table,
                Err(error) => {
                    warn!(device = parent, %error, "failed to list partitions, skipping");
                    continue;
                }
            };

            let detail = details.iter().find(|d| d.name == parent);
            devices.push(RawDevice {
                name: parent.into(),
                kind: detail.map_or(DeviceKind::Disk, |d| d.kind.clone()),
                model: table.model,
                size: detail
                    .and_then(|d| d.size)
                    .map(Byte::from_u64)
                    .or(table.disk_size),
                table_type: table.table_type,
                partitions: table.partitions,
            });
        }

        Ok(devices)
    }
}
