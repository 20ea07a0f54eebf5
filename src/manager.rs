use crate::{
    Boundary, CommandExecutor, Config, DEFAULT_SECTOR_SIZE, DeviceKind, DeviceLister, DeviceLock,
    DeviceLocks, Error, FreeSpace, Partition, PartitionTable, Result, TableType, device_path,
    parse_free, parse_size, parse_table, parse_udev,
};
use byte_unit::Byte;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, warn};

/// Reads and mutates the partition tables of individual devices through
/// `parted`.
///
/// [`add_partition`](Self::add_partition) and
/// [`delete_partition`](Self::delete_partition) hold the device's
/// [`DeviceLock`] for their whole command sequence. Reads take no lock and
/// may see a table that is about to change.
#[derive(Debug)]
pub struct PartitionManager<E, L> {
    executor: E,
    lister: L,
    config: Config,
    locks: Arc<DeviceLocks>,
}

impl<E: CommandExecutor, L: DeviceLister> PartitionManager<E, L> {
    pub fn new(executor: E, lister: L) -> Self {
        Self::with_config(executor, lister, Config::default())
    }

    pub fn with_config(executor: E, lister: L, config: Config) -> Self {
        Self {
            executor,
            lister,
            config,
            locks: Arc::default(),
        }
    }

    /// Shares the lock map with other managers driving the same devices.
    pub fn with_locks(mut self, locks: Arc<DeviceLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device_lock(&self, device: &str) -> DeviceLock {
        self.locks.get(device)
    }

    fn parted(&self, device: &str, args: &[&str]) -> Result<String> {
        let path = device_path(device);
        let mut argv = vec!["-s", path.as_str(), "--"];
        argv.extend_from_slice(args);
        self.executor.run(&self.config.parted, &argv)
    }

    /// The full `parted print` view of `device`, header metadata and rejected
    /// rows included.
    pub fn table(&self, device: &str) -> Result<PartitionTable> {
        let unit = self.config.unit.to_string();
        let output = self.parted(device, &["unit", &unit, "print"])?;
        debug!(device, %output, "read partition table");
        Ok(parse_table(&output))
    }

    pub fn partitions(&self, device: &str) -> Result<Vec<Partition>> {
        Ok(self.table(device)?.partitions)
    }

    /// Unallocated extents of `device` and their total size.
    pub fn unused_partitions(&self, device: &str) -> Result<(Vec<Partition>, Byte)> {
        let FreeSpace { extents, total, .. } = self.free_space(device)?;
        Ok((extents, total))
    }

    pub fn free_space(&self, device: &str) -> Result<FreeSpace> {
        let unit = self.config.unit.to_string();
        let output = self.parted(device, &["unit", &unit, "print", "free"])?;
        debug!(device, %output, "read free space");
        Ok(parse_free(&output))
    }

    /// Creates a partition spanning `start..end` and names it `name`.
    ///
    /// Boundaries are read with the 1024-based unit table and the device's
    /// logical sector size, then handed to `mkpart` in bytes.
    ///
    /// A device without a partition table is only labelled when
    /// [`Config::init_label`] is set. Each step aborts the sequence on
    /// failure; nothing already written to the disk is rolled back.
    pub fn add_partition(
        &self,
        device: &str,
        name: &str,
        start: &str,
        end: &str,
    ) -> Result<Partition> {
        validate_name(name)?;
        Boundary::parse(start, DEFAULT_SECTOR_SIZE)?;
        Boundary::parse(end, DEFAULT_SECTOR_SIZE)?;

        let lock = self.device_lock(device);
        let _guard = lock.lock();

        if !self.lister.table_type(device)?.is_known() {
            let Some(label) = &self.config.init_label else {
                return Err(Error::Uninitialized(device.to_owned()));
            };
            info!(device, %label, "creating partition table");
            self.parted(device, &["mklabel", &label.to_string()])?;
        }

        let before = self.table(device)?;
        if let Some(existing) = before.find_by_name(name) {
            return Err(Error::DuplicateName {
                device: device.to_owned(),
                name: name.to_owned(),
                number: existing.number.to_string(),
            });
        }

        let sector_size = before.logical_sector_size;
        let (first, last) = (
            Boundary::parse(start, sector_size)?,
            Boundary::parse(end, sector_size)?,
        );
        info!(device, name, %first, %last, "creating partition");
        self.parted(
            device,
            &[
                "mkpart",
                &self.config.part_type,
                &first.to_string(),
                &last.to_string(),
            ],
        )?;

        let after = self.table(device)?;
        let disk_size = after.disk_size.or(before.disk_size).map_or(0, |b| b.as_u64());
        let wanted = (first, last);

        let mut created = after
            .partitions
            .into_iter()
            .filter(|p| !p.is_free())
            .find(|p| spans(p, wanted, disk_size, sector_size))
            .ok_or_else(|| {
                warn!(device, start, end, "created partition missing from table");
                Error::NotFound {
                    device: device.to_owned(),
                    what: format!("partition spanning {start}..{end}"),
                }
            })?;

        info!(device, number = %created.number, name, "naming partition");
        self.parted(device, &["name", &created.number, name])?;
        created.name = name.into();
        Ok(created)
    }

    /// Removes partition `number`. A number that is not in the table is an
    /// error, not a no-op.
    pub fn delete_partition(&self, device: &str, number: &str) -> Result<bool> {
        let lock = self.device_lock(device);
        let _guard = lock.lock();

        if self.table(device)?.get(number).is_none() {
            return Err(Error::NotFound {
                device: device.to_owned(),
                what: format!("partition №{number}"),
            });
        }

        info!(device, number, "removing partition");
        self.parted(device, &["rm", number])?;
        Ok(true)
    }

    /// Whether `device` is itself a partition rather than a whole disk,
    /// LVM volume, multipath map etc.
    pub fn is_partition(&self, device: &str) -> Result<bool> {
        let details = self.lister.list_devices_detail(Some(device))?;
        let detail = details.first().ok_or_else(|| Error::NotFound {
            device: device.to_owned(),
            what: "device".to_owned(),
        })?;
        Ok(detail.kind == DeviceKind::Part)
    }

    pub fn udev_info(&self, device: &str) -> Result<HashMap<String, String>> {
        let path = device_path(device);
        let output = self
            .executor
            .run(&self.config.udevadm, &["info", "--query=property", &path])?;
        Ok(parse_udev(&output))
    }

    /// The table type the lister reports for `device`.
    pub fn table_type(&self, device: &str) -> Result<TableType> {
        self.lister.table_type(device)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(|c: char| c == '"' || c == '\'' || c.is_whitespace()) {
        return Err(Error::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// Whether the echoed row covers the requested extent once both sides are
/// in bytes.
fn spans(
    partition: &Partition,
    (start, end): (Boundary, Boundary),
    disk_size: u64,
    sector_size: u64,
) -> bool {
    let (Ok(echoed_start), Ok(echoed_end)) = (
        parse_size(&partition.start, sector_size),
        parse_size(&partition.end, sector_size),
    ) else {
        return false;
    };
    start.matches(echoed_start.as_u64(), disk_size, sector_size)
        && end.matches(echoed_end.as_u64(), disk_size, sector_size)
}
