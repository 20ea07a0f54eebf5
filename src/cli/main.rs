mod args;

use args::Command;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use itertools::Itertools;
use partkit::{Aggregator, DeviceLister, LsblkLister, Partition, PartitionManager, SystemExecutor};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = args::parse();

    if cli.debug {
        let file = std::fs::File::create("partkit.log").context("failed to create log file")?;
        tracing_subscriber::fmt()
            .with_writer(file)
            .with_ansi(false)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    if cli.command.mutates() && !nix::unistd::Uid::effective().is_root() {
        return Err(eyre!("partkit must be run as root to change partition tables"));
    }

    let config = cli.config();
    let lister = LsblkLister::new(SystemExecutor).with_program(config.lsblk.clone());
    let manager = PartitionManager::with_config(SystemExecutor, lister, config);

    match cli.command {
        Command::List => {
            let partitions = Aggregator::new(&manager)
                .list_partitions()
                .context("failed to list devices")?;
            print_partitions(&partitions);
        }
        Command::Devices => {
            let devices = Aggregator::new(&manager)
                .list_device_partitions()
                .context("failed to list devices")?;
            for device in devices {
                let size = device
                    .size
                    .map(|s| format!("{s:#}"))
                    .unwrap_or_else(|| "?".to_owned());
                println!(
                    "{} ({}, {}, {}) {}",
                    device.name,
                    device.kind,
                    device.table_type,
                    size,
                    device.model.as_deref().unwrap_or_default()
                );
                print_partitions(&device.partitions);
                println!();
            }
        }
        Command::Show { device } => {
            let table = manager
                .table(&device)
                .with_context(|| format!("failed to read partition table of {device}"))?;
            println!("Table: {}", table.table_type);
            if let Some(size) = table.disk_size {
                println!("Size:  {size:#}");
            }
            println!(
                "Sector size (logical/physical): {}/{}",
                table.logical_sector_size, table.physical_sector_size
            );
            print_partitions(&table.partitions);
            for rejected in &table.rejected {
                eprintln!("skipped: {rejected}");
            }
        }
        Command::Free { device } => {
            let (extents, total) = manager
                .unused_partitions(&device)
                .with_context(|| format!("failed to read free space of {device}"))?;
            print_partitions(&extents);
            println!("Unused: {total:#}");
        }
        Command::Add {
            device,
            name,
            start,
            end,
            ..
        } => {
            let partition = manager
                .add_partition(&device, &name, &start, &end)
                .with_context(|| format!("failed to add partition {name} to {device}"))?;
            print_partitions(&[partition]);
        }
        Command::Rm { device, number } => {
            manager
                .delete_partition(&device, &number)
                .with_context(|| format!("failed to remove partition {number} from {device}"))?;
            println!("removed partition {number} from {device}");
        }
        Command::Udev { device } => {
            let mut properties = manager
                .udev_info(&device)
                .with_context(|| format!("failed to query udev for {device}"))?
                .into_iter()
                .collect::<Vec<_>>();
            properties.sort();
            for (key, value) in properties {
                println!("{key}={value}");
            }
        }
        Command::Kind { device } => {
            let is_partition = manager
                .is_partition(&device)
                .with_context(|| format!("failed to look up {device}"))?;
            let table = manager.table_type(&device).ok();
            println!(
                "{device}: {}{}",
                if is_partition { "partition" } else { "not a partition" },
                table.map(|t| format!(", table {t}")).unwrap_or_default()
            );
            let details = manager
                .lister()
                .list_devices_detail(Some(&device))
                .with_context(|| format!("failed to look up {device}"))?;
            for detail in details {
                if let Some(fstype) = &detail.fstype {
                    println!("filesystem: {fstype}");
                }
                if let Some(mountpoint) = &detail.mountpoint {
                    println!("mounted on: {mountpoint}");
                }
            }
        }
    }

    Ok(())
}

fn print_partitions(partitions: &[Partition]) {
    println!(
        "{:<7} {:<14} {:<14} {:<14} {:<15} {:<24} Flags",
        "Number", "Start", "End", "Size", "File system", "Name"
    );
    for p in partitions {
        let fs = p
            .fs()
            .map_or_else(|| p.filesystem.to_string(), |fs| fs.to_string());
        println!(
            "{:<7} {:<14} {:<14} {:<14} {:<15} {:<24} {}",
            p.number,
            p.start,
            p.end,
            p.size,
            fs,
            p.name,
            p.flags().join(", ")
        );
    }
}
