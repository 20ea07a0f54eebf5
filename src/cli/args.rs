use clap::{Parser, Subcommand};
use partkit::{Config, TableType, TableUnit};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    #[arg(long, short = 'D')]
    /// Write logs to partkit.log instead of stderr
    pub debug: bool,
    #[arg(long, default_value = "parted")]
    /// The parted binary to run
    pub parted: String,
    #[arg(long, default_value = "udevadm")]
    /// The udevadm binary to run
    pub udevadm: String,
    #[arg(long, default_value = "lsblk")]
    /// The lsblk binary to run
    pub lsblk: String,
    #[arg(long, short, default_value = "B")]
    /// Unit partition tables are printed in (B or s)
    pub unit: TableUnit,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the partitions of every device that has a partition table
    List,
    /// List partitioned devices with their partitions
    Devices,
    /// Print the partition table of a device
    Show { device: String },
    /// Print the unallocated extents of a device
    Free { device: String },
    /// Create and name a partition
    Add {
        device: String,
        name: String,
        start: String,
        end: String,
        #[arg(long)]
        /// Write this partition table first if the device has none
        init_label: Option<TableType>,
        #[arg(long, default_value = "primary")]
        /// First argument passed to mkpart
        part_type: String,
    },
    /// Remove a partition by number
    Rm { device: String, number: String },
    /// Print the udev properties of a device
    Udev { device: String },
    /// Tell whether a device is a partition
    Kind { device: String },
}

impl Command {
    pub fn mutates(&self) -> bool {
        matches!(self, Self::Add { .. } | Self::Rm { .. })
    }
}

impl Cli {
    pub fn config(&self) -> Config {
        let mut config = Config {
            parted: self.parted.as_str().into(),
            udevadm: self.udevadm.as_str().into(),
            lsblk: self.lsblk.as_str().into(),
            unit: self.unit,
            ..Config::default()
        };
        if let Command::Add {
            init_label,
            part_type,
            ..
        } = &self.command
        {
            config.init_label = init_label.clone();
            config.part_type = part_type.as_str().into();
        }
        config
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
