use crate::{CommandExecutor, ParseError, Result};
use serde::{Deserialize, Deserializer};
use std::{fmt, sync::Arc};
use strum::EnumString;

/// `sdb` means `/dev/sdb`; anything with a slash is already a path.
pub fn device_path(device: &str) -> String {
    if device.contains('/') {
        device.to_owned()
    } else {
        format!("/dev/{device}")
    }
}

/// The format family of a device's partition table.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TableType {
    Gpt,
    #[strum(serialize = "msdos", serialize = "dos")]
    Msdos,
    Loop,
    Unknown,
    #[strum(default)]
    Other(String),
}

impl TableType {
    /// Interprets what `lsblk`/`parted` report; blank means no table.
    pub fn from_reported(reported: &str) -> Self {
        let reported = reported.trim();
        if reported.is_empty() {
            return Self::Unknown;
        }
        reported
            .parse()
            .unwrap_or_else(|_| Self::Other(reported.to_owned()))
    }

    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gpt => "gpt",
            Self::Msdos => "msdos",
            Self::Loop => "loop",
            Self::Unknown => "unknown",
            Self::Other(other) => other.as_str(),
        })
    }
}

/// What `lsblk` says a block device is.
#[derive(Debug, Clone, PartialEq, Eq, EnumString, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(from = "String")]
pub enum DeviceKind {
    Disk,
    Part,
    Crypt,
    Lvm,
    Mpath,
    Linear,
    Loop,
    Rom,
    #[strum(default)]
    Other(String),
}

impl DeviceKind {
    /// Devices that carry their own partition table.
    pub fn is_partitionable(&self) -> bool {
        matches!(self, Self::Disk | Self::Loop | Self::Mpath)
    }
}

impl From<String> for DeviceKind {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(Self::Other(value))
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disk => "disk",
            Self::Part => "part",
            Self::Crypt => "crypt",
            Self::Lvm => "lvm",
            Self::Mpath => "mpath",
            Self::Linear => "linear",
            Self::Loop => "loop",
            Self::Rom => "rom",
            Self::Other(other) => other.as_str(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceDetail {
    pub name: String,
    #[serde(rename = "pkname", default)]
    pub parent: Option<String>,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    #[serde(default, deserialize_with = "lenient_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub fstype: Option<String>,
    #[serde(default)]
    pub mountpoint: Option<String>,
}

/// Older `lsblk` releases print `--bytes` sizes as strings.
fn lenient_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Bytes(u64),
        Text(String),
    }

    Ok(match Option::<Size>::deserialize(deserializer)? {
        Some(Size::Bytes(bytes)) => Some(bytes),
        Some(Size::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

#[derive(Deserialize)]
struct Listing {
    blockdevices: Vec<DeviceDetail>,
}

pub fn parse_lsblk(output: &str) -> Result<Vec<DeviceDetail>, ParseError> {
    Ok(serde_json::from_str::<Listing>(output)?.blockdevices)
}

/// Enumerates block devices and reports their partition-table type.
pub trait DeviceLister {
    fn list_devices(&self) -> Result<Vec<String>>;
    /// All devices when `filter` is `None`, otherwise just that one.
    fn list_devices_detail(&self, filter: Option<&str>) -> Result<Vec<DeviceDetail>>;
    fn table_type(&self, device: &str) -> Result<TableType>;
}

impl<T: DeviceLister + ?Sized> DeviceLister for &T {
    fn list_devices(&self) -> Result<Vec<String>> {
        (**self).list_devices()
    }

    fn list_devices_detail(&self, filter: Option<&str>) -> Result<Vec<DeviceDetail>> {
        (**self).list_devices_detail(filter)
    }

    fn table_type(&self, device: &str) -> Result<TableType> {
        (**self).table_type(device)
    }
}

const LSBLK_COLUMNS: &str = "NAME,PKNAME,TYPE,SIZE,FSTYPE,MOUNTPOINT";

/// A [`DeviceLister`] backed by `lsblk`.
#[derive(Debug, Clone)]
pub struct LsblkLister<E> {
    executor: E,
    program: Arc<str>,
}

impl<E: CommandExecutor> LsblkLister<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            program: "lsblk".into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<Arc<str>>) -> Self {
        self.program = program.into();
        self
    }
}

impl<E: CommandExecutor> DeviceLister for LsblkLister<E> {
    fn list_devices(&self) -> Result<Vec<String>> {
        Ok(self
            .list_devices_detail(None)?
            .into_iter()
            .filter(|d| d.kind.is_partitionable())
            .map(|d| d.name)
            .collect())
    }

    fn list_devices_detail(&self, filter: Option<&str>) -> Result<Vec<DeviceDetail>> {
        let path = filter.map(device_path);
        let mut args = vec!["--json", "--bytes", "--list", "-o", LSBLK_COLUMNS];
        if let Some(path) = &path {
            args.extend(["--nodeps", path.as_str()]);
        }
        let output = self.executor.run(&self.program, &args)?;
        Ok(parse_lsblk(&output)?)
    }

    fn table_type(&self, device: &str) -> Result<TableType> {
        let path = device_path(device);
        let output = self.executor.run(
            &self.program,
            &["--nodeps", "--noheadings", "-o", "PTTYPE", &path],
        )?;
        Ok(TableType::from_reported(&output))
    }
}
