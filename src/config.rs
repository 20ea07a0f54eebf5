use crate::TableType;
use std::sync::Arc;
use strum::{Display, EnumString};

/// The unit tables are read in. Both round-trip exactly through
/// [`parse_size`](crate::parse_size), unlike parted's default compact unit.
#[derive(Display, EnumString, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TableUnit {
    #[default]
    #[strum(serialize = "B")]
    Bytes,
    #[strum(serialize = "s")]
    Sectors,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub parted: Arc<str>,
    pub udevadm: Arc<str>,
    pub lsblk: Arc<str>,
    pub unit: TableUnit,
    /// First argument of `mkpart`: the partition type on msdos tables, the
    /// initial name on GPT.
    pub part_type: Arc<str>,
    /// Label written to devices without a partition table before adding a
    /// partition. `None` refuses to initialize them.
    pub init_label: Option<TableType>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parted: "parted".into(),
            udevadm: "udevadm".into(),
            lsblk: "lsblk".into(),
            unit: TableUnit::default(),
            part_type: "primary".into(),
            init_label: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_use_parted_spelling() {
        assert_eq!(TableUnit::Bytes.to_string(), "B");
        assert_eq!(TableUnit::Sectors.to_string(), "s");
        assert_eq!("s".parse::<TableUnit>().ok(), Some(TableUnit::Sectors));
        assert!("MB".parse::<TableUnit>().is_err());
    }
}
