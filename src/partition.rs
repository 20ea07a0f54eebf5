use std::sync::Arc;
use strum::{Display, EnumString};

/// The filesystem cell `parted` prints for unallocated extents.
pub const FREE_SPACE: &str = "Free Space";

/// One row of a partition table, as printed by `parted`.
///
/// Every cell is kept verbatim; interpretation (sizes, flags, filesystem) is
/// done on demand by the accessor methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub number: Arc<str>,
    pub start: Arc<str>,
    pub end: Arc<str>,
    pub size: Arc<str>,
    pub filesystem: Arc<str>,
    pub name: Arc<str>,
    pub flags: Arc<str>,
    /// The msdos `Type` column (`primary`, `logical`, ...). Empty for GPT.
    pub kind: Arc<str>,
}

impl Partition {
    /// Whether this row is an unallocated extent rather than a partition.
    pub fn is_free(&self) -> bool {
        self.number.is_empty() && self.filesystem.as_ref() == FREE_SPACE
    }

    pub fn fs(&self) -> Option<FileSystem> {
        if self.is_free() {
            return None;
        }
        self.filesystem.parse().ok()
    }

    /// The flag markers in the order `parted` printed them.
    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.flags
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags().any(|f| f == flag)
    }
}

#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum FileSystem {
    Btrfs,
    Exfat,
    Ext2,
    Ext3,
    Ext4,
    F2fs,
    Fat16,
    Fat32,
    Jfs,
    #[strum(serialize = "linux-swap(v1)", serialize = "linux-swap")]
    LinuxSwap,
    Ntfs,
    Xfs,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(number: &str, filesystem: &str, flags: &str) -> Partition {
        Partition {
            number: number.into(),
            filesystem: filesystem.into(),
            flags: flags.into(),
            ..Default::default()
        }
    }

    #[test]
    fn splits_flag_markers_in_order() {
        let p = row("1", "fat32", "boot, esp");
        assert_eq!(p.flags().collect::<Vec<_>>(), ["boot", "esp"]);
        assert!(p.has_flag("esp"));
        assert!(!p.has_flag("lvm"));
        assert_eq!(row("2", "", "").flags().count(), 0);
    }

    #[test]
    fn free_rows_have_no_filesystem() {
        let free = row("", FREE_SPACE, "");
        assert!(free.is_free());
        assert_eq!(free.fs(), None);

        let swap = row("3", "linux-swap(v1)", "swap");
        assert!(!swap.is_free());
        assert_eq!(swap.fs(), Some(FileSystem::LinuxSwap));
        assert_eq!(row("4", "ext4", "").fs(), Some(FileSystem::Ext4));
        assert_eq!(row("5", "", "").fs(), None);
    }
}
