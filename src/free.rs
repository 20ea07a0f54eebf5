use crate::{FREE_SPACE, ParseError, Partition, parse_size, table::Reader};
use byte_unit::Byte;
use tracing::debug;

#[derive(Debug)]
pub struct FreeSpace {
    /// Unallocated extents in device order. Never numbered, named or flagged.
    pub extents: Vec<Partition>,
    /// Sum of the extents' sizes.
    pub total: Byte,
    pub rejected: Vec<ParseError>,
}

/// Picks the `Free Space` rows out of `parted print free` output.
///
/// Rows are found by that phrase alone, so a missing header only changes how
/// they are split. A row that cannot be split or whose size cannot be read
/// is left out of both the extents and the total.
pub fn parse_free(output: &str) -> FreeSpace {
    let output = output.replace('"', "");
    let mut reader = Reader::default();
    let mut extents = Vec::new();
    let mut total: u64 = 0;

    for (i, line) in output.lines().enumerate() {
        if !line.contains(FREE_SPACE) {
            reader.observe(line);
            continue;
        }

        let row = match reader.read_row(i + 1, line) {
            Ok(row) => row,
            Err(error) => {
                reader.reject(error);
                continue;
            }
        };
        let size = match parse_size(&row.size, reader.logical_sector_size()) {
            Ok(size) => size,
            Err(error) => {
                reader.reject(error);
                continue;
            }
        };

        debug!(start = %row.start, end = %row.end, size = size.as_u64(), "free extent");
        total = total.saturating_add(size.as_u64());
        extents.push(Partition {
            start: row.start,
            end: row.end,
            size: row.size,
            filesystem: FREE_SPACE.into(),
            ..Default::default()
        });
    }

    FreeSpace {
        extents,
        total: Byte::from_u64(total),
        rejected: reader.rejected,
    }
}
