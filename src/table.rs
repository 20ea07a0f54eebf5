use crate::{DEFAULT_SECTOR_SIZE, ParseError, Partition, TableType, parse_size};
use byte_unit::Byte;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, warn};

/// Number, start, end, size, filesystem, name, flags.
pub const MIN_FIELDS: usize = 7;

/// Everything `parted print` reports about one device.
#[derive(Debug)]
pub struct PartitionTable {
    pub model: Option<Arc<str>>,
    pub disk_size: Option<Byte>,
    pub logical_sector_size: u64,
    pub physical_sector_size: u64,
    pub table_type: TableType,
    pub partitions: Vec<Partition>,
    /// Rows that could not be decomposed, in output order.
    pub rejected: Vec<ParseError>,
}

impl PartitionTable {
    pub fn get(&self, number: &str) -> Option<&Partition> {
        self.partitions
            .iter()
            .find(|p| !p.is_free() && p.number.as_ref() == number)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Partition> {
        self.partitions
            .iter()
            .find(|p| !p.is_free() && p.name.as_ref() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Number,
    Start,
    End,
    Size,
    Kind,
    FileSystem,
    Name,
    Flags,
}

const LABELS: [(&str, Field); 8] = [
    ("Number", Field::Number),
    ("Start", Field::Start),
    ("End", Field::End),
    ("Size", Field::Size),
    ("Type", Field::Kind),
    ("File system", Field::FileSystem),
    ("Name", Field::Name),
    ("Flags", Field::Flags),
];

fn label_offset(header: &str, label: &str) -> Option<usize> {
    header.match_indices(label).map(|(at, _)| at).find(|&at| {
        let before = header[..at].chars().next_back();
        let after = header[at + label.len()..].chars().next();
        before.is_none_or(char::is_whitespace) && after.is_none_or(char::is_whitespace)
    })
}

/// Byte offsets of the header labels; `parted` left-aligns every cell under
/// its label and pads the gaps with spaces.
#[derive(Debug, Clone)]
struct Columns(Vec<(Field, usize)>);

impl Columns {
    fn from_header(line: &str) -> Option<Self> {
        let mut columns = LABELS
            .iter()
            .filter_map(|&(label, field)| label_offset(line, label).map(|at| (field, at)))
            .collect::<Vec<_>>();
        columns.sort_by_key(|&(_, at)| at);

        let has = |wanted| columns.iter().any(|&(field, _)| field == wanted);
        (has(Field::Number) && has(Field::Start) && has(Field::End) && has(Field::Size))
            .then_some(Self(columns))
    }

    /// `None` when the row does not line up with the header, e.g. output
    /// that was re-spaced on its way here.
    fn slice<'a>(&self, row: &'a str) -> Option<Vec<(Field, &'a str)>> {
        let mut cells = Vec::with_capacity(self.0.len());
        for (i, &(field, start)) in self.0.iter().enumerate() {
            if start >= row.len() {
                cells.push((field, ""));
                continue;
            }
            if start > 0 && !row.get(..start)?.ends_with(char::is_whitespace) {
                return None;
            }
            let end = self
                .0
                .get(i + 1)
                .map_or(row.len(), |&(_, next)| next.min(row.len()));
            cells.push((field, row.get(start..end)?.trim()));
        }
        Some(cells)
    }
}

fn from_cells(line_no: usize, line: &str, cells: &[(Field, &str)]) -> Result<Partition, ParseError> {
    let mut partition = Partition::default();
    for &(field, cell) in cells {
        let slot = match field {
            Field::Number => &mut partition.number,
            Field::Start => &mut partition.start,
            Field::End => &mut partition.end,
            Field::Size => &mut partition.size,
            Field::Kind => &mut partition.kind,
            Field::FileSystem => &mut partition.filesystem,
            Field::Name => &mut partition.name,
            Field::Flags => &mut partition.flags,
        };
        *slot = cell.into();
    }

    if partition.start.is_empty() || partition.end.is_empty() || partition.size.is_empty() {
        return Err(ParseError::ShortRow {
            line: line_no,
            expected: cells.len(),
            found: cells.iter().filter(|(_, cell)| !cell.is_empty()).count(),
            text: line.trim().to_owned(),
        });
    }
    Ok(partition)
}

fn from_tokens(line_no: usize, line: &str) -> Result<Partition, ParseError> {
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if tokens.len() < MIN_FIELDS {
        return Err(ParseError::ShortRow {
            line: line_no,
            expected: MIN_FIELDS,
            found: tokens.len(),
            text: line.trim().to_owned(),
        });
    }

    Ok(Partition {
        number: tokens[0].into(),
        start: tokens[1].into(),
        end: tokens[2].into(),
        size: tokens[3].into(),
        filesystem: tokens[4].into(),
        name: tokens[5].into(),
        flags: tokens[MIN_FIELDS - 1..].iter().join(" ").into(),
        kind: "".into(),
    })
}

/// Line-by-line state shared by the table and free-space readers.
#[derive(Debug, Default)]
pub(crate) struct Reader {
    model: Option<Arc<str>>,
    disk_size: Option<String>,
    sector_sizes: Option<(u64, u64)>,
    table_type: Option<TableType>,
    header_seen: bool,
    columns: Option<Columns>,
    pub(crate) rejected: Vec<ParseError>,
}

impl Reader {
    /// Consumes preamble and header lines; returns `false` for anything that
    /// may be a table row.
    pub(crate) fn observe(&mut self, line: &str) -> bool {
        if self.header_seen {
            return false;
        }
        let trimmed = line.trim();
        if trimmed.contains("Number") {
            self.header_seen = true;
            self.columns = Columns::from_header(line);
            debug!(columns = ?self.columns, "found table header");
        } else if let Some(model) = trimmed.strip_prefix("Model:") {
            self.model = Some(model.trim().into());
        } else if let Some(table) = trimmed.strip_prefix("Partition Table:") {
            self.table_type = Some(TableType::from_reported(table));
        } else if let Some(sizes) = trimmed.strip_prefix("Sector size") {
            self.sector_sizes = sizes
                .split_once(':')
                .and_then(|(_, sizes)| sizes.trim().split_once('/'))
                .and_then(|(logical, physical)| {
                    Some((
                        parse_size(logical, 1).ok()?.as_u64(),
                        parse_size(physical, 1).ok()?.as_u64(),
                    ))
                });
        } else if let Some(disk) = trimmed.strip_prefix("Disk ")
            && !disk.starts_with("Flags")
            && let Some((_, size)) = disk.rsplit_once(':')
        {
            self.disk_size = Some(size.trim().to_owned());
        }
        true
    }

    pub(crate) fn logical_sector_size(&self) -> u64 {
        self.sector_sizes.map_or(DEFAULT_SECTOR_SIZE, |(logical, _)| logical)
    }

    pub(crate) fn read_row(&self, line_no: usize, line: &str) -> Result<Partition, ParseError> {
        match self.columns.as_ref().and_then(|c| c.slice(line)) {
            Some(cells) => from_cells(line_no, line, &cells),
            None => from_tokens(line_no, line),
        }
    }

    pub(crate) fn reject(&mut self, error: ParseError) {
        warn!(%error, "rejected partition table row");
        self.rejected.push(error);
    }

    pub(crate) fn finish(mut self, partitions: Vec<Partition>) -> PartitionTable {
        let logical = self.logical_sector_size();
        let disk_size = match self.disk_size.take().map(|size| parse_size(&size, logical)) {
            Some(Ok(size)) => Some(size),
            Some(Err(error)) => {
                self.reject(error);
                None
            }
            None => None,
        };

        PartitionTable {
            model: self.model,
            disk_size,
            logical_sector_size: logical,
            physical_sector_size: self.sector_sizes.map_or(logical, |(_, physical)| physical),
            table_type: self.table_type.unwrap_or(TableType::Unknown),
            partitions,
            rejected: self.rejected,
        }
    }
}

/// Decomposes the output of `parted print` into rows.
///
/// Quote characters are stripped first. Rows are only read after the
/// `Number` header line; a row that cannot be decomposed lands in
/// [`PartitionTable::rejected`] and does not stop the rest of the table.
pub fn parse_table(output: &str) -> PartitionTable {
    let output = output.replace('"', "");
    let mut reader = Reader::default();
    let mut partitions = Vec::new();

    for (i, line) in output.lines().enumerate() {
        if reader.observe(line) || line.trim().is_empty() {
            continue;
        }
        match reader.read_row(i + 1, line) {
            Ok(partition) => partitions.push(partition),
            Err(error) => reader.reject(error),
        }
    }

    reader.finish(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPT: &str = "\
Model: ATA VBOX HARDDISK (scsi)
Disk /dev/sdb: 10737418240B
Sector size (logical/physical): 512B/4096B
Partition Table: gpt
Disk Flags:

Number  Start       End         Size        File system     Name     Flags
 1      1048576B    106954751B  105906176B  fat32           EFI      boot, esp
 2      106954752B  2254438399B 2147483648B linux-swap(v1)  swap     swap
 3      2254438400B 5368709119B 3114270720B                 data
 4      5368709120B 6442450943B 1073741824B

";

    #[test]
    fn reads_aligned_parted_output() {
        let table = parse_table(GPT);

        assert!(table.rejected.is_empty(), "{:?}", table.rejected);
        assert_eq!(table.model.as_deref(), Some("ATA VBOX HARDDISK (scsi)"));
        assert_eq!(table.disk_size.map(|b| b.as_u64()), Some(10_737_418_240));
        assert_eq!(table.logical_sector_size, 512);
        assert_eq!(table.physical_sector_size, 4096);
        assert_eq!(table.table_type, TableType::Gpt);
        assert_eq!(table.partitions.len(), 4);

        let efi = &table.partitions[0];
        assert_eq!(efi.number.as_ref(), "1");
        assert_eq!(efi.start.as_ref(), "1048576B");
        assert_eq!(efi.end.as_ref(), "106954751B");
        assert_eq!(efi.size.as_ref(), "105906176B");
        assert_eq!(efi.filesystem.as_ref(), "fat32");
        assert_eq!(efi.name.as_ref(), "EFI");
        assert_eq!(efi.flags.as_ref(), "boot, esp");

        let data = &table.partitions[2];
        assert_eq!(data.filesystem.as_ref(), "");
        assert_eq!(data.name.as_ref(), "data");
        assert_eq!(data.flags.as_ref(), "");

        let blank = &table.partitions[3];
        assert_eq!(blank.number.as_ref(), "4");
        assert_eq!(blank.name.as_ref(), "");
        assert_eq!(table.get("2").map(|p| p.name.as_ref()), Some("swap"));
        assert_eq!(table.find_by_name("data").map(|p| p.number.as_ref()), Some("3"));
    }

    #[test]
    fn reads_msdos_type_column() {
        let table = parse_table(
            "\
Partition Table: msdos

Number  Start   End     Size    Type      File system  Flags
 1      1049kB  538MB   537MB   primary   fat32        boot
 5      539MB   1000MB  461MB   logical   ext4
",
        );

        assert!(table.rejected.is_empty(), "{:?}", table.rejected);
        assert_eq!(table.table_type, TableType::Msdos);
        assert_eq!(table.partitions[0].kind.as_ref(), "primary");
        assert_eq!(table.partitions[0].filesystem.as_ref(), "fat32");
        assert_eq!(table.partitions[0].flags.as_ref(), "boot");
        assert_eq!(table.partitions[1].kind.as_ref(), "logical");
        assert_eq!(table.partitions[1].name.as_ref(), "");
    }

    #[test]
    fn reads_whitespace_rows_verbatim() {
        let output = "\
Number Start End Size File system Name Flags
1 2048s 206847s 204800s fat32 EFI boot
2 206848s 2303999s 2097152s ext4 root legacy_boot
3 2304000s 4401151s 2097152s xfs home lvm
";
        let table = parse_table(output);

        assert_eq!(table.partitions.len(), 3);
        for (partition, line) in table.partitions.iter().zip(output.lines().skip(1)) {
            let tokens = line.split_whitespace().collect::<Vec<_>>();
            let fields = [
                partition.number.as_ref(),
                partition.start.as_ref(),
                partition.end.as_ref(),
                partition.size.as_ref(),
                partition.filesystem.as_ref(),
                partition.name.as_ref(),
                partition.flags.as_ref(),
            ];
            assert_eq!(fields.as_slice(), tokens.as_slice());
        }
    }

    #[test]
    fn rejoins_trailing_flag_tokens() {
        let table = parse_table(
            "Number Start End Size File system Name Flags\n\
             1 2048s 206847s 204800s fat32 EFI boot, esp, no_automount\n",
        );
        assert_eq!(table.partitions[0].flags.as_ref(), "boot, esp, no_automount");
        assert_eq!(
            table.partitions[0].flags().collect::<Vec<_>>(),
            ["boot", "esp", "no_automount"]
        );
    }

    #[test]
    fn short_rows_are_rejected_without_losing_the_rest() {
        let table = parse_table(
            "Number Start End Size File system Name Flags\n\
             1 2048s 206847s 204800s fat32 EFI boot\n\
             2 206848s\n\
             3 2304000s 4401151s 2097152s xfs home lvm\n",
        );

        assert_eq!(table.partitions.len(), 2);
        assert_eq!(table.partitions[1].number.as_ref(), "3");
        assert!(matches!(
            table.rejected.as_slice(),
            [ParseError::ShortRow { line: 3, expected: MIN_FIELDS, found: 2, .. }]
        ));
    }

    #[test]
    fn short_aligned_rows_are_rejected() {
        let table = parse_table(
            "\
Number  Start   End     Size    File system  Name  Flags
 1      1049kB  538MB   537MB   fat32        EFI   boot
 2      538MB
",
        );
        assert_eq!(table.partitions.len(), 1);
        assert!(matches!(
            table.rejected.as_slice(),
            [ParseError::ShortRow { line: 3, found: 2, .. }]
        ));
    }

    #[test]
    fn strips_quotes_and_ignores_lines_before_the_header() {
        let table = parse_table(
            "1 this line is not a row at all\n\
             Number Start End Size File system Name Flags\n\
             1 2048s 206847s 204800s ext4 \"vol-1\" lvm\n",
        );
        assert!(table.rejected.is_empty());
        assert_eq!(table.partitions.len(), 1);
        assert_eq!(table.partitions[0].name.as_ref(), "vol-1");
    }

    #[test]
    fn empty_output_has_no_rows() {
        let table = parse_table("");
        assert!(table.partitions.is_empty());
        assert!(table.rejected.is_empty());
        assert_eq!(table.table_type, TableType::Unknown);
        assert_eq!(table.disk_size, None);
        assert_eq!(table.logical_sector_size, DEFAULT_SECTOR_SIZE);
    }

    #[test]
    fn disk_size_in_sectors_uses_the_logical_sector_size() {
        let table = parse_table(
            "Disk /dev/nvme0n1: 2000s\n\
             Sector size (logical/physical): 4096B/4096B\n",
        );
        assert_eq!(table.disk_size.map(|b| b.as_u64()), Some(2000 * 4096));
    }
}
