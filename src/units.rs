use crate::ParseError;
use byte_unit::Byte;
use std::fmt;

pub const DEFAULT_SECTOR_SIZE: u64 = 512;

/// `parted` aligns percentage boundaries to this grain.
pub const ALIGNMENT_GRAIN: u64 = 1024 * 1024;

const KIB: u128 = 1024;
const PPM_PER_PERCENT: u128 = 10_000;
const WHOLE_DISK_PPM: u128 = 100 * PPM_PER_PERCENT;

fn multiplier(unit: &str, sector_size: u64) -> Option<u128> {
    Some(match unit {
        "" | "B" => 1,
        "s" => u128::from(sector_size),
        "k" | "K" | "kB" | "KB" | "KiB" => KIB,
        "M" | "MB" | "MiB" => KIB.pow(2),
        "G" | "GB" | "GiB" => KIB.pow(3),
        "T" | "TB" | "TiB" => KIB.pow(4),
        "P" | "PB" | "PiB" => KIB.pow(5),
        _ => return None,
    })
}

fn split_magnitude(text: &str) -> (&str, &str) {
    let at = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    text.split_at(at)
}

/// `digits * multiplier`, where `digits` may carry a decimal fraction.
/// Integer arithmetic throughout; the result is rounded to the nearest unit.
fn scaled(digits: &str, multiplier: u128) -> Option<u128> {
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if (int.is_empty() && frac.is_empty()) || frac.contains('.') {
        return None;
    }
    let mantissa: u128 = format!("{int}{frac}").parse().ok()?;
    let divisor = 10u128.checked_pow(u32::try_from(frac.len()).ok()?)?;
    let product = mantissa.checked_mul(multiplier)?;
    Some(product.checked_add(divisor / 2)? / divisor)
}

/// Parses a unit-tagged quantity such as `2048s`, `1049kB` or `10.7GB` into
/// bytes. Decimal and binary suffixes share the 1024-based table; `s` is
/// one logical sector.
pub fn parse_size(text: &str, sector_size: u64) -> Result<Byte, ParseError> {
    let text = text.trim();
    let (digits, unit) = split_magnitude(text);
    if digits.is_empty() {
        return Err(ParseError::InvalidSize(text.to_owned()));
    }
    let multiplier = multiplier(unit, sector_size).ok_or_else(|| ParseError::UnknownUnit {
        text: text.to_owned(),
        unit: unit.to_owned(),
    })?;
    scaled(digits, multiplier)
        .and_then(|bytes| u64::try_from(bytes).ok())
        .map(Byte::from_u64)
        .ok_or_else(|| ParseError::InvalidSize(text.to_owned()))
}

/// A partition boundary as accepted by `parted mkpart`.
///
/// Displays as the argument handed to `mkpart`: absolute positions in
/// bytes, so `parted` never applies its own reading of `MB` or of a bare
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Bytes from the start of the device.
    Offset(u64),
    /// Bytes back from the end of the device (`-1s`, `-1MiB`).
    FromEnd(u64),
    /// Parts per million of the device size (`50%`).
    Percent(u64),
}

impl Boundary {
    pub fn parse(text: &str, sector_size: u64) -> Result<Self, ParseError> {
        let text = text.trim();
        let invalid = || ParseError::InvalidBoundary(text.to_owned());

        if let Some(digits) = text.strip_suffix('%') {
            return scaled(digits, PPM_PER_PERCENT)
                .filter(|ppm| *ppm <= WHOLE_DISK_PPM)
                .and_then(|ppm| u64::try_from(ppm).ok())
                .map(Self::Percent)
                .ok_or_else(invalid);
        }
        if let Some(rest) = text.strip_prefix('-') {
            return parse_size(rest, sector_size)
                .map(|b| Self::FromEnd(b.as_u64()))
                .map_err(|_| invalid());
        }
        parse_size(text, sector_size)
            .map(|b| Self::Offset(b.as_u64()))
            .map_err(|_| invalid())
    }

    /// The byte offset this boundary designates on a device of `disk_size` bytes.
    pub fn resolve(self, disk_size: u64) -> u64 {
        match self {
            Self::Offset(bytes) => bytes,
            Self::FromEnd(bytes) => disk_size.saturating_sub(bytes),
            Self::Percent(ppm) => {
                let bytes = u128::from(disk_size) * u128::from(ppm) / WHOLE_DISK_PPM;
                u64::try_from(bytes).unwrap_or(disk_size)
            }
        }
    }

    /// How far the echoed value may drift from the request and still be the
    /// same boundary. `parted` stores inclusive end sectors and aligns
    /// percentages, so neither side round-trips exactly.
    pub fn tolerance(self, sector_size: u64) -> u64 {
        match self {
            Self::Percent(_) => ALIGNMENT_GRAIN.max(sector_size),
            Self::Offset(_) | Self::FromEnd(_) => sector_size,
        }
    }

    pub fn matches(self, echoed: u64, disk_size: u64, sector_size: u64) -> bool {
        self.resolve(disk_size).abs_diff(echoed) <= self.tolerance(sector_size)
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Offset(bytes) => write!(f, "{bytes}B"),
            Self::FromEnd(bytes) => write!(f, "-{bytes}B"),
            Self::Percent(ppm) => {
                let ppm = u128::from(ppm);
                let (whole, frac) = (ppm / PPM_PER_PERCENT, ppm % PPM_PER_PERCENT);
                if frac == 0 {
                    write!(f, "{whole}%")
                } else {
                    let frac = format!("{frac:04}");
                    write!(f, "{whole}.{}%", frac.trim_end_matches('0'))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(text: &str) -> u64 {
        parse_size(text, DEFAULT_SECTOR_SIZE)
            .map(|b| b.as_u64())
            .unwrap_or_else(|e| panic!("{text}: {e}"))
    }

    #[test]
    fn applies_unit_multipliers() {
        assert_eq!(bytes("512B"), 512);
        assert_eq!(bytes("4096"), 4096);
        assert_eq!(bytes("2048s"), 2048 * 512);
        assert_eq!(bytes("1049kB"), 1049 * 1024);
        assert_eq!(bytes("100MB"), 100 * 1024 * 1024);
        assert_eq!(bytes("1MiB"), 1024 * 1024);
        assert_eq!(bytes("1GB"), 1024 * 1024 * 1024);
        assert_eq!(bytes("2TiB"), 2 * 1024u64.pow(4));
    }

    #[test]
    fn keeps_fractions_exact() {
        assert_eq!(bytes("0.5kB"), 512);
        assert_eq!(bytes("10.7GB"), 11_489_037_517);
        assert_eq!(bytes("17.4kB"), 17_818);
    }

    #[test]
    fn sectors_follow_the_logical_sector_size() {
        let size = parse_size("8s", 4096).map(|b| b.as_u64()).ok();
        assert_eq!(size, Some(8 * 4096));
    }

    #[test]
    fn rejects_what_it_cannot_read() {
        assert!(matches!(
            parse_size("10XB", 512),
            Err(ParseError::UnknownUnit { unit, .. }) if unit == "XB"
        ));
        assert!(matches!(parse_size("", 512), Err(ParseError::InvalidSize(_))));
        assert!(matches!(parse_size("MB", 512), Err(ParseError::InvalidSize(_))));
        assert!(matches!(parse_size("1.2.3MB", 512), Err(ParseError::InvalidSize(_))));
    }

    #[test]
    fn resolves_boundaries_against_the_disk() {
        let disk = 10 * 1024 * 1024 * 1024;
        let parse = |text| Boundary::parse(text, 512).ok();

        assert_eq!(parse("1MiB"), Some(Boundary::Offset(1024 * 1024)));
        assert_eq!(parse("-1s"), Some(Boundary::FromEnd(512)));
        assert_eq!(parse("50%"), Some(Boundary::Percent(500_000)));
        assert_eq!(parse("101%"), None);
        assert_eq!(parse("-"), None);

        assert_eq!(Boundary::FromEnd(512).resolve(disk), disk - 512);
        assert_eq!(Boundary::Percent(500_000).resolve(disk), disk / 2);
        assert_eq!(Boundary::Percent(1_000_000).resolve(disk), disk);
    }

    #[test]
    fn end_boundaries_tolerate_the_inclusive_last_byte() {
        let disk = 1024 * 1024 * 1024;
        let end = Boundary::Offset(100 * 1024 * 1024);
        assert!(end.matches(100 * 1024 * 1024 - 1, disk, 512));
        assert!(!end.matches(101 * 1024 * 1024 - 1, disk, 512));

        // parted moves `0%` up to the first aligned sector
        assert!(Boundary::Percent(0).matches(1024 * 1024, disk, 512));
    }

    #[test]
    fn renders_mkpart_arguments_in_bytes() {
        let render = |text| Boundary::parse(text, 4096).map(|b| b.to_string()).ok();

        assert_eq!(render("1MB").as_deref(), Some("1048576B"));
        assert_eq!(render("100MiB").as_deref(), Some("104857600B"));
        assert_eq!(render("2048s").as_deref(), Some("8388608B"));
        assert_eq!(render("-1s").as_deref(), Some("-4096B"));
        assert_eq!(render("50%").as_deref(), Some("50%"));
        assert_eq!(render("12.5%").as_deref(), Some("12.5%"));
        assert_eq!(render("0.05%").as_deref(), Some("0.05%"));
    }

    #[test]
    fn oversized_quantities_are_invalid() {
        // the mantissa is exactly u128::MAX, so only the rounding step overflows
        let huge = "34028236692093846346337460743176821145.5B";
        assert!(matches!(parse_size(huge, 512), Err(ParseError::InvalidSize(_))));
        assert!(matches!(
            Boundary::parse(huge, 512),
            Err(ParseError::InvalidBoundary(_))
        ));
    }
}
