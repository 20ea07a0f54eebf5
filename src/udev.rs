use std::collections::HashMap;

/// Parses `udevadm info --query=property` output. Lines without `=` are
/// dropped; a repeated key keeps its last value.
pub fn parse_udev(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}
