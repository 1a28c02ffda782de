//! Dataset / snapshot name validation and shell quoting
//!
//! Every name that ends up on a zfs or ssh command line passes through here first.

use regex::Regex;
use std::sync::LazyLock;

static DATASET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9]([a-zA-Z0-9._-]*[a-zA-Z0-9])?(/[a-zA-Z0-9]([a-zA-Z0-9._-]*[a-zA-Z0-9])?)*$",
    )
    .expect("dataset name regex is valid")
});

static SNAPSHOT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9._:-]*[a-zA-Z0-9])?$")
        .expect("snapshot name regex is valid")
});

const MAX_NAME_LEN: usize = 255;
const SHELL_METACHARACTERS: &[char] = &[
    ';', '|', '&', '$', '`', '"', '\'', '\\', '*', '?', '[', ']', '{', '}', '(', ')', '<', '>',
];

pub fn validate_dataset_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("dataset name cannot be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("dataset name too long (max {} characters)", MAX_NAME_LEN));
    }
    if name.contains(SHELL_METACHARACTERS) {
        return Err(format!("dataset name '{}' contains invalid characters", name));
    }
    if !DATASET_NAME.is_match(name) {
        return Err(format!("invalid dataset name format: '{}'", name));
    }
    Ok(())
}

pub fn validate_snapshot_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("snapshot name cannot be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("snapshot name too long (max {} characters)", MAX_NAME_LEN));
    }
    if name.contains(SHELL_METACHARACTERS) || name.contains(['/', '@']) {
        return Err(format!("snapshot name '{}' contains invalid characters", name));
    }
    if !SNAPSHOT_NAME.is_match(name) {
        return Err(format!("invalid snapshot name format: '{}'", name));
    }
    Ok(())
}

/// Single-quote an argument for a POSIX shell command line
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}
