//! Block-device enumeration.
//!
//! Drive records arrive from an OS collaborator behind the
//! [`DriveSource`] trait; the bundled [`LsblkSource`] shells out to
//! `lsblk --json --bytes`. Records keep the collaborator's shape and
//! are converted to tree nodes by the factory.

use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from block-device enumeration.
#[derive(Debug, Error)]
pub enum DriveError {
    /// The enumeration command could not be spawned.
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The enumeration command exited unsuccessfully.
    #[error("{command} exited with {status}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
    },

    /// The report could not be parsed.
    #[error("Malformed drive report: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },
}

/// One block-device record as reported by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveRecord {
    /// Device name (e.g. `nvme0n1`, `sda1`).
    pub name: String,
    /// Device type (`disk`, `part`, `rom`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Physical transport (`nvme`, `usb`, `sata`, ...), when reported.
    #[serde(default)]
    pub tran: Option<String>,
    /// Filesystem type, when formatted.
    #[serde(default)]
    pub fstype: Option<String>,
    /// Total capacity in bytes.
    #[serde(default, deserialize_with = "number_or_string")]
    pub size: Option<u64>,
    /// Available bytes on the mounted filesystem.
    #[serde(default, deserialize_with = "number_or_string")]
    pub fsavail: Option<u64>,
    /// Mountpoint, when mounted.
    #[serde(default)]
    pub mountpoint: Option<String>,
    /// Nested devices (partitions of a disk).
    #[serde(default)]
    pub children: Vec<DriveRecord>,
}

#[derive(Debug, Deserialize)]
struct LsblkReport {
    blockdevices: Vec<DriveRecord>,
}

/// lsblk emits numeric columns as numbers or quoted strings depending
/// on its version; accept both.
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Str(s)) => s.trim().parse().ok(),
    })
}

/// Parse an `lsblk --json --bytes` report.
pub fn parse_lsblk(json: &str) -> Result<Vec<DriveRecord>, DriveError> {
    let report: LsblkReport = serde_json::from_str(json)?;
    Ok(report.blockdevices)
}

/// Flatten nested records into one list, depth first, propagating the
/// parent's transport to children that do not report their own.
pub fn flatten_records(records: Vec<DriveRecord>) -> Vec<DriveRecord> {
    let mut flat = Vec::new();
    for record in records {
        flatten_into(record, None, &mut flat);
    }
    flat
}

fn flatten_into(mut record: DriveRecord, inherited: Option<String>, out: &mut Vec<DriveRecord>) {
    if record.tran.is_none() {
        record.tran = inherited.clone();
    }
    let tran = record.tran.clone();
    let children = std::mem::take(&mut record.children);
    out.push(record);
    for child in children {
        flatten_into(child, tran.clone(), out);
    }
}

/// A source of block-device records.
pub trait DriveSource: Send + Sync {
    /// Enumerate the current block devices, flattened.
    fn drives(&self) -> Result<Vec<DriveRecord>, DriveError>;
}

/// Drive enumeration backed by the `lsblk` command.
#[derive(Debug, Clone)]
pub struct LsblkSource {
    command: PathBuf,
}

impl LsblkSource {
    const COLUMNS: &'static str = "NAME,TYPE,TRAN,FSTYPE,SIZE,FSAVAIL,MOUNTPOINT";

    /// Use `lsblk` from `PATH`.
    pub fn new() -> Self {
        Self {
            command: PathBuf::from("lsblk"),
        }
    }

    /// Use a specific executable.
    pub fn with_command(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for LsblkSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveSource for LsblkSource {
    fn drives(&self) -> Result<Vec<DriveRecord>, DriveError> {
        let output = Command::new(&self.command)
            .args(["--json", "--bytes", "--output", Self::COLUMNS])
            .output()
            .map_err(|e| DriveError::Spawn {
                command: self.command.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(DriveError::CommandFailed {
                command: self.command.display().to_string(),
                status: output.status,
            });
        }

        let records = parse_lsblk(&String::from_utf8_lossy(&output.stdout))?;
        let flat = flatten_records(records);
        debug!(count = flat.len(), "enumerated block devices");
        Ok(flat)
    }
}
