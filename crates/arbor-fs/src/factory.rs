//! Node factory: attribute probing and variant construction.
//!
//! Unifies the two child sources, native directory entries and
//! block-device records, into one tree shape.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use arbor_core::{BrowseConfig, DriveInfo, DriveKind, ListError, NodeAttrs, PathNode, Transport};

use crate::drives::DriveRecord;

/// Build a regular node for a filesystem path, probing its attributes.
///
/// Symbolic links are reported as links; with `follow_symlinks` the
/// directory/size attributes describe the link target instead of the
/// link itself. The creation time stays `None` when the platform does
/// not report one or the entry cannot be read.
pub fn node_from_path(
    path: &Path,
    config: &BrowseConfig,
    parent: Option<&Arc<PathNode>>,
) -> Result<Arc<PathNode>, ListError> {
    let symlink_meta = fs::symlink_metadata(path).map_err(|e| ListError::io(path, e))?;
    let is_link = symlink_meta.is_symlink();

    // Attribute source: the link target when following, else the entry.
    let meta = if is_link && config.follow_symlinks {
        fs::metadata(path).unwrap_or(symlink_meta)
    } else {
        symlink_meta
    };

    let is_dir = meta.is_dir();
    let is_readable = if is_dir {
        probe_dir_readable(path)
    } else {
        probe_file_readable(&meta)
    };

    let attrs = NodeAttrs {
        is_dir,
        is_link,
        is_hidden: is_hidden_name(path),
        is_readable,
        len: if is_dir { None } else { Some(meta.len()) },
        created: if is_readable { meta.created().ok() } else { None },
    };

    Ok(PathNode::regular(path, attrs, parent))
}

/// Build a drive node from a block-device record.
///
/// Mounted devices use their mountpoint as the node path and list the
/// mounted filesystem; unmounted devices use the device path and are
/// leaves. Returns `None` for device types the tree does not model
/// (loop devices, device-mapper targets, ...).
pub fn drive_node(record: &DriveRecord, parent: Option<&Arc<PathNode>>) -> Option<Arc<PathNode>> {
    let kind = drive_kind_from_report(&record.kind)?;
    let transport = record
        .tran
        .as_deref()
        .map(Transport::from_report)
        .unwrap_or(Transport::Other);
    let mounted = record.mountpoint.is_some();

    let info = DriveInfo {
        mounted,
        kind,
        transport,
        total: record.size.unwrap_or(0),
        available: record.fsavail.unwrap_or(0),
        fs_type: record.fstype.as_deref().map(Into::into),
    };

    let path = match &record.mountpoint {
        Some(mp) => mp.clone(),
        None => format!("/dev/{}", record.name),
    };

    Some(PathNode::drive(path, info, parent))
}

fn drive_kind_from_report(kind: &str) -> Option<DriveKind> {
    match kind {
        "disk" => Some(DriveKind::Disk),
        "part" | "partition" => Some(DriveKind::Partition),
        "rom" => Some(DriveKind::Rom),
        _ => None,
    }
}

fn is_hidden_name(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// A directory is readable when it can actually be opened for listing.
fn probe_dir_readable(path: &Path) -> bool {
    fs::read_dir(path).is_ok()
}

#[cfg(unix)]
fn probe_file_readable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o444 != 0
}

#[cfg(not(unix))]
fn probe_file_readable(_meta: &fs::Metadata) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_node_attributes() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("note.txt");
        fs::write(&file, "hello").unwrap();

        let node = node_from_path(&file, &BrowseConfig::new(), None).unwrap();
        assert!(!node.is_dir());
        assert!(!node.is_link());
        assert!(!node.is_hidden());
        assert!(node.is_readable());
        assert_eq!(node.attrs().len, Some(5));
        assert!(node.is_leaf());
    }

    #[test]
    fn directory_node_attributes() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("sub");
        fs::create_dir(&dir).unwrap();

        let node = node_from_path(&dir, &BrowseConfig::new(), None).unwrap();
        assert!(node.is_dir());
        assert_eq!(node.attrs().len, None);
        assert!(!node.is_leaf());
    }

    #[test]
    fn hidden_entries_are_flagged() {
        let temp = TempDir::new().unwrap();
        let hidden = temp.path().join(".config");
        fs::create_dir(&hidden).unwrap();

        let node = node_from_path(&hidden, &BrowseConfig::new(), None).unwrap();
        assert!(node.is_hidden());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_flagged() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target.txt");
        fs::write(&target, "x").unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let node = node_from_path(&link, &BrowseConfig::new(), None).unwrap();
        assert!(node.is_link());
    }

    #[test]
    fn missing_path_maps_to_not_found() {
        let temp = TempDir::new().unwrap();
        let gone = temp.path().join("gone");
        let err = node_from_path(&gone, &BrowseConfig::new(), None).unwrap_err();
        assert!(matches!(err, ListError::NotFound { .. }));
    }

    #[test]
    fn unmounted_record_becomes_leaf_drive() {
        let record = DriveRecord {
            name: "sdb1".to_string(),
            kind: "part".to_string(),
            tran: Some("usb".to_string()),
            fstype: Some("vfat".to_string()),
            size: Some(8 << 30),
            fsavail: None,
            mountpoint: None,
            children: Vec::new(),
        };
        let node = drive_node(&record, None).unwrap();
        assert!(node.is_leaf());
        assert_eq!(node.path(), Path::new("/dev/sdb1"));
        let info = node.drive_info().unwrap();
        assert_eq!(info.kind, DriveKind::Partition);
        assert_eq!(info.transport, Transport::Usb);
        assert!(!info.mounted);
    }

    #[test]
    fn mounted_record_uses_mountpoint() {
        let record = DriveRecord {
            name: "nvme0n1p2".to_string(),
            kind: "part".to_string(),
            tran: Some("nvme".to_string()),
            fstype: Some("ext4".to_string()),
            size: Some(512 << 30),
            fsavail: Some(100 << 30),
            mountpoint: Some("/".to_string()),
            children: Vec::new(),
        };
        let node = drive_node(&record, None).unwrap();
        assert!(!node.is_leaf());
        assert_eq!(node.path(), Path::new("/"));
        assert_eq!(node.drive_info().unwrap().used(), 412 << 30);
    }

    #[test]
    fn unmodelled_device_types_are_skipped() {
        let record = DriveRecord {
            name: "loop0".to_string(),
            kind: "loop".to_string(),
            tran: None,
            fstype: None,
            size: Some(4096),
            fsavail: None,
            mountpoint: None,
            children: Vec::new(),
        };
        assert!(drive_node(&record, None).is_none());
    }
}
