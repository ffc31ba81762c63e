// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The device entity and the admission policy deciding which block
//! devices the daemon takes ownership of.

use std::path::{Path, PathBuf};

use crate::engine::{
    mountpoint,
    tables::MountTable,
    types::{DeviceInfo, DeviceKind},
    udev::{
        CDROM_MEDIA_KEY, CRYPTO_FS_TYPE, FS_TYPE_KEY, FS_USAGE_KEY, ID_TYPE_KEY,
        LVM_MEMBER_FS_TYPE, SWAP_FS_TYPE,
    },
};

/// A removable volume owned by the daemon. Constructed only through
/// admission; a live Device always carries a non-empty mountpoint.
#[derive(Debug)]
pub struct Device {
    kind: DeviceKind,
    filesystem: String,
    devnode: PathBuf,
    mountpoint: PathBuf,
    info: DeviceInfo,
}

impl Device {
    /// Build a candidate Device from a udev snapshot, or reject it.
    ///
    /// Rejection causes, first match wins: no devnode, unusable
    /// filesystem, unclassifiable device kind, no media present,
    /// mountpoint synthesis failure. Registration is the caller's
    /// concern; nothing here touches the filesystem.
    pub fn candidate(
        info: DeviceInfo,
        admin_table: &MountTable,
        mount_root: &Path,
    ) -> Option<Device> {
        let devnode = info.devnode()?.to_path_buf();

        let filesystem = eligible_filesystem(&info)?.to_string();
        let kind = classify(&info)?;

        if !has_media(kind, &info) {
            return None;
        }

        // The administrator's choice of target wins over synthesis.
        let mountpoint = match admin_table.find(&info) {
            Some(entry) => entry.target().to_path_buf(),
            None => match mountpoint::synthesize(&info, mount_root) {
                Some(path) => path,
                None => {
                    error!(
                        "Couldn't make up a mountpoint name for {}",
                        devnode.display()
                    );
                    return None;
                }
            },
        };

        Some(Device {
            kind,
            filesystem,
            devnode,
            mountpoint,
            info,
        })
    }

    #[cfg(test)]
    pub fn for_tests(
        kind: DeviceKind,
        filesystem: &str,
        devnode: PathBuf,
        mountpoint: PathBuf,
        info: DeviceInfo,
    ) -> Device {
        Device {
            kind,
            filesystem: filesystem.to_string(),
            devnode,
            mountpoint,
            info,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn filesystem(&self) -> &str {
        &self.filesystem
    }

    pub fn devnode(&self) -> &Path {
        &self.devnode
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

/// Swap partitions are of no interest, and LVM/LUKS containers get a
/// separate udev event for every volume inside them.
fn eligible_filesystem(info: &DeviceInfo) -> Option<&str> {
    match info.property_value(FS_TYPE_KEY) {
        None | Some(SWAP_FS_TYPE) | Some(LVM_MEMBER_FS_TYPE) | Some(CRYPTO_FS_TYPE) => None,
        Some(fs) => Some(fs),
    }
}

fn classify(info: &DeviceInfo) -> Option<DeviceKind> {
    let idtype = info.property_value(ID_TYPE_KEY);
    if idtype == Some("cd") {
        return Some(DeviceKind::Optical);
    }
    match info.devtype() {
        Some("partition") | Some("disk") => Some(DeviceKind::Volume),
        _ if idtype == Some("floppy") => Some(DeviceKind::Volume),
        _ => None,
    }
}

fn has_media(kind: DeviceKind, info: &DeviceInfo) -> bool {
    match kind {
        DeviceKind::Volume => info.property_value(FS_USAGE_KEY).is_some(),
        DeviceKind::Optical => info.property_value(CDROM_MEDIA_KEY).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::engine::tables::MountTable;

    fn info(devtype: Option<&str>, properties: &[(&str, &str)]) -> DeviceInfo {
        DeviceInfo::new(Some(PathBuf::from("/dev/sdb1")), devtype, properties)
    }

    fn empty_table() -> MountTable {
        MountTable::from_str("")
    }

    #[test]
    fn test_usb_stick_admitted() {
        let dir = tempfile::tempdir().unwrap();
        let info = info(
            Some("partition"),
            &[
                ("ID_FS_TYPE", "vfat"),
                ("ID_FS_LABEL", "PHOTOS"),
                ("ID_FS_USAGE", "filesystem"),
            ],
        );
        let device = Device::candidate(info, &empty_table(), dir.path()).unwrap();
        assert_eq!(device.kind(), DeviceKind::Volume);
        assert_eq!(device.filesystem(), "vfat");
        assert_eq!(device.devnode(), Path::new("/dev/sdb1"));
        assert_eq!(device.mountpoint(), dir.path().join("PHOTOS"));
    }

    #[test]
    fn test_ineligible_filesystems_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for fs in &["swap", "LVM2_member", "crypto_LUKS"] {
            let info = info(
                Some("partition"),
                &[("ID_FS_TYPE", fs), ("ID_FS_USAGE", "filesystem")],
            );
            assert!(Device::candidate(info, &empty_table(), dir.path()).is_none());
        }
    }

    #[test]
    fn test_missing_filesystem_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let info = info(Some("partition"), &[("ID_FS_USAGE", "filesystem")]);
        assert!(Device::candidate(info, &empty_table(), dir.path()).is_none());
    }

    #[test]
    fn test_unclassifiable_kind_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let info = info(
            None,
            &[("ID_FS_TYPE", "vfat"), ("ID_FS_USAGE", "filesystem")],
        );
        assert!(Device::candidate(info, &empty_table(), dir.path()).is_none());
    }

    #[test]
    fn test_floppy_is_a_volume() {
        let dir = tempfile::tempdir().unwrap();
        let info = info(
            None,
            &[
                ("ID_TYPE", "floppy"),
                ("ID_FS_TYPE", "vfat"),
                ("ID_FS_LABEL", "FLOP"),
                ("ID_FS_USAGE", "filesystem"),
            ],
        );
        let device = Device::candidate(info, &empty_table(), dir.path()).unwrap();
        assert_eq!(device.kind(), DeviceKind::Volume);
    }

    #[test]
    fn test_blank_optical_drive_rejected() {
        let dir = tempfile::tempdir().unwrap();
        // ID_TYPE=cd but no ID_CDROM_MEDIA: tray is empty.
        let info = info(
            Some("disk"),
            &[("ID_TYPE", "cd"), ("ID_FS_TYPE", "iso9660")],
        );
        assert!(Device::candidate(info, &empty_table(), dir.path()).is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_optical_with_media_admitted() {
        let dir = tempfile::tempdir().unwrap();
        let info = info(
            Some("disk"),
            &[
                ("ID_TYPE", "cd"),
                ("ID_CDROM_MEDIA", "1"),
                ("ID_FS_TYPE", "iso9660"),
                ("ID_FS_LABEL", "DATA"),
            ],
        );
        let device = Device::candidate(info, &empty_table(), dir.path()).unwrap();
        assert_eq!(device.kind(), DeviceKind::Optical);
        assert_eq!(device.mountpoint(), dir.path().join("DATA"));
    }

    #[test]
    fn test_volume_without_usage_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let info = info(Some("partition"), &[("ID_FS_TYPE", "vfat")]);
        assert!(Device::candidate(info, &empty_table(), dir.path()).is_none());
    }

    #[test]
    fn test_admin_table_target_wins() {
        let dir = tempfile::tempdir().unwrap();
        let table = MountTable::from_str("/dev/sdb1 /media/backup ext4 defaults 0 0");
        let info = info(
            Some("partition"),
            &[
                ("ID_FS_TYPE", "ext4"),
                ("ID_FS_LABEL", "BACKUP"),
                ("ID_FS_USAGE", "filesystem"),
            ],
        );
        let device = Device::candidate(info, &table, dir.path()).unwrap();
        assert_eq!(device.mountpoint(), Path::new("/media/backup"));
    }

    #[test]
    fn test_no_identity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let info = info(
            Some("partition"),
            &[("ID_FS_TYPE", "vfat"), ("ID_FS_USAGE", "filesystem")],
        );
        assert!(Device::candidate(info, &empty_table(), dir.path()).is_none());
        // Rejection leaves the mount root untouched.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
