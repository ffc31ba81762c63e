// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parsed caches of the two mount tables the daemon consults: the
//! administrator configuration and the live kernel table. Both use the
//! fstab line format. Tables are rebuilt wholesale on reload, never
//! mutated in place.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    engine::{
        types::DeviceInfo,
        udev::{FS_LABEL_KEY, FS_UUID_KEY},
    },
    ldm::LdmResult,
};

/// Device-mapper devnodes are volatile; the stable identity of a
/// logical volume is one of its symlink aliases.
const DM_NODE_PREFIX: &str = "/dev/dm-";

/// One line of a mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MntEntry {
    source: String,
    target: PathBuf,
    fstype: String,
    options: String,
}

impl MntEntry {
    /// Parse a single table line. Comments, blank lines and lines with
    /// too few fields yield None.
    fn from_line(line: &str) -> Option<MntEntry> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let mut fields = line.split_whitespace();
        let source = unescape_octal(fields.next()?);
        let target = PathBuf::from(unescape_octal(fields.next()?));
        let fstype = fields.next()?.to_string();
        let options = fields.next().unwrap_or("defaults").to_string();

        Some(MntEntry {
            source,
            target,
            fstype,
            options,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn fstype(&self) -> &str {
        &self.fstype
    }

    /// Whether the option string carries the given option. A leading
    /// '+' asserts presence, matching the admin-table convention;
    /// "opt=value" options match on the option name.
    pub fn has_option(&self, option: &str) -> bool {
        let wanted = option.strip_prefix('+').unwrap_or(option);
        self.options
            .split(',')
            .any(|opt| opt.split('=').next() == Some(wanted))
    }
}

/// Octal escapes (\040 and friends) are how the kernel and mount
/// tools encode whitespace in table fields.
fn unescape_octal(field: &str) -> String {
    let mut result = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            let digits = chars
                .clone()
                .take(3)
                .take_while(|d| d.is_digit(8))
                .collect::<String>();
            if digits.len() == 3 {
                if let Ok(byte) = u8::from_str_radix(&digits, 8) {
                    result.push(byte as char);
                    for _ in 0..3 {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        result.push(c);
    }
    result
}

/// A parsed mount table.
#[derive(Debug, Default)]
pub struct MountTable {
    entries: Vec<MntEntry>,
}

impl MountTable {
    pub fn read(path: &Path) -> LdmResult<MountTable> {
        let data = fs::read_to_string(path)?;
        Ok(MountTable {
            entries: data.lines().filter_map(MntEntry::from_line).collect(),
        })
    }

    #[cfg(test)]
    pub fn from_str(data: &str) -> MountTable {
        MountTable {
            entries: data.lines().filter_map(MntEntry::from_line).collect(),
        }
    }

    fn find_source(&self, source: &str) -> Option<&MntEntry> {
        self.entries.iter().find(|e| e.source == source)
    }

    /// Look up the entry for a device. Resolution order, first match
    /// wins: the devnode (falling back through symlink aliases for
    /// device-mapper nodes), the filesystem UUID, the filesystem label.
    pub fn find(&self, info: &DeviceInfo) -> Option<&MntEntry> {
        if let Some(devnode) = info.devnode() {
            let node = devnode.to_string_lossy();
            if node.starts_with(DM_NODE_PREFIX) {
                for alias in info.devlinks() {
                    if let Some(entry) = self.find_source(alias) {
                        return Some(entry);
                    }
                }
            } else if let Some(entry) = self.find_source(&node) {
                return Some(entry);
            }
        }

        if let Some(uuid) = info.property_value(FS_UUID_KEY) {
            if let Some(entry) = self.find_source(&format!("UUID={}", uuid)) {
                return Some(entry);
            }
        }

        if let Some(label) = info.property_value(FS_LABEL_KEY) {
            if let Some(entry) = self.find_source(&format!("LABEL={}", label)) {
                return Some(entry);
            }
        }

        None
    }

    pub fn has_option(&self, info: &DeviceInfo, option: &str) -> bool {
        self.find(info).map_or(false, |e| e.has_option(option))
    }
}

/// The two tables the daemon reconciles against.
#[derive(Debug)]
pub struct TableCache {
    admin: MountTable,
    kernel: MountTable,
    admin_path: PathBuf,
    kernel_path: PathBuf,
}

impl TableCache {
    pub fn load(admin_path: &Path, kernel_path: &Path) -> LdmResult<TableCache> {
        Ok(TableCache {
            admin: MountTable::read(admin_path)?,
            kernel: MountTable::read(kernel_path)?,
            admin_path: admin_path.to_path_buf(),
            kernel_path: kernel_path.to_path_buf(),
        })
    }

    pub fn admin(&self) -> &MountTable {
        &self.admin
    }

    pub fn kernel(&self) -> &MountTable {
        &self.kernel
    }

    pub fn reload_admin(&mut self) -> LdmResult<()> {
        match MountTable::read(&self.admin_path) {
            Ok(table) => {
                self.admin = table;
                Ok(())
            }
            Err(err) => {
                error!("Error while parsing {}: {}", self.admin_path.display(), err);
                Err(err)
            }
        }
    }

    pub fn reload_kernel(&mut self) -> LdmResult<()> {
        match MountTable::read(&self.kernel_path) {
            Ok(table) => {
                self.kernel = table;
                Ok(())
            }
            Err(err) => {
                error!(
                    "Error while parsing {}: {}",
                    self.kernel_path.display(),
                    err
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::engine::types::DeviceInfo;

    use super::*;

    fn volume(devnode: &str, properties: &[(&str, &str)]) -> DeviceInfo {
        DeviceInfo::new(Some(PathBuf::from(devnode)), Some("partition"), properties)
    }

    #[test]
    fn test_parse_skips_comments_and_short_lines() {
        let table = MountTable::from_str(
            "# static file system information\n\
             \n\
             /dev/sda1 /boot\n\
             /dev/sda2 / ext4 defaults 0 1\n",
        );
        assert_eq!(table.entries.len(), 1);
        assert_eq!(table.entries[0].source(), "/dev/sda2");
        assert_eq!(table.entries[0].fstype(), "ext4");
    }

    #[test]
    fn test_parse_decodes_octal_escapes() {
        let table = MountTable::from_str("/dev/sdb1 /mnt/usb\\040stick vfat defaults 0 0");
        assert_eq!(
            table.entries[0].target(),
            Path::new("/mnt/usb stick")
        );
    }

    #[test]
    fn test_missing_options_default() {
        let table = MountTable::from_str("/dev/sda2 / ext4");
        assert_eq!(table.entries[0].options, "defaults");
    }

    #[test]
    fn test_has_option() {
        let table = MountTable::from_str("/dev/sdc1 /media/backup ext4 noauto,uid=1000 0 0");
        let entry = &table.entries[0];
        assert!(entry.has_option("noauto"));
        assert!(entry.has_option("+noauto"));
        assert!(entry.has_option("uid"));
        assert!(!entry.has_option("auto"));
        assert!(!entry.has_option("ro"));
    }

    #[test]
    fn test_find_by_devnode() {
        let table = MountTable::from_str("/dev/sdc1 /media/backup ext4 defaults 0 0");
        let info = volume("/dev/sdc1", &[]);
        assert_eq!(
            table.find(&info).unwrap().target(),
            Path::new("/media/backup")
        );
    }

    #[test]
    fn test_find_by_uuid_and_label() {
        let table = MountTable::from_str(
            "UUID=0000-1111 /media/one vfat defaults 0 0\n\
             LABEL=PHOTOS /media/two vfat defaults 0 0\n",
        );

        let by_uuid = volume("/dev/sdb1", &[("ID_FS_UUID", "0000-1111")]);
        assert_eq!(
            table.find(&by_uuid).unwrap().target(),
            Path::new("/media/one")
        );

        // No UUID reported: the label step must still be tried.
        let by_label = volume("/dev/sdb2", &[("ID_FS_LABEL", "PHOTOS")]);
        assert_eq!(
            table.find(&by_label).unwrap().target(),
            Path::new("/media/two")
        );
    }

    #[test]
    fn test_devnode_match_wins_over_uuid() {
        let table = MountTable::from_str(
            "/dev/sdb1 /media/node vfat defaults 0 0\n\
             UUID=0000-1111 /media/uuid vfat defaults 0 0\n",
        );
        let info = volume("/dev/sdb1", &[("ID_FS_UUID", "0000-1111")]);
        assert_eq!(
            table.find(&info).unwrap().target(),
            Path::new("/media/node")
        );
    }

    #[test]
    fn test_dm_node_resolves_through_aliases() {
        let table = MountTable::from_str("/dev/mapper/vg-data /srv/data ext4 defaults 0 0");
        let info = DeviceInfo::new(
            Some(PathBuf::from("/dev/dm-3")),
            Some("disk"),
            &[("DEVLINKS", "/dev/vg/data /dev/mapper/vg-data")],
        );
        assert_eq!(
            table.find(&info).unwrap().target(),
            Path::new("/srv/data")
        );

        // The raw dm node itself must not match directly.
        let direct = MountTable::from_str("/dev/dm-3 /srv/raw ext4 defaults 0 0");
        assert!(direct.find(&info).is_none());
    }

    #[test]
    fn test_reload_replaces_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fstab");
        std::fs::write(&path, "/dev/sda1 /one ext4 defaults 0 0\n").unwrap();

        let mut cache = TableCache::load(&path, &path).unwrap();
        let info = volume("/dev/sda1", &[]);
        assert_eq!(cache.admin().find(&info).unwrap().target(), Path::new("/one"));

        std::fs::write(&path, "/dev/sda1 /two ext4 defaults 0 0\n").unwrap();
        cache.reload_admin().unwrap();
        assert_eq!(cache.admin().find(&info).unwrap().target(), Path::new("/two"));
    }

    #[test]
    fn test_reload_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fstab");
        std::fs::write(&path, "").unwrap();

        let mut cache = TableCache::load(&path, &path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(cache.reload_admin().is_err());
    }
}
