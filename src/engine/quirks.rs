// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Filesystem-specific deviations from default mount options.

use std::ops::BitOr;

use nix::unistd::{Gid, Uid};

/// Bitmask of mount-option and ownership quirks for one filesystem.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Quirks(u32);

impl Quirks {
    pub const NONE: Quirks = Quirks(0);
    /// The filesystem has no ownership metadata; uid/gid must be
    /// passed as mount options and the post-mount chown suppressed.
    pub const OWNER_FIX: Quirks = Quirks(1 << 0);
    pub const UTF8: Quirks = Quirks(1 << 1);
    pub const MASK: Quirks = Quirks(1 << 2);
    pub const FLUSH: Quirks = Quirks(1 << 3);

    pub fn contains(self, other: Quirks) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Quirks {
    type Output = Quirks;

    fn bitor(self, rhs: Quirks) -> Quirks {
        Quirks(self.0 | rhs.0)
    }
}

/// Quirks for the given filesystem name. Filesystems not in the table
/// get defaults.
pub fn filesystem_quirks(fs: &str) -> Quirks {
    match fs {
        "msdos" | "umsdos" => Quirks::OWNER_FIX | Quirks::UTF8,
        "vfat" => Quirks::OWNER_FIX | Quirks::UTF8 | Quirks::MASK | Quirks::FLUSH,
        "exfat" => Quirks::OWNER_FIX,
        "ntfs" => Quirks::OWNER_FIX | Quirks::UTF8,
        "iso9660" => Quirks::OWNER_FIX | Quirks::UTF8,
        "udf" => Quirks::OWNER_FIX,
        _ => Quirks::NONE,
    }
}

/// Assemble the mount-option string for a quirks bitmask. Fragments
/// are emitted in a fixed order and comma-joined.
pub fn mount_options(quirks: Quirks, uid: Uid, gid: Gid) -> String {
    let mut fragments = Vec::new();

    if quirks.contains(Quirks::OWNER_FIX) {
        fragments.push(format!("uid={},gid={}", uid, gid));
    }
    if quirks.contains(Quirks::UTF8) {
        fragments.push("utf8".to_string());
    }
    if quirks.contains(Quirks::FLUSH) {
        fragments.push("flush".to_string());
    }
    if quirks.contains(Quirks::MASK) {
        fragments.push("dmask=000,fmask=111".to_string());
    }

    fragments.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quirks_table() {
        assert_eq!(
            filesystem_quirks("vfat"),
            Quirks::OWNER_FIX | Quirks::UTF8 | Quirks::MASK | Quirks::FLUSH
        );
        assert_eq!(
            filesystem_quirks("msdos"),
            Quirks::OWNER_FIX | Quirks::UTF8
        );
        assert_eq!(filesystem_quirks("exfat"), Quirks::OWNER_FIX);
        assert_eq!(
            filesystem_quirks("ntfs"),
            Quirks::OWNER_FIX | Quirks::UTF8
        );
        assert_eq!(
            filesystem_quirks("iso9660"),
            Quirks::OWNER_FIX | Quirks::UTF8
        );
        assert_eq!(filesystem_quirks("udf"), Quirks::OWNER_FIX);
        assert_eq!(filesystem_quirks("ext4"), Quirks::NONE);
        assert_eq!(filesystem_quirks("xfs"), Quirks::NONE);
    }

    #[test]
    fn test_vfat_option_string() {
        let options = mount_options(
            filesystem_quirks("vfat"),
            Uid::from_raw(1000),
            Gid::from_raw(1000),
        );
        assert_eq!(
            options,
            "uid=1000,gid=1000,utf8,flush,dmask=000,fmask=111"
        );
    }

    #[test]
    fn test_iso9660_option_string() {
        let options = mount_options(
            filesystem_quirks("iso9660"),
            Uid::from_raw(1000),
            Gid::from_raw(100),
        );
        assert_eq!(options, "uid=1000,gid=100,utf8");
    }

    #[test]
    fn test_no_quirks_empty_string() {
        let options = mount_options(
            filesystem_quirks("ext4"),
            Uid::from_raw(1000),
            Gid::from_raw(1000),
        );
        assert!(options.is_empty());
    }
}
