// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthesize a mountpoint path for a device with no administrator
//! configuration. Picks a base name from device identity, sanitizes
//! whitespace, and steps around existing paths. The directory itself
//! is created later, just before mounting.

use std::path::{Path, PathBuf};

use crate::engine::{
    types::DeviceInfo,
    udev::{FS_LABEL_KEY, FS_UUID_KEY, SERIAL_KEY},
};

/// Pick the target path for a device under the mount root. Base name
/// preference: filesystem label, filesystem UUID, device serial.
/// Returns None when no identity is available or no free path fits
/// within the system path bound.
pub fn synthesize(info: &DeviceInfo, mount_root: &Path) -> Option<PathBuf> {
    let base = info
        .property_value(FS_LABEL_KEY)
        .or_else(|| info.property_value(FS_UUID_KEY))
        .or_else(|| info.property_value(SERIAL_KEY))?;

    let name = base.replace(' ', "_");
    let mut candidate = mount_root.join(name);

    while candidate.exists() {
        if candidate.as_os_str().len() >= libc::PATH_MAX as usize - 2 {
            return None;
        }
        let mut name = candidate.into_os_string();
        name.push("_");
        candidate = PathBuf::from(name);
    }

    Some(candidate)
}
