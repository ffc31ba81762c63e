// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Directory under which mountpoints are synthesized.
pub const MOUNT_ROOT: &str = "/mnt/";

/// Administrator-maintained mount configuration.
pub const FSTAB_PATH: &str = "/etc/fstab";

/// Live mount table as maintained by the kernel.
pub const MTAB_PATH: &str = "/proc/self/mounts";

pub const PID_PATH: &str = "/run/ldm.pid";

pub const FIFO_PATH: &str = "/run/ldm.fifo";

/// Helper program invoked on every mount and unmount. None disables the
/// hook entirely.
pub const HELPER_PATH: Option<&str> = None;

/// Upper bound on simultaneously tracked devices.
pub const MAX_DEVICES: usize = 20;
