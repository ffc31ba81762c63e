// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! udev-related constants and plumbing.

use std::os::unix::io::{AsRawFd, RawFd};

use crate::ldm::LdmResult;

/// Possible value for a udev subsystem designation
pub const SUBSYSTEM_BLOCK: &str = "block";

/// Keys for udev properties consulted by the engine
pub const FS_TYPE_KEY: &str = "ID_FS_TYPE";
pub const FS_LABEL_KEY: &str = "ID_FS_LABEL";
pub const FS_UUID_KEY: &str = "ID_FS_UUID";
pub const FS_USAGE_KEY: &str = "ID_FS_USAGE";
pub const CDROM_MEDIA_KEY: &str = "ID_CDROM_MEDIA";
pub const ID_TYPE_KEY: &str = "ID_TYPE";
pub const SERIAL_KEY: &str = "ID_SERIAL";
pub const DEVLINKS_KEY: &str = "DEVLINKS";

/// "ID_FS_TYPE" values that disqualify a device from mounting
pub const SWAP_FS_TYPE: &str = "swap";
pub const LVM_MEMBER_FS_TYPE: &str = "LVM2_member";
pub const CRYPTO_FS_TYPE: &str = "crypto_LUKS";

/// Make an enumerator for enumerating block devices. Return an error if
/// there was any udev-related error.
pub fn block_enumerator(context: &libudev::Context) -> libudev::Result<libudev::Enumerator> {
    let mut enumerator = libudev::Enumerator::new(context)?;
    enumerator.match_subsystem(SUBSYSTEM_BLOCK)?;
    Ok(enumerator)
}

/// A facility for listening for hotplug events on the block subsystem.
pub struct BlockMonitor {
    socket: libudev::MonitorSocket,
}

impl BlockMonitor {
    pub fn create(context: &libudev::Context) -> LdmResult<BlockMonitor> {
        let mut monitor = libudev::Monitor::new(context)?;
        monitor.match_subsystem(SUBSYSTEM_BLOCK)?;

        let socket = monitor.listen()?;

        Ok(BlockMonitor { socket })
    }

    pub fn poll(&mut self) -> Option<libudev::Event> {
        self.socket.receive_event()
    }
}

impl AsRawFd for BlockMonitor {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
