// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

pub use self::{
    device::Device,
    engine::MountEngine,
    quirks::{filesystem_quirks, mount_options, Quirks},
    registry::DeviceRegistry,
    tables::{MntEntry, MountTable, TableCache},
    types::{BlockAction, BlockEvent, DeviceInfo, DeviceKind},
    udev::BlockMonitor,
};

mod device;
#[allow(clippy::module_inception)]
mod engine;
mod hook;
mod mountpoint;
mod quirks;
mod registry;
mod tables;
mod types;
pub mod udev;
