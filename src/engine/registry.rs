// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fixed-capacity store of currently tracked devices. The bound keeps
//! the shutdown path trivial; the realistic number of simultaneously
//! attached removable volumes is small.

use std::path::{Path, PathBuf};

use crate::engine::device::Device;

#[derive(Debug)]
pub struct DeviceRegistry {
    slots: Vec<Option<Device>>,
}

impl DeviceRegistry {
    pub fn new(capacity: usize) -> DeviceRegistry {
        DeviceRegistry {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Insert into the first empty slot. On overflow the device is
    /// handed back to the caller untouched.
    pub fn insert(&mut self, device: Device) -> Result<(), Device> {
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(device);
                Ok(())
            }
            None => Err(device),
        }
    }

    pub fn remove(&mut self, devnode: &Path) -> Option<Device> {
        self.slots
            .iter_mut()
            .find(|slot| {
                slot.as_ref()
                    .map_or(false, |device| device.devnode() == devnode)
            })
            .and_then(Option::take)
    }

    /// Find a device by devnode or by mountpoint.
    pub fn find(&self, path: &Path) -> Option<&Device> {
        self.slots
            .iter()
            .flatten()
            .find(|device| device.devnode() == path || device.mountpoint() == path)
    }

    /// Devnodes of every tracked device, for sweep passes that mutate
    /// the registry as they go.
    pub fn devnodes(&self) -> Vec<PathBuf> {
        self.slots
            .iter()
            .flatten()
            .map(|device| device.devnode().to_path_buf())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
