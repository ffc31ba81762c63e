// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{
    collections::HashMap,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use libudev::EventType;

use crate::engine::udev::DEVLINKS_KEY;

/// Block-subsystem actions the engine reacts to. Anything else the
/// kernel may report is dropped at the event boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockAction {
    Add,
    Change,
    Remove,
}

/// Device classification for mount policy. Devices that fit neither
/// variant are rejected at admission and never stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceKind {
    Volume,
    Optical,
}

/// An owned event with all of the information the engine needs to
/// process a received udev event.
pub struct BlockEvent {
    action: BlockAction,
    device: DeviceInfo,
}

impl BlockEvent {
    pub fn from_event(event: &libudev::Event) -> Option<BlockEvent> {
        let action = match event.event_type() {
            EventType::Add => BlockAction::Add,
            EventType::Change => BlockAction::Change,
            EventType::Remove => BlockAction::Remove,
            _ => return None,
        };
        Some(BlockEvent {
            action,
            device: DeviceInfo::from(event.device()),
        })
    }

    pub fn action(&self) -> BlockAction {
        self.action
    }

    pub fn into_device(self) -> DeviceInfo {
        self.device
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }
}

/// An owned snapshot of a udev device taken at the event boundary.
/// Held for the lifetime of a tracked device; the only window onto
/// kernel-reported facts after the event has been consumed.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    devnode: Option<PathBuf>,
    devtype: Option<OsString>,
    properties: HashMap<Box<OsStr>, Box<OsStr>>,
}

impl DeviceInfo {
    #[cfg(test)]
    pub fn new(
        devnode: Option<PathBuf>,
        devtype: Option<&str>,
        properties: &[(&str, &str)],
    ) -> DeviceInfo {
        DeviceInfo {
            devnode,
            devtype: devtype.map(OsString::from),
            properties: properties
                .iter()
                .map(|&(name, value)| {
                    (Box::from(OsStr::new(name)), Box::from(OsStr::new(value)))
                })
                .collect(),
        }
    }

    pub fn devnode(&self) -> Option<&Path> {
        self.devnode.as_deref()
    }

    pub fn devtype(&self) -> Option<&str> {
        self.devtype.as_deref().and_then(OsStr::to_str)
    }

    /// Look up a udev property, treating a value that is not valid
    /// UTF-8 the same as an absent one.
    pub fn property_value<T: AsRef<OsStr>>(&self, property_name: T) -> Option<&str> {
        self.properties
            .get(property_name.as_ref())
            .and_then(|value| value.to_str())
    }

    /// Symbolic-link aliases of the devnode, in the order udev
    /// reports them.
    pub fn devlinks(&self) -> impl Iterator<Item = &str> {
        self.property_value(DEVLINKS_KEY)
            .unwrap_or("")
            .split_whitespace()
    }
}

impl<'a> From<&'a libudev::Device> for DeviceInfo {
    fn from(d: &'a libudev::Device) -> DeviceInfo {
        DeviceInfo {
            devnode: d.devnode().map(|p| p.to_owned()),
            devtype: d.devtype().map(|t| t.to_owned()),
            properties: d
                .properties()
                .map(|prop| (Box::from(prop.name()), Box::from(prop.value())))
                .collect(),
        }
    }
}
