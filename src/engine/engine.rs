// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The mount engine: folds block-subsystem events into the device
//! registry and keeps it consistent with the two mount tables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use nix::{
    errno::Errno,
    mount::{mount, umount, MsFlags},
    sys::stat::Mode,
    unistd::{chown, mkdir, Gid, Uid},
};

use crate::{
    consts::{FSTAB_PATH, HELPER_PATH, MAX_DEVICES, MOUNT_ROOT, MTAB_PATH},
    engine::{
        device::Device,
        hook,
        quirks::{filesystem_quirks, mount_options, Quirks},
        registry::DeviceRegistry,
        tables::TableCache,
        types::{DeviceInfo, DeviceKind},
        udev,
    },
    ldm::LdmResult,
};

const NOAUTO_OPTION: &str = "+noauto";

#[derive(Debug)]
pub struct MountEngine {
    registry: DeviceRegistry,
    tables: TableCache,
    uid: Uid,
    gid: Gid,
    mount_root: PathBuf,
    helper: Option<PathBuf>,
}

impl MountEngine {
    /// Set up the engine against the system tables. Failure to parse
    /// either table at this point is fatal for the caller.
    pub fn initialize(uid: Uid, gid: Gid) -> LdmResult<MountEngine> {
        Ok(MountEngine {
            registry: DeviceRegistry::new(MAX_DEVICES),
            tables: TableCache::load(Path::new(FSTAB_PATH), Path::new(MTAB_PATH))?,
            uid,
            gid,
            mount_root: PathBuf::from(MOUNT_ROOT),
            helper: HELPER_PATH.map(PathBuf::from),
        })
    }

    #[cfg(test)]
    fn for_tests(
        admin_path: &Path,
        kernel_path: &Path,
        mount_root: &Path,
        capacity: usize,
    ) -> MountEngine {
        MountEngine {
            registry: DeviceRegistry::new(capacity),
            tables: TableCache::load(admin_path, kernel_path).unwrap(),
            uid: nix::unistd::geteuid(),
            gid: nix::unistd::getegid(),
            mount_root: mount_root.to_path_buf(),
            helper: None,
        }
    }

    pub fn reload_admin_table(&mut self) -> LdmResult<()> {
        self.tables.reload_admin()
    }

    pub fn reload_kernel_table(&mut self) -> LdmResult<()> {
        self.tables.reload_kernel()
    }

    /// Whether the kernel table currently records the device as
    /// mounted. Goes through the table resolver so device-mapper
    /// aliases match too.
    pub fn is_mounted(&self, info: &DeviceInfo) -> bool {
        self.tables.kernel().find(info).is_some()
    }

    /// Admit and mount a device. Admission rejections are silent;
    /// mount failures are logged and fully unwound.
    pub fn mount(&mut self, info: DeviceInfo) -> bool {
        let devnode = match info.devnode() {
            Some(devnode) => devnode.to_path_buf(),
            None => return false,
        };

        // A devnode is tracked at most once; a repeated add is a no-op.
        if self.registry.find(&devnode).is_some() {
            return false;
        }

        if self.tables.admin().has_option(&info, NOAUTO_OPTION) {
            return false;
        }

        let device = match Device::candidate(info, self.tables.admin(), &self.mount_root) {
            Some(device) => device,
            None => return false,
        };

        let mountpoint = device.mountpoint().to_path_buf();
        let fstype = device.filesystem().to_string();
        let kind = device.kind();
        let quirks = filesystem_quirks(&fstype);

        if self.registry.insert(device).is_err() {
            return false;
        }

        // An already existing directory is fine: admin-table targets
        // routinely persist across plug cycles.
        if let Err(err) = mkdir(&mountpoint, Mode::from_bits_truncate(0o755)) {
            if err != Errno::EEXIST {
                error!("Cannot create {} ({})", mountpoint.display(), err);
                self.discard(&devnode);
                return false;
            }
        }

        let options = mount_options(quirks, self.uid, self.gid);
        let data = if options.is_empty() {
            None
        } else {
            Some(options.as_str())
        };
        let flags = if kind == DeviceKind::Optical {
            MsFlags::MS_RDONLY
        } else {
            MsFlags::empty()
        };

        if let Err(err) = mount(
            Some(devnode.as_path()),
            &mountpoint,
            Some(fstype.as_str()),
            flags,
            data,
        ) {
            error!("Error while mounting {} ({})", devnode.display(), err);
            self.discard(&devnode);
            return false;
        }

        // Filesystems without the ownership quirk carry real ownership
        // metadata; hand the mountpoint to the configured user.
        if !quirks.contains(Quirks::OWNER_FIX) {
            if let Err(err) = chown(&mountpoint, Some(self.uid), Some(self.gid)) {
                error!("Cannot chown {} ({})", mountpoint.display(), err);
                let _ = umount(&mountpoint);
                self.discard(&devnode);
                return false;
            }
        }

        hook::spawn_helper(
            self.helper.as_deref(),
            "mount",
            &mountpoint,
            self.uid,
            self.gid,
        );

        info!("Mounted {} on {}", devnode.display(), mountpoint.display());
        true
    }

    /// Unmount and destroy a tracked device, addressed by devnode or
    /// mountpoint. If the kernel no longer records it as mounted the
    /// syscall is skipped and only the bookkeeping runs. On unmount
    /// failure the device stays registered so a later pass can finish
    /// the job.
    pub fn unmount(&mut self, path: &Path) -> bool {
        let (devnode, mountpoint, mounted) = match self.registry.find(path) {
            Some(device) => (
                device.devnode().to_path_buf(),
                device.mountpoint().to_path_buf(),
                self.is_mounted(device.info()),
            ),
            None => return false,
        };

        if mounted {
            if let Err(err) = umount(&mountpoint) {
                error!(
                    "Error while unmounting {} ({})",
                    mountpoint.display(),
                    err
                );
                return false;
            }
        }

        // Best effort: a non-empty directory is left in place.
        let _ = fs::remove_dir(&mountpoint);

        hook::spawn_helper(
            self.helper.as_deref(),
            "unmount",
            &mountpoint,
            self.uid,
            self.gid,
        );

        self.registry.remove(&devnode);
        info!("Unmounted {}", devnode.display());
        true
    }

    /// Media change on a known devnode: tear down whatever was there,
    /// then mount whatever is there now. Succeeds iff the mount half
    /// succeeds.
    pub fn change(&mut self, info: DeviceInfo) -> bool {
        if let Some(devnode) = info.devnode() {
            let devnode = devnode.to_path_buf();
            if self.registry.find(&devnode).is_some() && !self.unmount(&devnode) {
                return false;
            }
        }
        self.mount(info)
    }

    /// An out-of-band remove request. Only devices the kernel still
    /// shows as mounted are acted on.
    pub fn remove_request(&mut self, path: &Path) -> bool {
        let mounted = match self.registry.find(path) {
            Some(device) => self.is_mounted(device.info()),
            None => return false,
        };
        if !mounted {
            return false;
        }
        self.unmount(path)
    }

    /// Drop every tracked device the kernel table no longer shows as
    /// mounted. Covers external actors unmounting behind the daemon's
    /// back.
    pub fn reconcile(&mut self) {
        for devnode in self.registry.devnodes() {
            let mounted = self
                .registry
                .find(&devnode)
                .map(|device| self.is_mounted(device.info()))
                .unwrap_or(true);
            if !mounted {
                self.unmount(&devnode);
            }
        }
    }

    /// Mount everything already attached at startup.
    pub fn mount_attached(&mut self, context: &libudev::Context) -> LdmResult<()> {
        let mut enumerator = udev::block_enumerator(context)?;
        for device in enumerator
            .scan_devices()?
            .filter(|device| device.is_initialized())
        {
            let info = DeviceInfo::from(&device);
            if !self.is_mounted(&info) {
                self.mount(info);
            }
        }
        Ok(())
    }

    /// Unmount every tracked device; the shutdown path.
    pub fn clear(&mut self) {
        for devnode in self.registry.devnodes() {
            self.unmount(&devnode);
        }
    }

    /// Tear down a partially mounted device: free the slot, remove the
    /// directory if empty. Hook invocations pair with completed mounts
    /// only, so none fires here.
    fn discard(&mut self, devnode: &Path) {
        if let Some(device) = self.registry.remove(devnode) {
            let _ = fs::remove_dir(device.mountpoint());
        }
    }

    #[cfg(test)]
    fn admit(&mut self, info: DeviceInfo) -> bool {
        match Device::candidate(info, self.tables.admin(), &self.mount_root) {
            Some(device) => self.registry.insert(device).is_ok(),
            None => false,
        }
    }

    #[cfg(test)]
    fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }
}
