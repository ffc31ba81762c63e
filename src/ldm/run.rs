// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The main loop: four readiness sources multiplexed through one
//! poll(2) call, serviced in fixed priority order on each wakeup.

use std::{
    os::unix::io::AsRawFd,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use inotify::{Inotify, WatchMask};
use nix::{
    errno::Errno,
    fcntl::{open, OFlag},
    poll::{poll, PollFd, PollFlags},
    sys::{
        signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal},
        stat::Mode,
    },
    unistd::{close, Gid, Uid},
};

use crate::{
    consts::{FSTAB_PATH, MTAB_PATH},
    engine::{BlockAction, BlockEvent, BlockMonitor, MountEngine},
    ldm::{
        control::{ControlPipe, ControlRequest},
        errors::LdmResult,
        VERSION,
    },
};

static RUNNING: AtomicBool = AtomicBool::new(true);

// The handler only flips the flag; all cleanup runs on the main
// thread once poll returns.
extern "C" fn handle_signal(_: libc::c_int) {
    RUNNING.store(false, Ordering::SeqCst);
}

fn install_signal_handlers() -> LdmResult<()> {
    let action = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in &[Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP] {
        unsafe { sigaction(*signal, &action)? };
    }
    Ok(())
}

/// Bring the engine up against the current device population, then
/// service events until a termination signal arrives or a table
/// becomes unreadable.
pub fn run(uid: Uid, gid: Gid, mut control: ControlPipe) -> LdmResult<()> {
    info!("ldm {}", VERSION);
    info!("Starting up...");

    install_signal_handlers()?;

    let context = libudev::Context::new()?;
    let mut monitor = BlockMonitor::create(&context)?;

    let mut engine = MountEngine::initialize(uid, gid)?;

    engine.mount_attached(&context)?;

    // The startup sweep changed the kernel table; resynchronize both
    // caches before the loop takes over.
    engine.reload_admin_table()?;
    engine.reload_kernel_table()?;

    let mut inotify = Inotify::init()?;
    inotify.watches().add(FSTAB_PATH, WatchMask::CLOSE_WRITE)?;

    // /proc/self/mounts signals a change through error readiness.
    let mtab_fd = open(
        Path::new(MTAB_PATH),
        OFlag::O_RDONLY | OFlag::O_NONBLOCK,
        Mode::empty(),
    )?;

    info!("Entering the main loop");

    while RUNNING.load(Ordering::SeqCst) {
        // Rebuilt every pass: the control pipe fd changes on reopen.
        let mut fds = [
            PollFd::new(monitor.as_raw_fd(), PollFlags::POLLIN),
            PollFd::new(inotify.as_raw_fd(), PollFlags::POLLIN),
            PollFd::new(mtab_fd, PollFlags::POLLERR),
            PollFd::new(control.as_raw_fd(), PollFlags::POLLIN),
        ];

        match poll(&mut fds, -1) {
            Ok(ready) if ready < 1 => continue,
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(err) => {
                let _ = close(mtab_fd);
                return Err(err.into());
            }
        }

        let ready =
            |index: usize, flag: PollFlags| fds[index].revents().map_or(false, |r| r.contains(flag));

        // Hotplug event on the block subsystem.
        if ready(0, PollFlags::POLLIN) {
            if let Some(event) = monitor.poll() {
                if let Some(event) = BlockEvent::from_event(&event) {
                    match event.action() {
                        BlockAction::Add => {
                            engine.mount(event.into_device());
                        }
                        BlockAction::Remove => {
                            if let Some(devnode) = event.device().devnode() {
                                let devnode = devnode.to_path_buf();
                                engine.unmount(&devnode);
                            }
                        }
                        BlockAction::Change => {
                            engine.change(event.into_device());
                        }
                    }
                }
            }
        }

        // The admin table was rewritten. The notification payload is
        // discarded; the fact of change is the signal.
        if ready(1, PollFlags::POLLIN) {
            let mut buffer = [0u8; 1024];
            let _ = inotify.read_events(&mut buffer);
            if engine.reload_admin_table().is_err() {
                break;
            }
        }

        // The kernel table changed: resynchronize and sweep out
        // devices unmounted behind the daemon's back.
        if ready(2, PollFlags::POLLERR) {
            if engine.reload_kernel_table().is_err() {
                break;
            }
            engine.reconcile();
        }

        // Control-channel message.
        if ready(3, PollFlags::POLLIN) {
            match control.read_message() {
                Ok(Some(ControlRequest::Remove(path))) => {
                    engine.remove_request(&path);
                }
                Ok(None) => {}
                Err(err) => {
                    error!("Error on the control channel: {}", err);
                    break;
                }
            }
        }
    }

    engine.clear();
    let _ = close(mtab_fd);
    info!("Terminating...");

    Ok(())
}
