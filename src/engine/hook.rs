// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Invocation of the administrator-supplied hook helper. The helper
//! runs as the configured unprivileged user, never with daemon
//! privileges, and is waited on synchronously.

use std::{io, path::Path, process::Command};

use nix::unistd::{setgid, setuid, Gid, Uid};

/// Run the helper as `helper <action> <mountpoint>`, dropping group
/// then user credentials in the child before exec. A normal exit with
/// status 0 is success; any other outcome is logged and ignored. An
/// unconfigured helper is a no-op success.
pub fn spawn_helper(
    helper: Option<&Path>,
    action: &str,
    mountpoint: &Path,
    uid: Uid,
    gid: Gid,
) -> bool {
    let helper = match helper {
        Some(helper) => helper,
        None => return true,
    };

    let mut command = Command::new(helper);
    command.arg(action).arg(mountpoint);
    unsafe {
        use std::os::unix::process::CommandExt;
        command.pre_exec(move || {
            setgid(gid).map_err(|err| io::Error::from_raw_os_error(err as i32))?;
            setuid(uid).map_err(|err| io::Error::from_raw_os_error(err as i32))?;
            Ok(())
        });
    }

    match command.status() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(
                "Helper \"{}\" {} {} exited with {}",
                helper.display(),
                action,
                mountpoint.display(),
                status
            );
            false
        }
        Err(err) => {
            error!("Could not execute \"{}\": {}", helper.display(), err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use nix::unistd::{getegid, geteuid};

    use super::*;

    #[test]
    fn test_absent_helper_is_success() {
        assert!(spawn_helper(
            None,
            "mount",
            Path::new("/mnt/PHOTOS"),
            geteuid(),
            getegid()
        ));
    }

    #[test]
    fn test_helper_receives_action_and_mountpoint() {
        // /bin/true ignores its arguments and exits 0; dropping to the
        // current credentials is a no-op, so this runs unprivileged.
        assert!(spawn_helper(
            Some(Path::new("/bin/true")),
            "mount",
            Path::new("/mnt/PHOTOS"),
            geteuid(),
            getegid()
        ));
    }

    #[test]
    fn test_failing_helper_reported() {
        assert!(!spawn_helper(
            Some(Path::new("/bin/false")),
            "unmount",
            Path::new("/mnt/PHOTOS"),
            geteuid(),
            getegid()
        ));
    }

    #[test]
    fn test_missing_helper_reported() {
        assert!(!spawn_helper(
            Some(Path::new("/no/such/helper")),
            "mount",
            Path::new("/mnt/PHOTOS"),
            geteuid(),
            getegid()
        ));
    }
}
