// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pid-file singleton guard. The mere existence of the file is the
//! signal; no advisory locking is layered on top.

use std::{fs, path::Path};

use nix::unistd::Pid;

use crate::ldm::errors::LdmResult;

pub fn exists(path: &Path) -> bool {
    path.exists()
}

pub fn create(path: &Path, pid: Pid) -> LdmResult<()> {
    fs::write(path, pid.to_string())?;
    Ok(())
}

/// Best-effort removal on shutdown; a missing file is not an error.
pub fn remove(path: &Path) {
    let _ = fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    use nix::unistd::getpid;

    #[test]
    fn test_pidfile_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ldm.pid");

        assert!(!exists(&path));
        create(&path, getpid()).unwrap();
        assert!(exists(&path));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            getpid().to_string()
        );
        remove(&path);
        assert!(!exists(&path));
        // Removing again must stay silent.
        remove(&path);
    }
}
