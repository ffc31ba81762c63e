// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The out-of-band control channel: a named pipe carrying one-shot
//! requests from unprivileged clients. One message per open; after
//! each message the reader side is reopened, which both drains any
//! leftover bytes and lets the next writer connect.

use std::{
    fs,
    io::Write,
    os::unix::io::{AsRawFd, RawFd},
    path::{Path, PathBuf},
};

use nix::{
    errno::Errno,
    fcntl::{open, OFlag},
    sys::stat::{umask, Mode},
    unistd::{close, mkfifo, read},
};

use crate::ldm::errors::LdmResult;

/// Wire format: first byte is the command, the rest is the argument.
/// Anything unrecognized is dropped without a reply.
#[derive(Debug, PartialEq, Eq)]
pub enum ControlRequest {
    /// Unmount the device identified by devnode or mountpoint.
    Remove(PathBuf),
}

pub fn parse_message(message: &[u8]) -> Option<ControlRequest> {
    let (&command, argument) = message.split_first()?;
    match command {
        b'R' => {
            let argument = std::str::from_utf8(argument).ok()?;
            // Strip a single trailing slash.
            let argument = argument.strip_suffix('/').unwrap_or(argument);
            if argument.is_empty() {
                return None;
            }
            Some(ControlRequest::Remove(PathBuf::from(argument)))
        }
        _ => None,
    }
}

pub struct ControlPipe {
    fd: RawFd,
    path: PathBuf,
}

impl ControlPipe {
    /// Create the pipe, replacing any stale one left behind by an
    /// unclean shutdown, and open the reader side. World-writable so
    /// unprivileged clients can enqueue removals.
    pub fn create(path: &Path) -> LdmResult<ControlPipe> {
        let _ = fs::remove_file(path);

        let old_mask = umask(Mode::empty());
        let created = mkfifo(path, Mode::from_bits_truncate(0o666));
        umask(old_mask);
        created?;

        let fd = ControlPipe::open_reader(path)?;
        Ok(ControlPipe {
            fd,
            path: path.to_path_buf(),
        })
    }

    fn open_reader(path: &Path) -> LdmResult<RawFd> {
        Ok(open(path, OFlag::O_RDONLY | OFlag::O_NONBLOCK, Mode::empty())?)
    }

    /// Read all currently available bytes as one message, then reopen
    /// the pipe for the next writer. Malformed messages come back as
    /// None.
    pub fn read_message(&mut self) -> LdmResult<Option<ControlRequest>> {
        let mut message = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            match read(self.fd, &mut chunk) {
                Ok(0) => break,
                Ok(count) => message.extend_from_slice(&chunk[..count]),
                Err(Errno::EAGAIN) => break,
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        self.reopen()?;
        Ok(parse_message(&message))
    }

    fn reopen(&mut self) -> LdmResult<()> {
        let _ = close(self.fd);
        self.fd = ControlPipe::open_reader(&self.path)?;
        Ok(())
    }
}

impl AsRawFd for ControlPipe {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for ControlPipe {
    fn drop(&mut self) {
        let _ = close(self.fd);
        let _ = fs::remove_file(&self.path);
    }
}

/// Client side of the channel: write one remove request and return.
/// Used by the one-shot CLI mode.
pub fn request_remove(fifo: &Path, device: &str) -> LdmResult<()> {
    let mut pipe = fs::OpenOptions::new().write(true).open(fifo)?;
    pipe.write_all(b"R")?;
    pipe.write_all(device.as_bytes())?;
    Ok(())
}
