// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{error::Error, fmt, io, str};

pub type LdmResult<T> = Result<T, LdmError>;

#[derive(Debug)]
pub enum LdmError {
    Msg(String),
    Io(io::Error),
    Nix(nix::Error),
    Udev(libudev::Error),
    Utf8(str::Utf8Error),
}

impl fmt::Display for LdmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LdmError::Msg(ref s) => write!(f, "{}", s),
            LdmError::Io(ref err) => write!(f, "IO error: {}", err),
            LdmError::Nix(ref err) => write!(f, "Nix error: {}", err),
            LdmError::Udev(ref err) => write!(f, "Udev error: {}", err),
            LdmError::Utf8(ref err) => write!(f, "Utf8 error: {}", err),
        }
    }
}

impl Error for LdmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            LdmError::Msg(_) => None,
            LdmError::Io(ref err) => Some(err),
            LdmError::Nix(ref err) => Some(err),
            LdmError::Udev(ref err) => Some(err),
            LdmError::Utf8(ref err) => Some(err),
        }
    }
}

impl From<io::Error> for LdmError {
    fn from(err: io::Error) -> LdmError {
        LdmError::Io(err)
    }
}

impl From<nix::Error> for LdmError {
    fn from(err: nix::Error) -> LdmError {
        LdmError::Nix(err)
    }
}

impl From<libudev::Error> for LdmError {
    fn from(err: libudev::Error) -> LdmError {
        LdmError::Udev(err)
    }
}

impl From<str::Utf8Error> for LdmError {
    fn from(err: str::Utf8Error) -> LdmError {
        LdmError::Utf8(err)
    }
}
