// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bridge from the log facade to syslog(3) for daemonized operation.

use std::ffi::CString;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

// openlog() keeps a reference to the ident string, so it must have
// static storage duration.
const TAG: &[u8] = b"ldm\0";
const MSG_FMT: &[u8] = b"%s\0";

fn priority(level: Level) -> libc::c_int {
    match level {
        Level::Error => libc::LOG_ERR,
        Level::Warn => libc::LOG_WARNING,
        Level::Info => libc::LOG_INFO,
        Level::Debug | Level::Trace => libc::LOG_DEBUG,
    }
}

struct SyslogLogger;

impl Log for SyslogLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = match CString::new(record.args().to_string()) {
            Ok(message) => message,
            Err(_) => return,
        };
        unsafe {
            libc::syslog(
                priority(record.level()),
                MSG_FMT.as_ptr() as *const libc::c_char,
                message.as_ptr(),
            )
        };
    }

    fn flush(&self) {}
}

static LOGGER: SyslogLogger = SyslogLogger;

/// Open the system log under the fixed daemon tag and install the
/// forwarding logger.
pub fn init() -> Result<(), SetLoggerError> {
    unsafe {
        libc::openlog(
            TAG.as_ptr() as *const libc::c_char,
            libc::LOG_CONS,
            libc::LOG_DAEMON,
        )
    };
    log::set_logger(&LOGGER)?;
    log::set_max_level(LevelFilter::Info);
    Ok(())
}
