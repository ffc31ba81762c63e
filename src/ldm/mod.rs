// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

pub use self::{
    errors::{LdmError, LdmResult},
    run::run,
};

pub mod control;
mod errors;
pub mod pidfile;
mod run;
pub mod syslog;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
