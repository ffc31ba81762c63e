// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[macro_use]
extern crate log;

use std::{env, path::Path, process::exit};

use clap::{App, Arg};
use env_logger::Builder;
use log::LevelFilter;
use nix::{
    sys::stat::{umask, Mode},
    unistd::{chdir, close, fork, getuid, setsid, ForkResult, Gid, Uid},
};

use ldm::{
    consts::{FIFO_PATH, PID_PATH},
    ldm::{
        control::{self, ControlPipe},
        pidfile, run, syslog, LdmResult, VERSION,
    },
};

fn parse_args() -> App<'static, 'static> {
    App::new("ldm")
        .version(VERSION)
        .about("Lightweight device mounter")
        .arg(
            Arg::with_name("daemon")
                .short("d")
                .help("Run ldm as a daemon"),
        )
        .arg(
            Arg::with_name("uid")
                .short("u")
                .takes_value(true)
                .value_name("uid")
                .help("Owner uid for mounted devices"),
        )
        .arg(
            Arg::with_name("gid")
                .short("g")
                .takes_value(true)
                .value_name("gid")
                .help("Owner gid for mounted devices"),
        )
        .arg(
            Arg::with_name("remove")
                .short("r")
                .takes_value(true)
                .value_name("path")
                .help("Ask a running daemon to unmount the given device"),
        )
}

/// Detach from the controlling terminal. The parent records the
/// child's pid and gets out of the way; the child carries on as the
/// daemon.
fn daemonize() -> LdmResult<()> {
    match unsafe { fork() }? {
        ForkResult::Parent { child } => {
            if let Err(err) = pidfile::create(Path::new(PID_PATH), child) {
                eprintln!("Could not write {}: {}", PID_PATH, err);
                exit(1);
            }
            exit(0);
        }
        ForkResult::Child => {}
    }

    chdir("/")?;
    umask(Mode::from_bits_truncate(0o022));
    setsid()?;
    for fd in 0..3 {
        let _ = close(fd);
    }
    Ok(())
}

fn init_foreground_logger() {
    let mut builder = Builder::new();
    if let Ok(s) = env::var("RUST_LOG") {
        builder.parse_filters(&s);
    } else {
        builder.filter(None, LevelFilter::Info);
    }
    builder.init();
}

fn main() {
    let matches = parse_args().get_matches();

    // Client mode: write one message to the control pipe and exit.
    if let Some(path) = matches.value_of("remove") {
        match control::request_remove(Path::new(FIFO_PATH), path) {
            Ok(()) => exit(0),
            Err(err) => {
                eprintln!("Could not reach the daemon: {}", err);
                exit(1);
            }
        }
    }

    let uid = match matches
        .value_of("uid")
        .and_then(|value| value.parse::<libc::uid_t>().ok())
    {
        Some(uid) => Uid::from_raw(uid),
        None => {
            eprintln!("You must supply your uid/gid!");
            exit(1);
        }
    };
    let gid = match matches
        .value_of("gid")
        .and_then(|value| value.parse::<libc::gid_t>().ok())
    {
        Some(gid) => Gid::from_raw(gid),
        None => {
            eprintln!("You must supply your uid/gid!");
            exit(1);
        }
    };

    if !getuid().is_root() {
        eprintln!("You have to run this program as root!");
        exit(1);
    }

    if pidfile::exists(Path::new(PID_PATH)) {
        eprintln!("ldm is already running!");
        exit(1);
    }

    let control = match ControlPipe::create(Path::new(FIFO_PATH)) {
        Ok(control) => control,
        Err(err) => {
            eprintln!("Could not create {}: {}", FIFO_PATH, err);
            exit(1);
        }
    };

    let daemon = matches.is_present("daemon");
    if daemon {
        if let Err(err) = daemonize() {
            eprintln!("Could not spawn the daemon: {}", err);
            exit(1);
        }
        if syslog::init().is_err() {
            exit(1);
        }
    } else {
        init_foreground_logger();
    }

    let outcome = run(uid, gid, control);

    if daemon {
        pidfile::remove(Path::new(PID_PATH));
    }

    if let Err(err) = outcome {
        error!("{}", err);
        exit(1);
    }
}
