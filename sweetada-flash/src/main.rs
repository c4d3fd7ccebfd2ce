// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sweetada-flash
//!
//! Gets a built SweetAda kernel onto its target and running, through one of:
//! - an OpenOCD server, driven over its Tcl RPC port
//! - a serial monitor accepting S-records
//! - a ColdFire dBUG monitor, told to fetch the kernel over TFTP
//! - the Dreamcast Broadband Adapter loader, over UDP

mod args;
mod flash;
mod profile;
mod server;

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use sweetada_common::platform::{Endianness, Platform};

use crate::args::{Cli, Command};

const LOG_ENV: &str = "SWEETADA_LOG";

fn run(cli: Cli) -> Result<()> {
    cli.validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    match cli.command {
        Command::Openocd(args) => flash::openocd(args),
        Command::Srec {
            file,
            port,
            baud,
            flow_control,
        } => flash::srec(&file, &port, baud, flow_control),
        Command::Dbug {
            port,
            baud,
            elf,
            start,
            timeout,
        } => flash::dbug(&port, baud, &elf, &start, Duration::from_secs(timeout)),
        Command::Bba(args) => flash::bba(args),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or(LOG_ENV, "info"))
        .format_timestamp(None)
        .init();

    log::debug!("Host {} ({} endian)", Platform::detect(), Endianness::host());

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("sweetada-flash: *** Error: {:#}", e);
        std::process::exit(1);
    }
}
