// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sweetada-gen
//!
//! Produces the boot media SweetAda kernels are started from: Amiga ADF
//! floppies, PC-x86 floppy and hard disk images, Dreamcast IP.BIN and
//! 1ST_READ.BIN, S/360 object decks, Logisim memory images and Ada packages
//! of QSYS base addresses.

mod args;
mod generate;
mod output;
mod toolchain;

use anyhow::Result;
use clap::Parser;

use crate::args::{Cli, Command};

const LOG_ENV: &str = "SWEETADA_LOG";

fn run(cli: Cli) -> Result<()> {
    cli.validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let toolchain = &cli.toolchain;
    match cli.command {
        Command::Adf {
            kernel,
            load_address,
            entry_point,
            output,
            boot,
        } => generate::adf(
            &kernel,
            load_address,
            entry_point,
            &output,
            boot.source(),
            toolchain,
        ),
        Command::PcFloppy {
            kernel,
            boot_segment,
            target,
            device,
            boot,
        } => generate::pc_floppy(
            &kernel,
            boot_segment,
            &target,
            device,
            boot.source(),
            toolchain,
        ),
        Command::PcHd {
            kernel,
            boot_segment,
            target,
            device,
            mbr,
            boot,
        } => generate::pc_hd(
            &kernel,
            boot_segment,
            &target,
            device,
            mbr.source(),
            boot.source(),
            toolchain,
        ),
        Command::Dreamcast {
            template,
            ip_txt,
            kernel,
            ip_out,
            kernel_out,
        } => generate::dreamcast(&template, &ip_txt, &kernel, &ip_out, &kernel_out),
        Command::S360 {
            address,
            loader,
            psw,
            input,
            output,
        } => generate::s360(address, loader.as_deref(), psw, &input, &output),
        Command::Logisim { input, output } => generate::logisim(&input, output.as_deref()),
        Command::Qsys {
            design,
            package,
            endpoints,
            suffix,
            output_dir,
        } => generate::qsys(&design, &package, &endpoints, &suffix, &output_dir),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or(LOG_ENV, "info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("sweetada-gen: *** Error: {:#}", e);
        std::process::exit(1);
    }
}
