// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! The download flows, one per target connection.

use anyhow::{Context, Result, bail};
use std::fs;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use sweetada_common::elf::{KernelElf, StartAddress};
use sweetada_link::bba::BbaLoader;
use sweetada_link::dbug::DbugSession;
use sweetada_link::openocd::{Download, Echo, RpcSession};
use sweetada_link::serial::{self, BaudRate, FlowControl, PortConfig};
use sweetada_link::srecord;

use crate::args::{BbaArgs, NetworkArgs, OpenocdArgs};
use crate::profile::Profile;
use crate::server;

/// Resolves a start address, loading the ELF only if a symbol needs
/// looking up.
fn resolve_start(start: &StartAddress, elf: &Path, thumb: bool) -> Result<u32> {
    let kernel = match start {
        StartAddress::Symbol(_) => Some(KernelElf::load(elf)?),
        StartAddress::Address(_) => None,
    };
    Ok(start.resolve(kernel.as_ref(), thumb)?)
}

pub fn openocd(args: OpenocdArgs) -> Result<()> {
    if args.shutdown {
        let mut session = RpcSession::connect(&args.host, args.rpc_port)
            .context("No connection to OpenOCD server")?;
        session.send("shutdown")?;
        session.disconnect()?;
        println!("- Sent shutdown to OpenOCD");
        return Ok(());
    }

    if let Some(cfg) = &args.server {
        let Some(prefix) = &args.prefix else {
            bail!("No OpenOCD prefix specified");
        };
        return server::start(prefix, cfg, args.wait);
    }

    let (Some(elf), Some(start)) = (&args.elf, &args.start) else {
        bail!("ELF file and start symbol must both be specified");
    };

    let profile = match &args.profile {
        Some(path) => Profile::load(path)?,
        None => Profile::default(),
    };
    let thumb = args.thumb || profile.thumb;
    let address = resolve_start(start, elf, thumb)?;
    println!("- Start address 0x{:X}", address);

    let mut download = Download {
        elf: elf.display().to_string(),
        start_address: format!("0x{address:X}"),
        debug: args.debug,
        noload: args.noload,
        noexec: args.noexec,
        command_file: args.command_file.map(|f| f.display().to_string()),
        commands: args
            .commands
            .as_deref()
            .map(Download::split_commands)
            .unwrap_or_default(),
        ..Default::default()
    };
    profile.apply(&mut download);

    let mut session = RpcSession::connect(&args.host, args.rpc_port)
        .context("No connection to OpenOCD server")?;
    download.run(&mut session, Echo::Stdout)?;
    session.disconnect()?;
    println!();
    Ok(())
}

pub fn srec(file: &Path, port: &str, baud: BaudRate, flow_control: FlowControl) -> Result<()> {
    let srecords = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let config = PortConfig::new(baud).with_flow_control(flow_control);
    let mut serial_port = serial::open(port, &config)?;
    let delay = srecord::line_delay(config.speed());
    log::debug!("Line delay {} ms", delay);

    let start = srecord::send_records(&mut serial_port, &srecords, delay, || {
        eprint!(".");
        let _ = io::stderr().flush();
    })?;
    eprintln!();

    match start {
        Some(address) => println!("- Sent {}, start address 0x{:08X}", file.display(), address),
        None => println!("- Sent {}", file.display()),
    }
    Ok(())
}

/// The monitor fetches the kernel by name from its TFTP server.
pub fn dbug_filename(elf: &Path) -> Result<String> {
    elf.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("No file name in {}", elf.display()))
}

pub fn dbug(
    port: &str,
    baud: BaudRate,
    elf: &Path,
    start: &StartAddress,
    timeout: Duration,
) -> Result<()> {
    let address = format!("0x{:X}", resolve_start(start, elf, false)?);
    let filename = dbug_filename(elf)?;

    let config = PortConfig::new(baud)
        .with_flow_control(FlowControl::FlowSoftware)
        .with_timeout(timeout);
    let serial_port = serial::open(port, &config)?;

    DbugSession::new(serial_port)
        .run(&filename, &address)
        .with_context(|| format!("dBUG on {} did not respond", port))?;
    println!("- Started {} at {}", filename, address);
    Ok(())
}

/// The host commands which give the target a route to us.
pub fn network_commands(iface: &str, network: &NetworkArgs, target: &str) -> [Vec<String>; 2] {
    [
        vec![
            "ifconfig".to_string(),
            "-v".to_string(),
            iface.to_string(),
            network.host_ip.to_string(),
        ],
        vec![
            "arp".to_string(),
            "-s".to_string(),
            target.to_string(),
            network.mac.clone(),
        ],
    ]
}

fn setup_network(network: &NetworkArgs, target: &str) -> Result<()> {
    let Some(iface) = &network.setup_network else {
        return Ok(());
    };
    for command in network_commands(iface, network, target) {
        let Some((program, args)) = command.split_first() else {
            continue;
        };
        log::debug!("{} {:?}", program, args);
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("Failed to run {}", program))?;
        if !status.success() {
            bail!("{} failed ({})", program, status);
        }
    }
    println!("- Configured {}", iface);
    Ok(())
}

pub fn bba(args: BbaArgs) -> Result<()> {
    let kernel = KernelElf::load(&args.elf)?;
    let load = match args.load {
        Some(load) => load,
        None => kernel.section_address(".text")?,
    };
    let start = args.start.resolve(Some(&kernel), false)?;

    let binary = fs::read(&args.binary)
        .with_context(|| format!("Failed to read {}", args.binary.display()))?;

    setup_network(&args.network, &args.target_ip.to_string())?;

    let target = SocketAddr::from((args.target_ip, args.target_port));
    let mut loader = BbaLoader::connect(target, Duration::from_secs(args.timeout))?;

    println!(
        "- Uploading {} bytes to 0x{:X} on {}",
        binary.len(),
        load,
        target
    );
    loader.upload(load, &binary, || {
        print!(".");
        let _ = io::stdout().flush();
    })?;
    println!();

    loader.execute(start)?;
    println!("- Executing at 0x{:X}", start);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::path::PathBuf;

    #[test]
    fn test_dbug_filename() {
        assert_eq!(
            dbug_filename(Path::new("/build/obj/kernel.elf")).unwrap(),
            "kernel.elf"
        );
        assert!(dbug_filename(Path::new("/")).is_err());
    }

    #[test]
    fn test_network_commands() {
        let network = NetworkArgs {
            setup_network: Some("eth0".to_string()),
            host_ip: Ipv4Addr::new(192, 168, 2, 1),
            mac: "00:d0:f1:02:bc:5d".to_string(),
        };
        let [ifconfig, arp] = network_commands("eth0", &network, "192.168.2.2");
        assert_eq!(ifconfig, ["ifconfig", "-v", "eth0", "192.168.2.1"]);
        assert_eq!(arp, ["arp", "-s", "192.168.2.2", "00:d0:f1:02:bc:5d"]);
    }

    #[test]
    fn test_explicit_start_skips_elf() {
        let address = resolve_start(
            &StartAddress::Address(0x8000_0001),
            &PathBuf::from("missing.elf"),
            true,
        )
        .unwrap();
        assert_eq!(address, 0x8000_0000);

        assert!(
            resolve_start(
                &StartAddress::Symbol("_start".to_string()),
                &PathBuf::from("missing.elf"),
                false
            )
            .is_err()
        );
    }
}
