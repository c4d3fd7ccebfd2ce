// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use clap::{Args, Parser, Subcommand};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use sweetada_common::args::{parse_baud_rate, parse_flow_control, parse_hex};
use sweetada_common::elf::StartAddress;
use sweetada_link::serial::{BaudRate, FlowControl};
use sweetada_link::{bba, openocd};

#[derive(Parser, Debug)]
#[command(name = "sweetada-flash")]
#[command(about = "Downloads SweetAda kernels to targets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drives an OpenOCD server over its Tcl RPC port: starts or stops the
    /// server, or loads and runs a kernel.
    Openocd(OpenocdArgs),

    /// Sends an S-record file to a serial monitor
    Srec {
        /// S-record file
        file: PathBuf,

        /// Serial port
        port: String,

        /// Baud rate
        #[arg(value_parser = parse_baud_rate)]
        baud: BaudRate,

        /// Flow control (none, software, hardware)
        #[arg(long, value_parser = parse_flow_control, default_value = "none")]
        flow_control: FlowControl,
    },

    /// Has a ColdFire dBUG monitor download a kernel over the network and
    /// run it
    Dbug {
        /// Serial port of the dBUG console
        #[arg(short, long)]
        port: String,

        /// Baud rate
        #[arg(short, long, value_parser = parse_baud_rate)]
        baud: BaudRate,

        /// Kernel ELF file.  The monitor is asked to download its base name.
        #[arg(short = 'f', long)]
        elf: PathBuf,

        /// Start symbol, or a 0x prefixed address
        #[arg(short, long, value_parser = StartAddress::parse)]
        start: StartAddress,

        /// Serial read timeout, in seconds
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },

    /// Uploads a kernel to a Dreamcast with a Broadband Adapter
    Bba(BbaArgs),
}

#[derive(Args, Debug)]
pub struct OpenocdArgs {
    /// Launch an OpenOCD server with the given configuration file, in a new
    /// terminal, then exit
    #[arg(long, value_name = "CFG")]
    pub server: Option<PathBuf>,

    /// OpenOCD installation prefix, its bin directory is added to PATH
    #[arg(long, env = "OPENOCD_PREFIX")]
    pub prefix: Option<PathBuf>,

    /// Keep the server terminal open after OpenOCD exits
    #[arg(short, long)]
    pub wait: bool,

    /// Ask the running server to shut down, then exit
    #[arg(long)]
    pub shutdown: bool,

    /// Kernel ELF file
    #[arg(short = 'f', long)]
    pub elf: Option<PathBuf>,

    /// Start symbol, or a 0x prefixed address
    #[arg(short, long, value_parser = StartAddress::parse)]
    pub start: Option<StartAddress>,

    /// Clear bit 0 of the start address (ARM Thumb)
    #[arg(long)]
    pub thumb: bool,

    /// Load but don't run, and tell the configuration script to prepare
    /// for debugging
    #[arg(long)]
    pub debug: bool,

    /// Don't load the kernel
    #[arg(long)]
    pub noload: bool,

    /// Don't run the kernel
    #[arg(long)]
    pub noexec: bool,

    /// Tcl file to source before loading
    #[arg(long)]
    pub command_file: Option<PathBuf>,

    /// ';' separated commands to run before loading
    #[arg(long)]
    pub commands: Option<String>,

    /// JSON target profile
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// RPC server host
    #[arg(long, default_value = openocd::DEFAULT_HOST)]
    pub host: String,

    /// RPC server port
    #[arg(long, default_value_t = openocd::DEFAULT_PORT)]
    pub rpc_port: u16,
}

#[derive(Args, Debug)]
pub struct BbaArgs {
    /// Kernel ELF file, for the load and start addresses
    #[arg(long)]
    pub elf: PathBuf,

    /// Kernel flat binary to upload
    #[arg(long)]
    pub binary: PathBuf,

    /// Dreamcast IP address
    #[arg(long, default_value = bba::DEFAULT_TARGET_IP)]
    pub target_ip: Ipv4Addr,

    /// Loader UDP port
    #[arg(long, default_value_t = bba::DEFAULT_PORT)]
    pub target_port: u16,

    /// Load address (hex), instead of the ELF .text address
    #[arg(long, value_parser = parse_hex)]
    pub load: Option<u32>,

    /// Start symbol, or a 0x prefixed address
    #[arg(long, value_parser = StartAddress::parse, default_value = "_start")]
    pub start: StartAddress,

    /// Reply timeout, in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,

    #[command(flatten)]
    pub network: NetworkArgs,
}

/// Host network setup, run before uploading.
#[derive(Args, Debug)]
pub struct NetworkArgs {
    /// Configure the given interface and a static ARP entry for the target
    #[arg(long, value_name = "IFACE")]
    pub setup_network: Option<String>,

    /// Host address given to the interface
    #[arg(long, default_value = bba::DEFAULT_HOST_IP, requires = "setup_network")]
    pub host_ip: Ipv4Addr,

    /// Broadband Adapter MAC address
    #[arg(long, default_value = bba::DEFAULT_MAC, requires = "setup_network")]
    pub mac: String,
}

impl Cli {
    /// Checks constraints clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Openocd(args) => {
                if args.shutdown {
                    return Ok(());
                }
                if args.server.is_some() {
                    if args.prefix.is_none() {
                        return Err(
                            "No OpenOCD prefix, use --prefix or set OPENOCD_PREFIX".to_string()
                        );
                    }
                    return Ok(());
                }
                if args.elf.is_none() {
                    return Err("ELF file not specified".to_string());
                }
                if args.start.is_none() {
                    return Err("Start symbol not specified".to_string());
                }
            }
            Command::Bba(args) => {
                let mac = &args.network.mac;
                let valid = mac.split(':').count() == 6
                    && mac
                        .split(':')
                        .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
                if !valid {
                    return Err(format!("Invalid MAC address: {}", mac));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sweetada-flash").chain(args.iter().copied()))
    }

    #[test]
    fn test_openocd_download_args() {
        let cli = parse(&[
            "openocd",
            "-f",
            "kernel.elf",
            "-s",
            "_start",
            "--thumb",
            "--commands",
            "halt;reset init",
        ])
        .unwrap();
        assert!(cli.validate().is_ok());
        match cli.command {
            Command::Openocd(args) => {
                assert_eq!(args.start, Some(StartAddress::Symbol("_start".to_string())));
                assert!(args.thumb);
                assert_eq!(args.host, "127.0.0.1");
                assert_eq!(args.rpc_port, 6666);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_openocd_requirements() {
        let cli = parse(&["openocd", "-s", "0x1000"]).unwrap();
        assert!(cli.validate().is_err());

        let cli = parse(&["openocd", "--shutdown"]).unwrap();
        assert!(cli.validate().is_ok());

        let cli = parse(&["openocd", "--server", "board.cfg", "--prefix", "/opt/openocd"]).unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_dbug_args() {
        let cli = parse(&[
            "dbug", "-p", "/dev/ttyUSB0", "-b", "19200", "-f", "kernel.elf", "-s", "0x10000",
        ])
        .unwrap();
        match cli.command {
            Command::Dbug {
                start, timeout, ..
            } => {
                assert_eq!(start, StartAddress::Address(0x10000));
                assert_eq!(timeout, 5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_srec_args() {
        assert!(parse(&["srec", "kernel.srec", "/dev/ttyS0", "fast"]).is_err());
        assert!(parse(&["srec", "kernel.srec", "/dev/ttyS0", "38400"]).is_ok());
    }

    #[test]
    fn test_bba_args() {
        let cli = parse(&["bba", "--elf", "kernel.elf", "--binary", "kernel.bin"]).unwrap();
        assert!(cli.validate().is_ok());
        match cli.command {
            Command::Bba(args) => {
                assert_eq!(args.target_ip, Ipv4Addr::new(192, 168, 2, 2));
                assert_eq!(args.target_port, 31313);
                assert_eq!(args.start, StartAddress::Symbol("_start".to_string()));
                assert!(args.network.setup_network.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = parse(&[
            "bba",
            "--elf",
            "k.elf",
            "--binary",
            "k.bin",
            "--setup-network",
            "eth0",
            "--mac",
            "00:d0:f1:02:bc",
        ])
        .unwrap();
        assert!(cli.validate().is_err());
    }
}
