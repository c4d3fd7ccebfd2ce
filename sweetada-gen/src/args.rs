// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use sweetada_common::args::parse_hex;
use sweetada_image::qsys::DEFAULT_SLAVE_SUFFIX;

#[derive(Parser, Debug)]
#[command(name = "sweetada-gen")]
#[command(about = "SweetAda boot and disk image generator")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub toolchain: ToolchainArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Tools used to build boot code from assembly sources.
#[derive(Args, Debug, Clone, Default)]
pub struct ToolchainArgs {
    /// Compiler driver, used to assemble boot code
    #[arg(long, env = "TOOLCHAIN_CC", global = true)]
    pub cc: Option<PathBuf>,

    /// Linker, used to produce flat binary boot code
    #[arg(long, env = "TOOLCHAIN_LD", global = true)]
    pub ld: Option<PathBuf>,

    /// If set, a disassembly listing is written next to the boot code
    #[arg(long, env = "TOOLCHAIN_OBJDUMP", global = true)]
    pub objdump: Option<PathBuf>,

    /// objdump machine for the listing, instead of the target's default
    #[arg(long, global = true)]
    pub objdump_machine: Option<String>,

    /// Directory for intermediate boot code files
    #[arg(long, default_value = ".", global = true)]
    pub build_dir: PathBuf,
}

/// Boot code, either prebuilt or assembled on the fly.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct BootArgs {
    /// Prebuilt flat binary boot code
    #[arg(long)]
    pub boot_bin: Option<PathBuf>,

    /// Boot code assembly source, built with the toolchain
    #[arg(long)]
    pub boot_src: Option<PathBuf>,
}

/// PC-x86 master boot record code.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct MbrArgs {
    /// Prebuilt flat binary MBR code
    #[arg(long)]
    pub mbr_bin: Option<PathBuf>,

    /// MBR assembly source, built with the toolchain
    #[arg(long)]
    pub mbr_src: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    Binary(PathBuf),
    Assembly(PathBuf),
}

fn code_source(bin: &Option<PathBuf>, src: &Option<PathBuf>) -> Option<CodeSource> {
    match (bin, src) {
        (Some(bin), _) => Some(CodeSource::Binary(bin.clone())),
        (None, Some(src)) => Some(CodeSource::Assembly(src.clone())),
        (None, None) => None,
    }
}

impl BootArgs {
    pub fn source(&self) -> Option<CodeSource> {
        code_source(&self.boot_bin, &self.boot_src)
    }
}

impl MbrArgs {
    pub fn source(&self) -> Option<CodeSource> {
        code_source(&self.mbr_bin, &self.mbr_src)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Creates a bootable Amiga ADF floppy image.  The boot block is built
    /// with LOADADDRESS, NSECTORS and ENTRYPOINT defined.
    Adf {
        /// Kernel flat binary
        kernel: PathBuf,

        /// Address the boot block loads the kernel to (hex)
        #[arg(value_parser = parse_hex)]
        load_address: u32,

        /// Address the boot block jumps to (hex)
        #[arg(value_parser = parse_hex)]
        entry_point: u32,

        /// ADF file to create
        output: PathBuf,

        #[command(flatten)]
        boot: BootArgs,
    },

    /// Creates a bootable PC-x86 1.44MB floppy image, or writes one in place
    /// on a floppy device.
    PcFloppy {
        /// Kernel flat binary
        kernel: PathBuf,

        /// Real mode segment the boot sector loads the kernel to (hex)
        #[arg(value_parser = parse_hex)]
        boot_segment: u32,

        /// Image file to create, or device to write
        target: PathBuf,

        /// Write in place on an existing device instead of creating a file
        #[arg(long)]
        device: bool,

        #[command(flatten)]
        boot: BootArgs,
    },

    /// Creates a bootable PC-x86 hard disk image sized to fit the kernel,
    /// with an MBR and a single partition, or writes one in place on a
    /// disk device.
    PcHd {
        /// Kernel flat binary
        kernel: PathBuf,

        /// Real mode segment the boot sector loads the kernel to (hex)
        #[arg(value_parser = parse_hex)]
        boot_segment: u32,

        /// Image file to create, or device to write
        target: PathBuf,

        /// Write in place on an existing device instead of creating a file
        #[arg(long)]
        device: bool,

        #[command(flatten)]
        mbr: MbrArgs,

        #[command(flatten)]
        boot: BootArgs,
    },

    /// Creates the Dreamcast CD-ROM boot files: IP.BIN from a template and
    /// an IP.TXT description, and 1ST_READ.BIN from the kernel.
    Dreamcast {
        /// IP.BIN template (IP.TMPL)
        template: PathBuf,

        /// Header field values (IP.TXT)
        ip_txt: PathBuf,

        /// Kernel flat binary
        kernel: PathBuf,

        /// IP.BIN file to create
        #[arg(long, default_value = "IP.BIN")]
        ip_out: PathBuf,

        /// 1ST_READ.BIN file to create
        #[arg(long, default_value = "1ST_READ.BIN")]
        kernel_out: PathBuf,
    },

    /// Creates an IPL-able S/360 object deck
    S360 {
        /// Load address (hex)
        #[arg(short, long, value_parser = parse_hex, default_value = "18")]
        address: u32,

        /// Card loader to place ahead of the object deck
        #[arg(short, long)]
        loader: Option<PathBuf>,

        /// Add a TXT record setting the IPL PSW
        #[arg(short, long)]
        psw: bool,

        /// Kernel flat binary
        input: PathBuf,

        /// Object deck to create
        output: PathBuf,
    },

    /// Converts a binary to a Logisim "v2.0 raw" memory image
    Logisim {
        /// Binary to convert
        input: PathBuf,

        /// Output file (default: <input>.srec)
        output: Option<PathBuf>,
    },

    /// Extracts base addresses from a QSYS design file into an Ada package
    /// (<package>.ads, lower case)
    Qsys {
        /// QSYS design file
        design: PathBuf,

        /// Ada package name
        package: String,

        /// Components whose base addresses are wanted
        #[arg(required = true)]
        endpoints: Vec<String>,

        /// Slave interface of each component
        #[arg(long, default_value = DEFAULT_SLAVE_SUFFIX)]
        suffix: String,

        /// Directory to write the package to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

impl Cli {
    /// Checks constraints clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::PcFloppy { boot_segment, .. } | Command::PcHd { boot_segment, .. } => {
                if *boot_segment > 0xFFFF {
                    return Err(format!(
                        "Boot segment 0x{:X} is not a 16-bit real mode segment",
                        boot_segment
                    ));
                }
            }
            Command::Qsys { package, .. } => {
                let valid = package.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                    && package
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                if !valid {
                    return Err(format!("Invalid Ada package name: {}", package));
                }
            }
            _ => {}
        }
        Ok(())
    }
}
