// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Builds boot code from assembly source with the target toolchain:
//! compile to an object, link at address 0 to a flat binary and, if an
//! objdump is available, write a disassembly listing of that binary.

use anyhow::{Context, Result, bail};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use sweetada_image::Define;

use crate::args::ToolchainArgs;

/// CPU the boot code runs on, which selects how the flat binary is
/// disassembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    M68k,
    I8086,
}

impl Arch {
    /// objdump `-m` machine name.
    pub fn machine(&self) -> &'static str {
        match self {
            Arch::M68k => "m68k",
            Arch::I8086 => "i8086",
        }
    }

    /// objdump `-M` disassembler options.
    pub fn disassembler_options(&self) -> Option<&'static str> {
        match self {
            Arch::M68k => None,
            Arch::I8086 => Some("i8086"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toolchain {
    cc: PathBuf,
    ld: PathBuf,
    objdump: Option<PathBuf>,
    objdump_machine: Option<String>,
    build_dir: PathBuf,
}

/// Files produced for one piece of boot code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outputs {
    pub object: PathBuf,
    pub binary: PathBuf,
    pub listing: PathBuf,
}

impl Outputs {
    fn new(build_dir: &Path, source: &Path) -> Result<Self> {
        let stem = source
            .file_stem()
            .with_context(|| format!("No file name in {}", source.display()))?;
        let with_extension = |extension: &str| {
            let mut name = stem.to_os_string();
            name.push(".");
            name.push(extension);
            build_dir.join(name)
        };
        Ok(Self {
            object: with_extension("o"),
            binary: with_extension("bin"),
            listing: with_extension("lst"),
        })
    }
}

impl Toolchain {
    pub fn from_args(args: &ToolchainArgs) -> Result<Self> {
        let Some(cc) = args.cc.clone() else {
            bail!("Assembling boot code needs a compiler, use --cc or set TOOLCHAIN_CC");
        };
        let Some(ld) = args.ld.clone() else {
            bail!("Assembling boot code needs a linker, use --ld or set TOOLCHAIN_LD");
        };
        Ok(Self {
            cc,
            ld,
            objdump: args.objdump.clone(),
            objdump_machine: args.objdump_machine.clone(),
            build_dir: args.build_dir.clone(),
        })
    }

    pub fn compile_args(source: &Path, object: &Path, defines: &[Define]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-o".into(), object.into(), "-c".into()];
        args.extend(defines.iter().map(|d| OsString::from(d.to_arg())));
        args.push(source.into());
        args
    }

    pub fn link_args(object: &Path, binary: &Path) -> Vec<OsString> {
        vec![
            "-o".into(),
            binary.into(),
            "-Ttext=0".into(),
            "--oformat=binary".into(),
            object.into(),
        ]
    }

    /// Disassembles the flat binary rather than the object, so the listing
    /// shows exactly the bytes that go into the image.  An explicit machine
    /// replaces the architecture's machine and options.
    pub fn listing_args(arch: Arch, machine: Option<&str>, binary: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-D".into(), "-b".into(), "binary".into()];
        match machine {
            Some(machine) => args.extend(["-m".into(), machine.into()]),
            None => {
                args.extend(["-m".into(), arch.machine().into()]);
                if let Some(options) = arch.disassembler_options() {
                    args.extend(["-M".into(), options.into()]);
                }
            }
        }
        args.push(binary.into());
        args
    }

    /// Builds `source` and returns the flat binary.
    pub fn assemble(&self, source: &Path, defines: &[Define], arch: Arch) -> Result<Vec<u8>> {
        let outputs = Outputs::new(&self.build_dir, source)?;

        run(&self.cc, &Self::compile_args(source, &outputs.object, defines))?;
        run(&self.ld, &Self::link_args(&outputs.object, &outputs.binary))?;

        if let Some(objdump) = &self.objdump {
            let args =
                Self::listing_args(arch, self.objdump_machine.as_deref(), &outputs.binary);
            log::debug!("{} {:?}", objdump.display(), args);
            let output = Command::new(objdump)
                .args(&args)
                .output()
                .with_context(|| format!("Failed to run {}", objdump.display()))?;
            if !output.status.success() {
                bail!("{} failed ({})", objdump.display(), output.status);
            }
            fs::write(&outputs.listing, &output.stdout)
                .with_context(|| format!("Failed to write {}", outputs.listing.display()))?;
        }

        let binary = fs::read(&outputs.binary)
            .with_context(|| format!("Failed to read {}", outputs.binary.display()))?;
        println!(
            "- Built {} ({} bytes)",
            outputs.binary.display(),
            binary.len()
        );
        Ok(binary)
    }
}

fn run(program: &Path, args: &[OsString]) -> Result<()> {
    log::debug!("{} {:?}", program.display(), args);
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {}", program.display()))?;
    if !status.success() {
        bail!("{} failed ({})", program.display(), status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_args() {
        let args = Toolchain::compile_args(
            Path::new("boot/bootsector.S"),
            Path::new("build/bootsector.o"),
            &[Define::value("NSECTORS", 12), Define::flag("DELAY")],
        );
        assert_eq!(
            args,
            vec![
                "-o",
                "build/bootsector.o",
                "-c",
                "-DNSECTORS=12",
                "-DDELAY",
                "boot/bootsector.S"
            ]
        );
    }

    #[test]
    fn test_link_args() {
        let args = Toolchain::link_args(Path::new("b.o"), Path::new("b.bin"));
        assert_eq!(args, vec!["-o", "b.bin", "-Ttext=0", "--oformat=binary", "b.o"]);
    }

    #[test]
    fn test_listing_args() {
        let args = Toolchain::listing_args(Arch::M68k, None, Path::new("build/bootblock.bin"));
        assert_eq!(
            args,
            vec!["-D", "-b", "binary", "-m", "m68k", "build/bootblock.bin"]
        );

        let args = Toolchain::listing_args(Arch::I8086, None, Path::new("mbr.bin"));
        assert_eq!(
            args,
            vec!["-D", "-b", "binary", "-m", "i8086", "-M", "i8086", "mbr.bin"]
        );

        let args = Toolchain::listing_args(Arch::M68k, Some("m68k:68020"), Path::new("b.bin"));
        assert_eq!(args, vec!["-D", "-b", "binary", "-m", "m68k:68020", "b.bin"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_listing_of_flat_binary() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("boot.S");
        fs::write(&source, "").unwrap();
        fs::write(dir.path().join("boot.bin"), [0x4E, 0x75]).unwrap();
        // `echo` stands in for objdump, so the listing records its arguments.
        let toolchain = Toolchain {
            cc: PathBuf::from("true"),
            ld: PathBuf::from("true"),
            objdump: Some(PathBuf::from("echo")),
            objdump_machine: None,
            build_dir: dir.path().to_path_buf(),
        };
        let binary = toolchain.assemble(&source, &[], Arch::M68k).unwrap();
        assert_eq!(binary, [0x4E, 0x75]);

        let listing = fs::read_to_string(dir.path().join("boot.lst")).unwrap();
        assert!(listing.starts_with("-D -b binary -m m68k "));
        assert!(listing.trim_end().ends_with("boot.bin"));
    }

    #[test]
    fn test_outputs() {
        let outputs = Outputs::new(Path::new("build"), Path::new("src/mbr.S")).unwrap();
        assert_eq!(outputs.object, PathBuf::from("build/mbr.o"));
        assert_eq!(outputs.binary, PathBuf::from("build/mbr.bin"));
        assert_eq!(outputs.listing, PathBuf::from("build/mbr.lst"));
    }

    #[test]
    fn test_missing_tools() {
        let args = ToolchainArgs {
            cc: Some(PathBuf::from("gcc")),
            ..Default::default()
        };
        assert!(Toolchain::from_args(&args).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("boot.S");
        fs::write(&source, "").unwrap();
        let toolchain = Toolchain {
            cc: PathBuf::from("false"),
            ld: PathBuf::from("true"),
            objdump: None,
            objdump_machine: None,
            build_dir: dir.path().to_path_buf(),
        };
        let error = toolchain.assemble(&source, &[], Arch::I8086).unwrap_err();
        assert!(error.to_string().contains("false failed"));
    }
}
