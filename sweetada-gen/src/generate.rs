// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! One function per image type, each reading its inputs, building the image
//! in memory and writing it out.

use anyhow::{Context, Result};
use std::path::Path;
use sweetada_image::pcx86::{FloppyLayout, HardDiskLayout};
use sweetada_image::s360::DeckOptions;
use sweetada_image::{Define, adf, dreamcast, logisim, qsys, s360};

use crate::args::{CodeSource, ToolchainArgs};
use crate::output::{read_file, read_text, write_disk, write_file};
use crate::toolchain::{Arch, Toolchain};

/// Loads boot code, assembling it with `defines` if given as source.
pub fn boot_code(
    what: &str,
    source: Option<CodeSource>,
    defines: &[Define],
    arch: Arch,
    toolchain: &ToolchainArgs,
) -> Result<Vec<u8>> {
    let defines_text = defines
        .iter()
        .map(|d| d.to_arg())
        .collect::<Vec<_>>()
        .join(" ");
    log::info!("{} defines: {}", what, defines_text);

    match source {
        Some(CodeSource::Binary(path)) => read_file(&path),
        Some(CodeSource::Assembly(path)) => Toolchain::from_args(toolchain)?
            .assemble(&path, defines, arch)
            .with_context(|| format!("Failed to build {} from {}", what, path.display())),
        None => anyhow::bail!("No {} given", what),
    }
}

pub fn adf(
    kernel: &Path,
    load_address: u32,
    entry_point: u32,
    output: &Path,
    boot: Option<CodeSource>,
    toolchain: &ToolchainArgs,
) -> Result<()> {
    let kernel = read_file(kernel)?;
    let sectors = adf::kernel_sectors(kernel.len());
    println!("- Kernel is {} bytes, {} sectors", kernel.len(), sectors);

    let defines = [
        Define::value("LOADADDRESS", format!("0x{load_address:X}")),
        Define::value("NSECTORS", sectors),
        Define::value("ENTRYPOINT", format!("0x{entry_point:X}")),
    ];
    let boot_block = boot_code("boot block", boot, &defines, Arch::M68k, toolchain)?;

    let image = adf::build_adf(&boot_block, &kernel)?;
    write_file(output, &image)
}

fn boot_segment(segment: u32) -> String {
    format!("0x{segment:04X}")
}

pub fn pc_floppy(
    kernel: &Path,
    segment: u32,
    target: &Path,
    device: bool,
    boot: Option<CodeSource>,
    toolchain: &ToolchainArgs,
) -> Result<()> {
    let kernel = read_file(kernel)?;
    let layout = FloppyLayout::new(kernel.len())?;
    println!(
        "- Kernel is {} bytes, {} sectors",
        kernel.len(),
        layout.kernel_sectors
    );

    let defines = layout.boot_defines(&boot_segment(segment));
    let bootsector = boot_code("boot sector", boot, &defines, Arch::I8086, toolchain)?;

    let image = layout.build(&bootsector, &kernel)?;
    write_disk(target, &image, device)
}

pub fn pc_hd(
    kernel: &Path,
    segment: u32,
    target: &Path,
    device: bool,
    mbr: Option<CodeSource>,
    boot: Option<CodeSource>,
    toolchain: &ToolchainArgs,
) -> Result<()> {
    let kernel = read_file(kernel)?;
    let layout = HardDiskLayout::new(kernel.len())?;
    println!(
        "- Kernel is {} bytes, {} sectors",
        kernel.len(),
        layout.kernel_sectors
    );
    println!(
        "- Disk geometry {}/{}/{}, partition at sector {}, {} sectors",
        layout.geometry.cylinders,
        layout.geometry.heads,
        layout.geometry.sectors_per_track,
        layout.partition_start,
        layout.partition_size
    );

    let mbr = boot_code("MBR", mbr, &[], Arch::I8086, toolchain)?;
    let defines = layout.boot_defines(&boot_segment(segment));
    let bootsector = boot_code("boot sector", boot, &defines, Arch::I8086, toolchain)?;

    let image = layout.build(&mbr, &bootsector, &kernel)?;
    write_disk(target, &image, device)
}

pub fn dreamcast(
    template: &Path,
    ip_txt: &Path,
    kernel: &Path,
    ip_out: &Path,
    kernel_out: &Path,
) -> Result<()> {
    let template = read_file(template)?;
    let ip_txt_text = read_text(ip_txt)?;
    let ip = dreamcast::build_ip_bin(&template, &ip_txt_text)
        .with_context(|| format!("Failed to process {}", ip_txt.display()))?;
    if ip.crc_changed() {
        match ip.previous_crc {
            Some(previous) => println!(
                "- Setting CRC to 0x{:04X} (was 0x{:04X})",
                ip.crc, previous
            ),
            None => println!("- Setting CRC to 0x{:04X}", ip.crc),
        }
    }

    let kernel = read_file(kernel)?;
    let first_read = dreamcast::descramble(&kernel);

    write_file(ip_out, &ip.data)?;
    write_file(kernel_out, &first_read)
}

pub fn s360(
    address: u32,
    loader: Option<&Path>,
    psw: bool,
    input: &Path,
    output: &Path,
) -> Result<()> {
    let binary = read_file(input)?;
    let loader = loader.map(read_file).transpose()?;

    let options = DeckOptions {
        address,
        loader: loader.as_deref(),
        psw,
    };
    let (deck, records) = s360::build_deck(&binary, &options)?;
    println!("- Number of records written: {}", records);
    write_file(output, &deck)
}

pub fn logisim(input: &Path, output: Option<&Path>) -> Result<()> {
    let data = read_file(input)?;
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => logisim::default_output_name(&input.to_string_lossy()).into(),
    };
    write_file(&output, logisim::to_logisim(&data).as_bytes())
}

pub fn qsys(
    design: &Path,
    package: &str,
    endpoints: &[String],
    suffix: &str,
    output_dir: &Path,
) -> Result<()> {
    let xml = read_text(design)?;
    let system = qsys::System::parse(&xml)
        .with_context(|| format!("Failed to parse {}", design.display()))?;
    let addresses = qsys::extract(&system, endpoints, suffix)
        .with_context(|| format!("Failed to extract base addresses from {}", design.display()))?;

    let output = output_dir.join(qsys::package_filename(package));
    write_file(&output, qsys::ada_package(package, &addresses).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn no_toolchain() -> ToolchainArgs {
        ToolchainArgs::default()
    }

    #[test]
    fn test_adf_from_prebuilt_boot_block() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = dir.path().join("kernel.bin");
        let boot = dir.path().join("bootblock.bin");
        let output = dir.path().join("kernel.adf");
        fs::write(&kernel, vec![0x4Eu8; 2000]).unwrap();
        let mut boot_block = vec![0u8; adf::BOOT_BLOCK_SIZE];
        boot_block[..4].copy_from_slice(b"DOS\0");
        fs::write(&boot, &boot_block).unwrap();

        adf(
            &kernel,
            0x20000,
            0x20000,
            &output,
            Some(CodeSource::Binary(boot)),
            &no_toolchain(),
        )
        .unwrap();

        let image = fs::read(&output).unwrap();
        assert_eq!(image.len(), adf::DISK_SIZE);
        assert_eq!(image[1024], 0x4E);
    }

    #[test]
    fn test_assembly_needs_toolchain() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = dir.path().join("kernel.bin");
        let output = dir.path().join("fd.img");
        fs::write(&kernel, [0u8; 16]).unwrap();

        let result = pc_floppy(
            &kernel,
            0x1000,
            &output,
            false,
            Some(CodeSource::Assembly(dir.path().join("bootsector.S"))),
            &no_toolchain(),
        );
        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_pc_hd_image() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = dir.path().join("kernel.bin");
        let mbr = dir.path().join("mbr.bin");
        let boot = dir.path().join("bootsector.bin");
        let output = dir.path().join("hd.img");
        fs::write(&kernel, vec![0x42u8; 4096]).unwrap();
        fs::write(&mbr, [0xFAu8; 446]).unwrap();
        fs::write(&boot, [0xEBu8; 512]).unwrap();

        pc_hd(
            &kernel,
            0x1000,
            &output,
            false,
            Some(CodeSource::Binary(mbr)),
            Some(CodeSource::Binary(boot)),
            &no_toolchain(),
        )
        .unwrap();

        let image = fs::read(&output).unwrap();
        assert_eq!(image.len(), 2 * 16 * 63 * 512);
        assert_eq!(image[0x1BE], 0x80);
        assert_eq!(image[16 * 63 * 512], 0xEB);
        assert_eq!(image[(16 * 63 + 1) * 512], 0x42);
    }

    #[test]
    fn test_s360_deck() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("kernel.bin");
        let output = dir.path().join("kernel.obj");
        fs::write(&input, vec![0x07u8; 100]).unwrap();

        s360(0x18, None, true, &input, &output).unwrap();
        let deck = fs::read(&output).unwrap();
        // ESD, PSW, 2 TXT, END
        assert_eq!(deck.len(), 5 * s360::RECORD_SIZE);
    }

    #[test]
    fn test_logisim_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rom.bin");
        fs::write(&input, [0x12u8, 0x34]).unwrap();

        logisim(&input, None).unwrap();
        let text = fs::read_to_string(dir.path().join("rom.bin.srec")).unwrap();
        assert_eq!(text, "v2.0 raw\n\n12 34\n");
    }

    #[test]
    fn test_qsys_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let design = dir.path().join("system.qsys");
        fs::write(
            &design,
            r#"<system><connection end="timer_0.s1"><parameter name="baseAddress" value="0x00002000"/></connection></system>"#,
        )
        .unwrap();

        let endpoints = vec!["timer_0".to_string(), "uart_0".to_string()];
        assert!(qsys(&design, "Addresses", &endpoints, "s1", dir.path()).is_err());
        assert!(!dir.path().join("addresses.ads").exists());

        qsys(&design, "Addresses", &endpoints[..1], "s1", dir.path()).unwrap();
        let ads = fs::read_to_string(dir.path().join("addresses.ads")).unwrap();
        assert!(ads.contains("timer_0_s1_ADDRESS : constant := 16#0000_2000#;"));
    }

    #[test]
    fn test_dreamcast_files() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("IP.TMPL");
        let ip_txt = dir.path().join("IP.TXT");
        let kernel = dir.path().join("kernel.bin");
        let ip_out = dir.path().join("IP.BIN");
        let kernel_out = dir.path().join("1ST_READ.BIN");
        fs::write(&template, vec![0x20u8; dreamcast::IP_BIN_SIZE]).unwrap();
        fs::write(&ip_txt, "Product No: T-00000\nVersion: V1.000\n").unwrap();
        fs::write(&kernel, vec![0u8; 4100]).unwrap();

        dreamcast(&template, &ip_txt, &kernel, &ip_out, &kernel_out).unwrap();
        assert_eq!(&fs::read(&ip_out).unwrap()[0x20..0x24], b"2BF2");
        assert_eq!(fs::read(&kernel_out).unwrap().len(), 4100);
    }
}
