// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! File and device I/O.  Images are always complete in memory before
//! anything is written.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use sweetada_image::DiskImage;

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("- Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Writes a disk image either as a new, full size, file or in place onto an
/// existing device, touching only the sections the image defines.
pub fn write_disk(path: &Path, image: &DiskImage, device: bool) -> Result<()> {
    if !device {
        return write_file(path, &image.to_bytes());
    }

    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open device {}", path.display()))?;
    for section in &image.sections {
        file.seek(SeekFrom::Start(section.offset))
            .and_then(|_| file.write_all(&section.data))
            .with_context(|| {
                format!(
                    "Failed to write {} bytes at offset {} of {}",
                    section.data.len(),
                    section.offset,
                    path.display()
                )
            })?;
        log::debug!(
            "Wrote {} bytes at offset 0x{:X}",
            section.data.len(),
            section.offset
        );
    }
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", path.display()))?;
    println!("- Wrote {} in place", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweetada_image::Section;

    fn image() -> DiskImage {
        DiskImage {
            size: 2048,
            sections: vec![
                Section {
                    offset: 0,
                    data: vec![0xAA; 4],
                },
                Section {
                    offset: 1024,
                    data: vec![0xBB; 4],
                },
            ],
        }
    }

    #[test]
    fn test_write_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        write_disk(&path, &image(), false).unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 2048);
        assert_eq!(&data[..4], &[0xAA; 4]);
        assert_eq!(&data[1024..1028], &[0xBB; 4]);
        assert!(data[1028..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_write_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device");
        fs::write(&path, vec![0x11u8; 4096]).unwrap();
        write_disk(&path, &image(), true).unwrap();

        let data = fs::read(&path).unwrap();
        // Not truncated, and untouched outside the sections.
        assert_eq!(data.len(), 4096);
        assert_eq!(&data[..4], &[0xAA; 4]);
        assert_eq!(data[4], 0x11);
        assert_eq!(&data[1024..1028], &[0xBB; 4]);
        assert_eq!(data[4095], 0x11);
    }

    #[test]
    fn test_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nothing");
        assert!(write_disk(&path, &image(), true).is_err());
        assert!(!path.exists());
    }
}
