// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sweetada-image
//!
//! Builds the boot and disk images used to start SweetAda kernels on the
//! various supported targets:
//! - [`adf`] - Amiga floppy disk (ADF) with a checksummed boot block
//! - [`pcx86`] - PC-x86 bootable floppy and hard disk images (CHS/MBR)
//! - [`dreamcast`] - Dreamcast `IP.BIN` and descrambled `1ST_READ.BIN`
//! - [`s360`] - IPL-able S/360 object decks in EBCDIC card format
//! - [`logisim`] - Logisim "v2.0 raw" memory images
//! - [`qsys`] - base address extraction from Quartus QSYS design files
//!
//! Every builder is a pure function from input bytes to output bytes.
//! Callers do the file I/O, so a failed build never leaves a partial file
//! behind.

pub mod adf;
pub mod dreamcast;
mod error;
pub mod logisim;
pub mod pcx86;
pub mod qsys;
pub mod s360;

pub use error::ImageError;

/// A preprocessor symbol passed to the toolchain when assembling boot code,
/// e.g. `-DNSECTORS=12` or `-DDELAY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: &'static str,
    pub value: Option<String>,
}

impl Define {
    pub fn flag(name: &'static str) -> Self {
        Self { name, value: None }
    }

    pub fn value<V: ToString>(name: &'static str, value: V) -> Self {
        Self {
            name,
            value: Some(value.to_string()),
        }
    }

    /// Renders as a compiler command line argument.
    pub fn to_arg(&self) -> String {
        match &self.value {
            Some(value) => format!("-D{}={}", self.name, value),
            None => format!("-D{}", self.name),
        }
    }
}

/// A chunk of data at a fixed byte offset within a disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub offset: u64,
    pub data: Vec<u8>,
}

/// A disk image described as sections, so it can either be flattened into a
/// new image file or written in place onto an existing device.
#[derive(Debug, Clone)]
pub struct DiskImage {
    pub size: u64,
    pub sections: Vec<Section>,
}

impl DiskImage {
    /// Flattens the image, zero filling everything not covered by a section.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut image = vec![0u8; self.size as usize];
        for section in &self.sections {
            let start = section.offset as usize;
            image[start..start + section.data.len()].copy_from_slice(&section.data);
        }
        image
    }
}
