// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! PC-x86 bootable floppy and hard disk images.
//!
//! Floppy: 1.44MB, 80/2/18 geometry.  The boot sector is at CHS(0,0,1) and
//! the kernel follows from CHS(0,0,2).
//!
//! Hard disk: X/16/63 geometry.  The whole first cylinder is reserved for the
//! MBR, and a single bootable partition starts on the following cylinder
//! boundary.  The partition boot sector is at CHS(1,0,1) and the kernel
//! follows from CHS(1,0,2).

use deku::prelude::*;
use static_assertions::const_assert_eq;
use sweetada_common::bytes::sectors_for;

use crate::{Define, DiskImage, ImageError, Section};

pub const SECTOR_SIZE: usize = 512;

/// Offset of the first partition descriptor within the MBR.
pub const PARTITION_TABLE_OFFSET: usize = 0x1BE;

pub const BOOTABLE: u8 = 0x80;

/// FAT32, CHS addressing
pub const PARTITION_TYPE_FAT32_CHS: u8 = 0x0B;

pub const FLOPPY_GEOMETRY: Geometry = Geometry {
    cylinders: 80,
    heads: 2,
    sectors_per_track: 18,
};

pub const HD_HEADS: u32 = 16;
pub const HD_SECTORS_PER_TRACK: u32 = 63;

/// Disk geometry as seen by the INT 0x13 CHS interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cylinders: u32,
    pub heads: u32,
    pub sectors_per_track: u32,
}

impl Geometry {
    pub fn new(cylinders: u32, heads: u32, sectors_per_track: u32) -> Result<Self, ImageError> {
        let geometry = Self {
            cylinders,
            heads,
            sectors_per_track,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// CHS limits: 10 bit cylinder, 8 bit head, 6 bit sector (1-based).
    pub fn validate(&self) -> Result<(), ImageError> {
        if self.cylinders == 0 || self.cylinders > 1024 {
            return Err(ImageError::InvalidGeometry(format!(
                "{} cylinders, must be 1-1024",
                self.cylinders
            )));
        }
        if self.heads == 0 || self.heads > 255 {
            return Err(ImageError::InvalidGeometry(format!(
                "{} heads, must be 1-255",
                self.heads
            )));
        }
        if self.sectors_per_track == 0 || self.sectors_per_track > 63 {
            return Err(ImageError::InvalidGeometry(format!(
                "{} sectors per track, must be 1-63",
                self.sectors_per_track
            )));
        }
        Ok(())
    }

    pub fn sectors_per_cylinder(&self) -> u32 {
        self.heads * self.sectors_per_track
    }

    pub fn total_sectors(&self) -> u32 {
        self.cylinders * self.sectors_per_cylinder()
    }

    pub fn size_bytes(&self) -> u64 {
        self.total_sectors() as u64 * SECTOR_SIZE as u64
    }
}

/// CHS address in the packed INT 0x13 layout used by partition entries:
/// the sector byte carries the 2 high cylinder bits in bits 6-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
pub struct Chs {
    pub head: u8,
    pub sector: u8,
    pub cylinder_low: u8,
}

impl Chs {
    pub fn cylinder(&self) -> u32 {
        self.cylinder_low as u32 | (((self.sector & 0xC0) as u32) << 2)
    }

    /// 1-based sector number.
    pub fn sector_number(&self) -> u32 {
        (self.sector & 0x3F) as u32
    }
}

/// Converts a logical (LBA) sector number to packed CHS.
///
/// The geometry must be valid, see [`Geometry::validate()`].
pub fn ls2chs(sector: u32, geometry: &Geometry) -> Chs {
    let spt = geometry.sectors_per_track;
    let hpc = geometry.heads;
    let c = (sector / (spt * hpc)) % geometry.cylinders;
    Chs {
        head: ((sector / spt) % hpc) as u8,
        sector: ((sector % spt) + 1 + (c / 256) * 64) as u8,
        cylinder_low: (c % 256) as u8,
    }
}

/// Converts packed CHS back to a logical sector number.
pub fn chs2ls(chs: &Chs, geometry: &Geometry) -> u32 {
    (chs.cylinder() * geometry.heads + chs.head as u32) * geometry.sectors_per_track
        + chs.sector_number()
        - 1
}

const PARTITION_ENTRY_SIZE: usize = 16;
const_assert_eq!(
    core::mem::size_of::<PartitionEntry>(),
    PARTITION_ENTRY_SIZE
);

/// MBR partition descriptor.
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
pub struct PartitionEntry {
    pub boot_indicator: u8,
    pub start: Chs,
    pub partition_type: u8,
    /// Last sector of the partition, not the following one
    pub end: Chs,
    #[deku(endian = "little")]
    pub lba_start: u32,
    #[deku(endian = "little")]
    pub lba_size: u32,
}

impl PartitionEntry {
    pub fn bootable(start: u32, size: u32, partition_type: u8, geometry: &Geometry) -> Self {
        Self {
            boot_indicator: BOOTABLE,
            start: ls2chs(start, geometry),
            partition_type,
            end: ls2chs(start + size - 1, geometry),
            lba_start: start,
            lba_size: size,
        }
    }

    pub fn to_bytes_checked(&self) -> Result<[u8; PARTITION_ENTRY_SIZE], ImageError> {
        let bytes = self.to_bytes()?;
        let mut entry = [0u8; PARTITION_ENTRY_SIZE];
        entry.copy_from_slice(&bytes);
        Ok(entry)
    }
}

fn single_sector(what: &'static str, data: &[u8]) -> Result<Vec<u8>, ImageError> {
    if data.len() > SECTOR_SIZE {
        return Err(ImageError::TooLarge {
            what,
            size: data.len(),
            capacity: SECTOR_SIZE,
        });
    }
    let mut sector = data.to_vec();
    sector.resize(SECTOR_SIZE, 0);
    Ok(sector)
}

/// Layout of a bootable 1.44MB floppy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloppyLayout {
    pub kernel_sectors: u32,
}

impl FloppyLayout {
    pub fn new(kernel_len: usize) -> Result<Self, ImageError> {
        let capacity = (FLOPPY_GEOMETRY.total_sectors() as usize - 1) * SECTOR_SIZE;
        if kernel_len > capacity {
            return Err(ImageError::TooLarge {
                what: "kernel",
                size: kernel_len,
                capacity,
            });
        }
        Ok(Self {
            kernel_sectors: sectors_for(kernel_len, SECTOR_SIZE) as u32,
        })
    }

    pub fn boot_defines(&self, boot_segment: &str) -> Vec<Define> {
        vec![
            Define::flag("FLOPPYDISK"),
            Define::value("NSECTORS", self.kernel_sectors),
            Define::value("BOOTSEGMENT", boot_segment),
            Define::flag("DELAY"),
        ]
    }

    pub fn build(&self, bootsector: &[u8], kernel: &[u8]) -> Result<DiskImage, ImageError> {
        let bootsector = single_sector("boot sector", bootsector)?;
        Ok(DiskImage {
            size: FLOPPY_GEOMETRY.size_bytes(),
            sections: vec![
                Section {
                    offset: 0,
                    data: bootsector,
                },
                Section {
                    offset: SECTOR_SIZE as u64,
                    data: kernel.to_vec(),
                },
            ],
        })
    }
}

/// Layout of a bootable hard disk, sized to just fit the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardDiskLayout {
    pub geometry: Geometry,
    pub kernel_sectors: u32,
    pub partition_start: u32,
    pub partition_size: u32,
}

impl HardDiskLayout {
    pub fn new(kernel_len: usize) -> Result<Self, ImageError> {
        let spc = HD_HEADS * HD_SECTORS_PER_TRACK;
        let kernel_sectors = u32::try_from(sectors_for(kernel_len, SECTOR_SIZE)).map_err(|_| {
            ImageError::FieldOverflow {
                what: "kernel sector count",
                value: kernel_len as u64,
                bits: 32,
            }
        })?;

        // The partition holds the boot sector followed by the kernel.
        let partition_cylinders = (kernel_sectors + 1).div_ceil(spc);

        // One extra cylinder for the MBR.
        let geometry = Geometry::new(partition_cylinders + 1, HD_HEADS, HD_SECTORS_PER_TRACK)?;

        Ok(Self {
            geometry,
            kernel_sectors,
            partition_start: spc,
            partition_size: partition_cylinders * spc,
        })
    }

    pub fn mbr_sectors(&self) -> u32 {
        self.geometry.sectors_per_cylinder()
    }

    pub fn partition_entry(&self) -> PartitionEntry {
        PartitionEntry::bootable(
            self.partition_start,
            self.partition_size,
            PARTITION_TYPE_FAT32_CHS,
            &self.geometry,
        )
    }

    /// Partitions larger than 65535 sectors only fit the long size field.
    pub fn boot_defines(&self, boot_segment: &str) -> Vec<Define> {
        let (short_size, long_size) = if self.partition_size > 65535 {
            (0, self.partition_size)
        } else {
            (self.partition_size, 0)
        };
        vec![
            Define::value("CYLINDERS", self.geometry.cylinders),
            Define::value("HEADS", self.geometry.heads),
            Define::value("SPT", self.geometry.sectors_per_track),
            Define::value("PARTITION_SECTOR_START", self.partition_start),
            Define::value("PARTITION_SECTORS_SSIZE", short_size),
            Define::value("PARTITION_SECTORS_LSIZE", long_size),
            Define::value("NSECTORS", self.kernel_sectors),
            Define::value("BOOTSEGMENT", boot_segment),
            Define::flag("DELAY"),
        ]
    }

    pub fn build(
        &self,
        mbr: &[u8],
        bootsector: &[u8],
        kernel: &[u8],
    ) -> Result<DiskImage, ImageError> {
        let mut mbr = single_sector("MBR", mbr)?;
        let entry = self.partition_entry().to_bytes_checked()?;
        mbr[PARTITION_TABLE_OFFSET..PARTITION_TABLE_OFFSET + entry.len()].copy_from_slice(&entry);

        let bootsector = single_sector("boot sector", bootsector)?;
        let boot_offset = self.partition_start as u64 * SECTOR_SIZE as u64;

        log::debug!(
            "Hard disk {} cylinders, partition start {} size {}",
            self.geometry.cylinders,
            self.partition_start,
            self.partition_size
        );

        Ok(DiskImage {
            size: self.geometry.size_bytes(),
            sections: vec![
                Section {
                    offset: 0,
                    data: mbr,
                },
                Section {
                    offset: boot_offset,
                    data: bootsector,
                },
                Section {
                    offset: boot_offset + SECTOR_SIZE as u64,
                    data: kernel.to_vec(),
                },
            ],
        })
    }
}
