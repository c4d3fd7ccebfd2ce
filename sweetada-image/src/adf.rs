// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Amiga Disk File (ADF) creation.
//!
//! A DD floppy is 80 cylinders, 2 heads, 11 sectors of 512 bytes.  The first
//! two sectors are the boot block, which Kickstart only executes if its
//! checksum (the big-endian word at offset 4) is valid.  The kernel follows
//! from sector 2, where the boot block code loads it from.

use byteorder::{BigEndian, ByteOrder};

use crate::ImageError;

pub const SECTOR_SIZE: usize = 512;

/// 80 cylinders x 2 heads x 11 sectors x 512 bytes = 901120 bytes
pub const DISK_SIZE: usize = 80 * 2 * 11 * SECTOR_SIZE;

pub const BOOT_BLOCK_SIZE: usize = 1024;

pub const CHECKSUM_OFFSET: usize = 4;

/// First sector holding the kernel.
pub const KERNEL_START_SECTOR: usize = BOOT_BLOCK_SIZE / SECTOR_SIZE;

/// Sums the boot block longwords, skipping the checksum word, with
/// end-around carry.
fn boot_block_sum(block: &[u8]) -> u32 {
    let mut sum: u64 = 0;
    for (offset, word) in block.chunks_exact(4).enumerate() {
        if offset * 4 != CHECKSUM_OFFSET {
            sum += BigEndian::read_u32(word) as u64;
        }
    }
    while sum > 0xFFFF_FFFF {
        sum = (sum & 0xFFFF_FFFF) + (sum >> 32);
    }
    sum as u32
}

/// Computes the boot block checksum to be stored at offset 4.
pub fn boot_block_checksum(block: &[u8]) -> Result<u32, ImageError> {
    if block.len() != BOOT_BLOCK_SIZE {
        return Err(ImageError::BootBlockSize {
            expected: BOOT_BLOCK_SIZE,
            actual: block.len(),
        });
    }
    Ok(0xFFFF_FFFF - boot_block_sum(block))
}

/// Number of sectors occupied by a kernel of `len` bytes, passed to the
/// boot block as `NSECTORS`.
pub fn kernel_sectors(len: usize) -> usize {
    sweetada_common::bytes::sectors_for(len, SECTOR_SIZE)
}

/// Builds a complete ADF image from an assembled boot block and a kernel.
pub fn build_adf(boot_block: &[u8], kernel: &[u8]) -> Result<Vec<u8>, ImageError> {
    let checksum = boot_block_checksum(boot_block)?;

    let kernel_offset = KERNEL_START_SECTOR * SECTOR_SIZE;
    let capacity = DISK_SIZE - kernel_offset;
    if kernel.len() > capacity {
        return Err(ImageError::TooLarge {
            what: "kernel",
            size: kernel.len(),
            capacity,
        });
    }

    let mut image = vec![0u8; DISK_SIZE];
    image[..BOOT_BLOCK_SIZE].copy_from_slice(boot_block);
    BigEndian::write_u32(
        &mut image[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4],
        checksum,
    );
    image[kernel_offset..kernel_offset + kernel.len()].copy_from_slice(kernel);

    log::debug!(
        "ADF boot block checksum 0x{:08X}, kernel {} sectors",
        checksum,
        kernel_sectors(kernel.len())
    );

    Ok(image)
}
