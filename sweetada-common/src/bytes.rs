// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Byte splitting helpers.
//!
//! The split functions take typed `u16`/`u32` values, so a value that does
//! not fit the width never reaches them.  Callers holding a wider value must
//! narrow it first, either with `try_from()` (and report the overflow) or
//! with [`wrapping_u32()`] where modulo behaviour is explicitly wanted.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Splits a 16-bit value into big-endian bytes (high byte first).
pub fn u16_to_be_bytes(n: u16) -> [u8; 2] {
    [((n / 0x100) % 0x100) as u8, (n % 0x100) as u8]
}

/// Splits a 16-bit value into little-endian bytes (low byte first).
pub fn u16_to_le_bytes(n: u16) -> [u8; 2] {
    [(n % 0x100) as u8, ((n / 0x100) % 0x100) as u8]
}

/// Splits a 32-bit value into big-endian bytes (most significant first).
pub fn u32_to_be_bytes(n: u32) -> [u8; 4] {
    [
        ((n / 0x100_0000) % 0x100) as u8,
        ((n / 0x1_0000) % 0x100) as u8,
        ((n / 0x100) % 0x100) as u8,
        (n % 0x100) as u8,
    ]
}

/// Splits a 32-bit value into little-endian bytes (least significant first).
pub fn u32_to_le_bytes(n: u32) -> [u8; 4] {
    [
        (n % 0x100) as u8,
        ((n / 0x100) % 0x100) as u8,
        ((n / 0x1_0000) % 0x100) as u8,
        ((n / 0x100_0000) % 0x100) as u8,
    ]
}

pub fn be_bytes_to_u16(bytes: [u8; 2]) -> u16 {
    BigEndian::read_u16(&bytes)
}

pub fn le_bytes_to_u16(bytes: [u8; 2]) -> u16 {
    LittleEndian::read_u16(&bytes)
}

pub fn be_bytes_to_u32(bytes: [u8; 4]) -> u32 {
    BigEndian::read_u32(&bytes)
}

pub fn le_bytes_to_u32(bytes: [u8; 4]) -> u32 {
    LittleEndian::read_u32(&bytes)
}

/// Reduces a value modulo 2^32, the behaviour the legacy split helpers had
/// for out of range input.
pub fn wrapping_u32(n: u64) -> u32 {
    (n % 0x1_0000_0000) as u32
}

/// Number of `sector_size` sectors needed to hold `len` bytes.
pub fn sectors_for(len: usize, sector_size: usize) -> usize {
    len.div_ceil(sector_size)
}
