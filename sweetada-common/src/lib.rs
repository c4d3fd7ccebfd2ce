// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sweetada-common
//!
//! Helpers shared by the SweetAda host tools:
//! - [`bytes`] - splitting 16/32-bit values into big/little-endian bytes
//! - [`platform`] - host platform and endianness detection, `msleep()`
//! - [`args`] - clap value parsers used by more than one tool
//! - [`elf`] - symbol and section address lookup in kernel ELF files

pub mod args;
pub mod bytes;
pub mod elf;
pub mod platform;
