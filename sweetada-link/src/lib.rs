// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sweetada-link
//!
//! Clients for getting a SweetAda kernel onto a target and running it:
//! - [`openocd`] - OpenOCD Tcl RPC session and the download sequence
//! - [`srecord`] - S-record file sender over a serial line
//! - [`dbug`] - ColdFire dBUG monitor network download driver
//! - [`bba`] - Dreamcast Broadband Adapter UDP loader
//!
//! Every session owns its transport and is generic over it, so the
//! protocols can be exercised against in-memory streams.

pub mod bba;
pub mod dbug;
mod error;
pub mod openocd;
pub mod serial;
pub mod srecord;

pub use error::LinkError;
