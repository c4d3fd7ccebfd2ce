// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Sends a Motorola S-record file to a monitor waiting for a download on a
//! serial line.  There is no handshake, so each record is followed by a
//! pause long enough for the monitor to consume it.

use std::io::Write;
use sweetada_common::platform::msleep;

use crate::LinkError;

/// Pause after each record for a given line speed, in milliseconds.
pub fn line_delay(baud: usize) -> u64 {
    match baud {
        115200 => 10,
        38400 => 30,
        _ => 50,
    }
}

/// Start address carried by an S7 (32-bit), S8 (24-bit) or S9 (16-bit)
/// termination record.
pub fn start_address(record: &str) -> Option<u32> {
    let digits = match record.get(..2)? {
        "S7" => 8,
        "S8" => 6,
        "S9" => 4,
        _ => return None,
    };
    let field = record.get(4..4 + digits)?;
    match u32::from_str_radix(field, 16) {
        Ok(address) => Some(address),
        Err(_) => {
            log::warn!("Invalid start address in record {}", record);
            None
        }
    }
}

/// Writes every record followed by CR LF, calling `progress` after each
/// one.  Returns the start address from the last termination record, if
/// there was one.
pub fn send_records<W: Write>(
    port: &mut W,
    srecords: &str,
    delay_ms: u64,
    mut progress: impl FnMut(),
) -> Result<Option<u32>, LinkError> {
    let mut start = None;
    let mut count = 0;

    for line in srecords.lines() {
        let record = line.trim();
        port.write_all(record.as_bytes())?;
        port.write_all(b"\r\n")?;
        port.flush()?;
        progress();
        count += 1;

        if delay_ms > 0 {
            msleep(delay_ms);
        }

        if let Some(address) = start_address(record) {
            start = Some(address);
        }
    }
    port.write_all(b"\r\n")?;
    port.flush()?;

    log::debug!("Sent {} records", count);
    Ok(start)
}
