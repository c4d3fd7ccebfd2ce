// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Logisim "v2.0 raw" memory image, loadable into a ROM/RAM component.

use std::fmt::Write;

pub const HEADER: &str = "v2.0 raw\n";

pub const BYTES_PER_LINE: usize = 32;

/// Renders `data` as a Logisim memory image: the header, then the bytes as
/// uppercase hex pairs, 32 to a line, each line started by a newline.
pub fn to_logisim(data: &[u8]) -> String {
    let mut out = String::with_capacity(HEADER.len() + data.len() * 3 + 2);
    out.push_str(HEADER);
    for (index, byte) in data.iter().enumerate() {
        if index % BYTES_PER_LINE == 0 {
            out.push('\n');
        } else {
            out.push(' ');
        }
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02X}");
    }
    out.push('\n');
    out
}

/// Default output name for an input file: the input name plus `.srec`.
pub fn default_output_name(input: &str) -> String {
    format!("{input}.srec")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_input() {
        assert_eq!(to_logisim(&[0x00, 0xAB, 0x7f]), "v2.0 raw\n\n00 AB 7F\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(to_logisim(&[]), "v2.0 raw\n\n");
    }

    #[test]
    fn test_line_wrap() {
        let data: Vec<u8> = (0..33).collect();
        let out = to_logisim(&data);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "v2.0 raw");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2].split(' ').count(), 32);
        assert!(lines[2].starts_with("00 01 02"));
        assert!(lines[2].ends_with("1E 1F"));
        assert_eq!(lines[3], "20");
        assert!(out.ends_with("20\n"));
    }

    #[test]
    fn test_default_output_name() {
        assert_eq!(default_output_name("kernel.bin"), "kernel.bin.srec");
    }
}
