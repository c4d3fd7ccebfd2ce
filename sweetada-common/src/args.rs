// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! clap value parsers shared by `sweetada-gen` and `sweetada-flash`.

use serial::core::{BaudRate, FlowControl};

/// Parses a hex value, with or without a `0x`/`$` prefix, or an Ada style
/// `16#...#` literal.  Underscores are ignored.
pub fn parse_hex(s: &str) -> Result<u32, String> {
    let cleaned = if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        rest
    } else if let Some(rest) = s.strip_prefix('$') {
        rest
    } else if let Some(rest) = s.strip_prefix("16#").and_then(|r| r.strip_suffix('#')) {
        rest
    } else {
        s
    };

    let cleaned: String = cleaned.chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(format!("Invalid hex value: {}", s));
    }

    u32::from_str_radix(&cleaned, 16).map_err(|_| format!("Invalid hex value: {}", s))
}

/// Parses a decimal value, or a hex one if prefixed with `0x`.
pub fn parse_number(s: &str) -> Result<u32, String> {
    if s.starts_with("0x") || s.starts_with("0X") {
        parse_hex(s)
    } else {
        s.parse::<u32>()
            .map_err(|_| format!("Invalid number: {}", s))
    }
}

pub fn parse_baud_rate(s: &str) -> Result<BaudRate, String> {
    let speed = s
        .parse::<usize>()
        .map_err(|_| format!("Invalid baud rate: {}", s))?;
    if speed == 0 {
        return Err("Baud rate must be non-zero".to_string());
    }
    Ok(BaudRate::from_speed(speed))
}

pub fn parse_flow_control(s: &str) -> Result<FlowControl, String> {
    match s.to_lowercase().as_str() {
        "none" => Ok(FlowControl::FlowNone),
        "software" | "xonxoff" => Ok(FlowControl::FlowSoftware),
        "hardware" | "rtscts" => Ok(FlowControl::FlowHardware),
        _ => Err(format!(
            "Invalid flow control: {}. Valid values are: none, software, hardware",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x18"), Ok(0x18));
        assert_eq!(parse_hex("$1000"), Ok(0x1000));
        assert_eq!(parse_hex("8C010000"), Ok(0x8C01_0000));
        assert_eq!(parse_hex("16#FFFF_0000#"), Ok(0xFFFF_0000));
        assert!(parse_hex("0x").is_err());
        assert!(parse_hex("xyz").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1234"), Ok(1234));
        assert_eq!(parse_number("0x10"), Ok(16));
        assert!(parse_number("12a").is_err());
    }

    #[test]
    fn test_parse_baud_rate() {
        assert_eq!(parse_baud_rate("115200"), Ok(BaudRate::Baud115200));
        assert_eq!(parse_baud_rate("38400"), Ok(BaudRate::Baud38400));
        assert!(parse_baud_rate("0").is_err());
        assert!(parse_baud_rate("fast").is_err());
    }

    #[test]
    fn test_parse_flow_control() {
        assert_eq!(parse_flow_control("none"), Ok(FlowControl::FlowNone));
        assert_eq!(parse_flow_control("XONXOFF"), Ok(FlowControl::FlowSoftware));
        assert!(parse_flow_control("magic").is_err());
    }
}
