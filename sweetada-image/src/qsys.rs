// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Extracts peripheral base addresses from a Quartus Platform Designer
//! (QSYS) design file and renders them as an Ada package of constants.
//!
//! A QSYS file has a `<system>` root with `<connection>` elements, each
//! naming its slave end point and carrying `<parameter>` elements, one of
//! which is the slave's `baseAddress`.

use serde::Deserialize;

use crate::ImageError;

/// Suffix of the Avalon slave interface of a component.
pub const DEFAULT_SLAVE_SUFFIX: &str = "s1";

pub const BASE_ADDRESS_PARAMETER: &str = "baseAddress";

/// The parts of a design file we care about.  Everything else is ignored.
#[derive(Debug, Deserialize)]
pub struct System {
    #[serde(rename = "connection", default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Deserialize)]
pub struct Connection {
    #[serde(rename = "@end", default)]
    pub end: String,

    #[serde(rename = "parameter", default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Deserialize)]
pub struct Parameter {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@value", default)]
    pub value: String,
}

impl Connection {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

impl System {
    pub fn parse(xml: &str) -> Result<Self, ImageError> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Base address of the first connection ending at `end` which has one.
    pub fn base_address(&self, end: &str) -> Option<&str> {
        self.connections
            .iter()
            .filter(|c| c.end == end)
            .find_map(|c| c.parameter(BASE_ADDRESS_PARAMETER))
    }
}

/// A named base address constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseAddress {
    pub constant: String,
    pub address: u32,
}

fn parse_address(end: &str, value: &str) -> Result<u32, ImageError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).map_err(|_| ImageError::InvalidAddress {
        end: end.to_string(),
        value: value.to_string(),
    })
}

/// Looks up the base address of each endpoint's slave interface, in the
/// order given.  Fails, naming every missing endpoint, unless all of them
/// are found.
pub fn extract(
    system: &System,
    endpoints: &[String],
    suffix: &str,
) -> Result<Vec<BaseAddress>, ImageError> {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for endpoint in endpoints {
        let end = format!("{endpoint}.{suffix}");
        match system.base_address(&end) {
            Some(value) => {
                let address = parse_address(&end, value)?;
                log::debug!("{} base address 0x{:08X}", end, address);
                found.push(BaseAddress {
                    constant: format!("{}_ADDRESS", end.replace('.', "_")),
                    address,
                });
            }
            None => missing.push(end),
        }
    }

    if !missing.is_empty() {
        return Err(ImageError::EndpointNotFound(missing));
    }
    Ok(found)
}

/// Renders the Ada package, with the constant names padded to line up.
pub fn ada_package(name: &str, addresses: &[BaseAddress]) -> String {
    let width = addresses
        .iter()
        .map(|a| a.constant.len())
        .max()
        .unwrap_or(0);

    let mut out = format!("package {name} is\n");
    out.push_str("   pragma Pure;\n");
    for a in addresses {
        out.push_str(&format!(
            "   {:<width$} : constant := 16#{:04X}_{:04X}#;\n",
            a.constant,
            a.address >> 16,
            a.address & 0xFFFF,
        ));
    }
    out.push_str(&format!("end {name};\n"));
    out
}

/// Ada source file name for a package, e.g. `Nios2_Addresses` is
/// `nios2_addresses.ads`.
pub fn package_filename(name: &str) -> String {
    format!("{}.ads", name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESIGN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<system name="$${FILENAME}">
 <component name="$${FILENAME}" displayName="$${FILENAME}" version="1.0" />
 <module name="jtag_uart_0" kind="altera_avalon_jtag_uart" version="18.1" enabled="1">
  <parameter name="allowMultipleConnections" value="false" />
 </module>
 <connection kind="clock" version="18.1" start="clk_0.clk" end="jtag_uart_0.clk" />
 <connection kind="avalon" version="18.1" start="nios2.data_master" end="jtag_uart_0.avalon_jtag_slave">
  <parameter name="arbitrationPriority" value="1" />
  <parameter name="baseAddress" value="0x00011000" />
 </connection>
 <connection kind="avalon" version="18.1" start="nios2.data_master" end="timer_0.s1">
  <parameter name="arbitrationPriority" value="1" />
  <parameter name="baseAddress" value="0x00011020" />
 </connection>
 <connection kind="avalon" version="18.1" start="nios2.data_master" end="pio_leds.s1">
  <parameter name="baseAddress" value="0x00011040" />
 </connection>
 <interconnectRequirement for="$system" name="qsys_mm.clockCrossingAdapter" value="HANDSHAKE" />
</system>
"#;

    fn endpoints(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_design() {
        let system = System::parse(DESIGN).unwrap();
        assert_eq!(system.connections.len(), 4);
        assert_eq!(system.base_address("timer_0.s1"), Some("0x00011020"));
        assert_eq!(system.base_address("jtag_uart_0.clk"), None);
    }

    #[test]
    fn test_extract_and_render() {
        let system = System::parse(DESIGN).unwrap();
        let addresses = extract(
            &system,
            &endpoints(&["timer_0", "pio_leds"]),
            DEFAULT_SLAVE_SUFFIX,
        )
        .unwrap();
        assert_eq!(
            addresses,
            vec![
                BaseAddress {
                    constant: "timer_0_s1_ADDRESS".to_string(),
                    address: 0x11020,
                },
                BaseAddress {
                    constant: "pio_leds_s1_ADDRESS".to_string(),
                    address: 0x11040,
                },
            ]
        );

        assert_eq!(
            ada_package("Addresses", &addresses),
            "package Addresses is\n\
             \x20  pragma Pure;\n\
             \x20  timer_0_s1_ADDRESS  : constant := 16#0001_1020#;\n\
             \x20  pio_leds_s1_ADDRESS : constant := 16#0001_1040#;\n\
             end Addresses;\n"
        );
    }

    #[test]
    fn test_missing_endpoints() {
        let system = System::parse(DESIGN).unwrap();
        let result = extract(
            &system,
            &endpoints(&["timer_0", "uart_1", "jtag_uart_0"]),
            DEFAULT_SLAVE_SUFFIX,
        );
        match result {
            Err(ImageError::EndpointNotFound(missing)) => {
                assert_eq!(missing, vec!["uart_1.s1", "jtag_uart_0.s1"]);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_other_suffix() {
        let system = System::parse(DESIGN).unwrap();
        let addresses = extract(
            &system,
            &endpoints(&["jtag_uart_0"]),
            "avalon_jtag_slave",
        )
        .unwrap();
        assert_eq!(addresses[0].constant, "jtag_uart_0_avalon_jtag_slave_ADDRESS");
        assert_eq!(addresses[0].address, 0x11000);
    }

    #[test]
    fn test_invalid_address() {
        let xml = r#"<system><connection end="x.s1"><parameter name="baseAddress" value="0xZZ"/></connection></system>"#;
        let system = System::parse(xml).unwrap();
        assert!(matches!(
            extract(&system, &endpoints(&["x"]), DEFAULT_SLAVE_SUFFIX),
            Err(ImageError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_malformed_design() {
        assert!(matches!(
            System::parse("<system><connection end=\"x\">"),
            Err(ImageError::Design(_))
        ));
    }

    #[test]
    fn test_package_filename() {
        assert_eq!(package_filename("Nios2_Addresses"), "nios2_addresses.ads");
    }
}
