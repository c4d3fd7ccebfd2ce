// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Symbol and section lookup in the kernel ELF file.
//!
//! The flashing tools need the entry point (`_start` by default) to resume
//! the target, and the `.text` address as the load address.

use goblin::elf::Elf;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElfError {
    #[error("failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not a valid ELF file: {0}")]
    Parse(#[from] goblin::error::Error),

    #[error("symbol `{0}` not found")]
    SymbolNotFound(String),

    #[error("section `{0}` not found")]
    SectionNotFound(String),

    #[error("address 0x{0:X} does not fit in 32 bits")]
    AddressOverflow(u64),
}

/// A loaded kernel ELF file.
pub struct KernelElf {
    data: Vec<u8>,
}

impl KernelElf {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ElfError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| ElfError::Read {
            file: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_bytes(data))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns the value (address) of the named symbol.
    pub fn symbol_address(&self, name: &str) -> Result<u32, ElfError> {
        let elf = Elf::parse(&self.data)?;

        let symbol = elf
            .syms
            .iter()
            .find(|sym| elf.strtab.get_at(sym.st_name) == Some(name))
            .ok_or_else(|| ElfError::SymbolNotFound(name.to_string()))?;

        log::debug!("Symbol {} = 0x{:X}", name, symbol.st_value);
        narrow(symbol.st_value)
    }

    /// Returns the virtual address of the named section.
    pub fn section_address(&self, name: &str) -> Result<u32, ElfError> {
        let elf = Elf::parse(&self.data)?;

        let section = elf
            .section_headers
            .iter()
            .find(|sh| elf.shdr_strtab.get_at(sh.sh_name) == Some(name))
            .ok_or_else(|| ElfError::SectionNotFound(name.to_string()))?;

        log::debug!("Section {} @ 0x{:X}", name, section.sh_addr);
        narrow(section.sh_addr)
    }
}

fn narrow(value: u64) -> Result<u32, ElfError> {
    u32::try_from(value).map_err(|_| ElfError::AddressOverflow(value))
}

/// How the start address of a kernel is specified on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartAddress {
    /// Explicit address
    Address(u32),

    /// Symbol to resolve from the ELF file
    Symbol(String),
}

impl StartAddress {
    /// A `0x` prefixed value is an address, anything else is a symbol name.
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.starts_with("0x") || s.starts_with("0X") {
            crate::args::parse_hex(s).map(StartAddress::Address)
        } else if s.is_empty() {
            Err("Start symbol must not be empty".to_string())
        } else {
            Ok(StartAddress::Symbol(s.to_string()))
        }
    }

    /// Resolves to an address.  ARM Thumb symbols have bit 0 set, which must
    /// be cleared before the address is used to resume the target.
    pub fn resolve(&self, elf: Option<&KernelElf>, thumb: bool) -> Result<u32, ElfError> {
        let address = match self {
            StartAddress::Address(address) => *address,
            StartAddress::Symbol(name) => match elf {
                Some(elf) => elf.symbol_address(name)?,
                None => return Err(ElfError::SymbolNotFound(name.clone())),
            },
        };
        if thumb {
            Ok(address & 0xFFFF_FFFE)
        } else {
            Ok(address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_address_parse() {
        assert_eq!(
            StartAddress::parse("0x8000"),
            Ok(StartAddress::Address(0x8000))
        );
        assert_eq!(
            StartAddress::parse("_start"),
            Ok(StartAddress::Symbol("_start".to_string()))
        );
        assert!(StartAddress::parse("").is_err());
    }

    #[test]
    fn test_thumb_clears_lsb() {
        let start = StartAddress::Address(0x0000_0401);
        assert_eq!(start.resolve(None, true).unwrap(), 0x400);
        assert_eq!(start.resolve(None, false).unwrap(), 0x401);
    }

    #[test]
    fn test_symbol_without_elf() {
        let start = StartAddress::Symbol("_start".to_string());
        assert!(matches!(
            start.resolve(None, false),
            Err(ElfError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn test_not_an_elf() {
        let elf = KernelElf::from_bytes(vec![0u8; 64]);
        assert!(matches!(elf.symbol_address("_start"), Err(ElfError::Parse(_))));
    }
}
