// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Dreamcast CD-ROM boot files.
//!
//! `IP.BIN` is the 32KB initial program, whose first 256 bytes are a header
//! of fixed width, space padded, ASCII fields.  The fields are set from an
//! `IP.TXT` file of `Name: value` lines, on top of a template.
//!
//! `1ST_READ.BIN` is the kernel, which the boot ROM loads from CD-ROM
//! through a scrambler.  [`descramble()`] applies the inverse permutation so
//! that the kernel lands in memory as it was linked.

use crc::{CRC_16_IBM_3740, Crc};

use crate::ImageError;

pub const IP_BIN_SIZE: usize = 32768;

/// The header CRC lives here as 4 ASCII hex digits.
pub const CRC_OFFSET: usize = 0x20;
const CRC_DIGITS: usize = 4;

/// The CRC covers the product number and version.
pub const CRC_DATA_OFFSET: usize = 0x40;
const CRC_DATA_LEN: usize = 16;

// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

const SLICE_SIZE: usize = 32;
const MAX_CHUNK: usize = 2048 * 1024;

/// A header field of `IP.BIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub len: usize,
}

const fn field(name: &'static str, offset: usize, len: usize) -> Field {
    Field { name, offset, len }
}

pub const AREA_SYMBOLS: &str = "Area Symbols";

pub const FIELDS: [Field; 11] = [
    field("Hardware ID", 0x00, 0x10),
    field("Maker ID", 0x10, 0x10),
    field("Device Info", 0x20, 0x10),
    field(AREA_SYMBOLS, 0x30, 0x08),
    field("Peripherals", 0x38, 0x08),
    field("Product No", 0x40, 0x0A),
    field("Version", 0x4A, 0x06),
    field("Release Date", 0x50, 0x10),
    field("Boot Filename", 0x60, 0x10),
    field("SW Maker Name", 0x70, 0x10),
    field("Game Title", 0x80, 0x80),
];

pub fn find_field(name: &str) -> Option<&'static Field> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Normalises a set of area symbols to the positional `"JUE"` form, e.g.
/// `"EJ"` becomes `"J E"`.
pub fn normalise_area_symbols(value: &str) -> Result<String, ImageError> {
    let mut areas = [' '; 3];
    for c in value.chars() {
        match c {
            'J' => areas[0] = 'J',
            'U' => areas[1] = 'U',
            'E' => areas[2] = 'E',
            _ => return Err(ImageError::InvalidAreaSymbol(value.to_string())),
        }
    }
    Ok(areas.iter().collect())
}

/// Computes the header CRC over `data[0x40..0x50]`.
pub fn header_crc(data: &[u8]) -> u16 {
    CRC16.checksum(&data[CRC_DATA_OFFSET..CRC_DATA_OFFSET + CRC_DATA_LEN])
}

/// Result of building `IP.BIN`.
#[derive(Debug, Clone)]
pub struct IpBin {
    pub data: Vec<u8>,
    pub crc: u16,

    /// CRC held by the template, if it was valid hex
    pub previous_crc: Option<u16>,

    /// Fields left as they were in the template
    pub unset: Vec<&'static str>,
}

impl IpBin {
    pub fn crc_changed(&self) -> bool {
        self.previous_crc != Some(self.crc)
    }
}

/// Parses `IP.TXT` into `(field, value)` pairs.  Blank lines are skipped.
pub fn parse_ip_txt(text: &str) -> Result<Vec<(&'static Field, String)>, ImageError> {
    let mut values = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| ImageError::MalformedLine {
            line: index + 1,
            text: line.to_string(),
        })?;
        let name = name.trim();
        let field = find_field(name).ok_or_else(|| ImageError::UnknownField(name.to_string()))?;

        let value = value.trim();
        let value = if field.name == AREA_SYMBOLS {
            normalise_area_symbols(value)?
        } else {
            value.to_string()
        };
        if !value.is_ascii() {
            return Err(ImageError::NotAscii {
                field: field.name,
                value,
            });
        }
        if value.len() > field.len {
            return Err(ImageError::FieldTooLong {
                field: field.name,
                value,
                max: field.len,
            });
        }
        values.push((field, value));
    }
    Ok(values)
}

/// Builds `IP.BIN` from the template and the contents of `IP.TXT`, then
/// fixes up the header CRC.
pub fn build_ip_bin(template: &[u8], ip_txt: &str) -> Result<IpBin, ImageError> {
    if template.len() != IP_BIN_SIZE {
        return Err(ImageError::TemplateSize {
            expected: IP_BIN_SIZE,
            actual: template.len(),
        });
    }
    let mut data = template.to_vec();

    let values = parse_ip_txt(ip_txt)?;
    for (field, value) in &values {
        let slot = &mut data[field.offset..field.offset + field.len];
        slot.fill(b' ');
        slot[..value.len()].copy_from_slice(value.as_bytes());
        log::debug!("{}: \"{}\"", field.name, value);
    }

    let unset: Vec<&'static str> = FIELDS
        .iter()
        .filter(|f| !values.iter().any(|(set, _)| set.name == f.name))
        .map(|f| f.name)
        .collect();
    for name in &unset {
        log::warn!("Field {} not set, keeping template value", name);
    }

    let previous_crc = std::str::from_utf8(&data[CRC_OFFSET..CRC_OFFSET + CRC_DIGITS])
        .ok()
        .and_then(|s| u16::from_str_radix(s, 16).ok());
    let crc = header_crc(&data);
    if previous_crc != Some(crc) {
        let digits = format!("{crc:04X}");
        data[CRC_OFFSET..CRC_OFFSET + CRC_DIGITS].copy_from_slice(digits.as_bytes());
    }

    Ok(IpBin {
        data,
        crc,
        previous_crc,
        unset,
    })
}

/// The boot ROM's pseudo random generator.
struct Lcg {
    seed: u32,
}

impl Lcg {
    fn new(size: usize) -> Self {
        Self {
            seed: (size & 0xFFFF) as u32,
        }
    }

    fn next(&mut self) -> u32 {
        self.seed = (self.seed * 2109 + 9273) & 0x7FFF;
        (self.seed + 0xC000) & 0xFFFF
    }
}

fn descramble_chunk(rng: &mut Lcg, chunk: &[u8], out: &mut Vec<u8>) {
    let slices = chunk.len() / SLICE_SIZE;
    let mut table: Vec<usize> = (0..slices).collect();
    for i in (0..slices).rev() {
        let x = ((rng.next() as u64 * i as u64) >> 16) as usize;
        table.swap(i, x);
        let start = table[i] * SLICE_SIZE;
        out.extend_from_slice(&chunk[start..start + SLICE_SIZE]);
    }
}

/// Produces `1ST_READ.BIN` from a kernel binary.
///
/// The kernel is processed in chunks of 2MB for as long as possible, then in
/// ever halving chunks down to a single 32 byte slice.  Any remaining tail is
/// copied as is.  The output is the same size as the input.
pub fn descramble(data: &[u8]) -> Vec<u8> {
    let mut rng = Lcg::new(data.len());
    let mut out = Vec::with_capacity(data.len());

    let mut offset = 0;
    let mut chunk_size = MAX_CHUNK;
    while chunk_size >= SLICE_SIZE {
        while data.len() - offset >= chunk_size {
            descramble_chunk(&mut rng, &data[offset..offset + chunk_size], &mut out);
            offset += chunk_size;
        }
        chunk_size >>= 1;
    }
    out.extend_from_slice(&data[offset..]);
    out
}
