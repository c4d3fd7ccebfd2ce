// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Minimal S/360 object decks that can be IPLed.
//!
//! A deck is a sequence of 80 byte card images in EBCDIC.  Every card starts
//! with `0x02` and the 3 letter record type, and ends with an 8 digit
//! sequence number in columns 73-80.  We emit:
//! - one ESD card describing a single control section
//! - optionally a TXT card placing an IPL PSW at address 0
//! - TXT cards carrying the binary, 56 bytes each
//! - an END card

use sweetada_common::bytes::{u16_to_be_bytes, u32_to_be_bytes};

use crate::ImageError;

pub const RECORD_SIZE: usize = 80;

/// Payload bytes per TXT card.
pub const TXT_DATA_SIZE: usize = 56;

pub const DEFAULT_LOAD_ADDRESS: u32 = 0x18;

pub const EBCDIC_SPACE: u8 = 0x40;

const PSW_FLAGS: u8 = 0x0C;
const PSW_ADDRESSING_31: u32 = 0x8000_0000;

const MAX_24_BIT: u32 = 0x00FF_FFFF;

// Columns, 0-based
const TYPE_OFFSET: usize = 1;
const ADDRESS_OFFSET: usize = 5;
const COUNT_OFFSET: usize = 10;
const ESDID_OFFSET: usize = 14;
const DATA_OFFSET: usize = 16;
const END_NAME_OFFSET: usize = 16;
const END_MARKER_OFFSET: usize = 32;
const SEQUENCE_OFFSET: usize = 72;

/// One entry of the ESD card.
const ESD_ENTRY_SIZE: u16 = 16;
const ESD_TYPE_PRIVATE_CODE: u8 = 0x04;

/// ASCII (IBM PC code page 437) to EBCDIC (code page 037).
#[rustfmt::skip]
pub const ASCII_TO_EBCDIC: [u8; 256] = [
    // 0x00
    0x00, 0x01, 0x02, 0x03, 0x37, 0x2D, 0x2E, 0x2F,
    0x16, 0x05, 0x15, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    // 0x10
    0x10, 0x11, 0x12, 0x13, 0x3C, 0x3D, 0x32, 0x26,
    0x18, 0x19, 0x3F, 0x27, 0x22, 0x1D, 0x1E, 0x1F,
    // 0x20
    0x40, 0x5A, 0x7F, 0x7B, 0x5B, 0x6C, 0x50, 0x7D,
    0x4D, 0x5D, 0x5C, 0x4E, 0x6B, 0x60, 0x4B, 0x61,
    // 0x30
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7,
    0xF8, 0xF9, 0x7A, 0x5E, 0x4C, 0x7E, 0x6E, 0x6F,
    // 0x40
    0x7C, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7,
    0xC8, 0xC9, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6,
    // 0x50
    0xD7, 0xD8, 0xD9, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6,
    0xE7, 0xE8, 0xE9, 0xBA, 0xE0, 0xBB, 0xB0, 0x6D,
    // 0x60
    0x79, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x91, 0x92, 0x93, 0x94, 0x95, 0x96,
    // 0x70
    0x97, 0x98, 0x99, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6,
    0xA7, 0xA8, 0xA9, 0xC0, 0x4F, 0xD0, 0xA1, 0x07,
    // 0x80
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    // 0x90
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    // 0xA0
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    // 0xB0
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    // 0xC0
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    // 0xD0
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    // 0xE0
    0x3F, 0x59, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    // 0xF0
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x90, 0x3F, 0x3F, 0x3F, 0x3F, 0xEA, 0x3F, 0xFF,
];

pub fn to_ebcdic(byte: u8) -> u8 {
    ASCII_TO_EBCDIC[byte as usize]
}

pub fn str_to_ebcdic(s: &str) -> Vec<u8> {
    s.bytes().map(to_ebcdic).collect()
}

fn check_24_bit(what: &'static str, value: u64) -> Result<u32, ImageError> {
    if value > MAX_24_BIT as u64 {
        return Err(ImageError::FieldOverflow {
            what,
            value,
            bits: 24,
        });
    }
    Ok(value as u32)
}

fn put_24_bit(record: &mut [u8], offset: usize, value: u32) {
    record[offset..offset + 3].copy_from_slice(&u32_to_be_bytes(value)[1..]);
}

/// The record types of an object deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Esd,
    Txt,
    Rld,
    Sym,
    Xsd,
    End,
}

impl RecordType {
    pub fn tag(&self) -> &'static str {
        match self {
            RecordType::Esd => "ESD",
            RecordType::Txt => "TXT",
            RecordType::Rld => "RLD",
            RecordType::Sym => "SYM",
            RecordType::Xsd => "XSD",
            RecordType::End => "END",
        }
    }
}

/// A single card image.  The sequence number is filled in when the record
/// is added to a [`Deck`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record([u8; RECORD_SIZE]);

impl Record {
    fn blank(record_type: RecordType) -> Self {
        let mut card = [EBCDIC_SPACE; RECORD_SIZE];
        card[0] = 0x02;
        card[TYPE_OFFSET..TYPE_OFFSET + 3].copy_from_slice(&str_to_ebcdic(record_type.tag()));
        Self(card)
    }

    fn set_esdid(&mut self) {
        self.0[ESDID_OFFSET..ESDID_OFFSET + 2].copy_from_slice(&u16_to_be_bytes(1));
    }

    fn set_count(&mut self, count: u16) {
        self.0[COUNT_OFFSET..COUNT_OFFSET + 2].copy_from_slice(&u16_to_be_bytes(count));
    }

    /// External symbol dictionary, holding one unnamed control section.
    pub fn esd(address: u32, length: u32) -> Result<Self, ImageError> {
        let address = check_24_bit("ESD address", address as u64)?;
        let length = check_24_bit("ESD length", length as u64)?;

        let mut record = Self::blank(RecordType::Esd);
        record.set_count(ESD_ENTRY_SIZE);
        record.set_esdid();

        // Name stays blank.
        let entry = DATA_OFFSET + 8;
        record.0[entry] = ESD_TYPE_PRIVATE_CODE;
        put_24_bit(&mut record.0, entry + 1, address);
        record.0[entry + 4] = 0x00;
        put_24_bit(&mut record.0, entry + 5, length);
        Ok(record)
    }

    /// Text record, placing up to 56 bytes at `address`.
    pub fn txt(address: u32, data: &[u8]) -> Result<Self, ImageError> {
        if data.len() > TXT_DATA_SIZE {
            return Err(ImageError::TooLarge {
                what: "TXT record data",
                size: data.len(),
                capacity: TXT_DATA_SIZE,
            });
        }
        let address = check_24_bit("TXT address", address as u64)?;

        let mut record = Self::blank(RecordType::Txt);
        put_24_bit(&mut record.0, ADDRESS_OFFSET, address);
        record.set_count(data.len() as u16);
        record.set_esdid();
        record.0[DATA_OFFSET..DATA_OFFSET + data.len()].copy_from_slice(data);
        Ok(record)
    }

    pub fn rld() -> Self {
        Self::blank(RecordType::Rld)
    }

    pub fn sym() -> Self {
        Self::blank(RecordType::Sym)
    }

    pub fn xsd() -> Self {
        Self::blank(RecordType::Xsd)
    }

    pub fn end() -> Self {
        let mut record = Self::blank(RecordType::End);
        record.0[END_NAME_OFFSET..END_NAME_OFFSET + 8].copy_from_slice(&str_to_ebcdic("SweetAda"));
        record.0[END_MARKER_OFFSET] = to_ebcdic(b'2');
        record
    }

    fn set_sequence(&mut self, sequence: u32) {
        let digits = format!("{:08}", sequence % 100_000_000);
        self.0[SEQUENCE_OFFSET..].copy_from_slice(&str_to_ebcdic(&digits));
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_SIZE] {
        &self.0
    }
}

/// 31-bit IPL PSW which starts execution at `address`.  The address word
/// is used as given, and an address of 0 becomes `0x80000000`.
pub fn ipl_psw(address: u32) -> [u8; 8] {
    let word = if address == 0 {
        PSW_ADDRESSING_31
    } else {
        address
    };
    let mut psw = [0x00, PSW_FLAGS, 0x00, 0x00, 0, 0, 0, 0];
    psw[4..].copy_from_slice(&u32_to_be_bytes(word));
    psw
}

/// An object deck under construction.
#[derive(Debug)]
pub struct Deck {
    data: Vec<u8>,
    sequence: u32,
}

impl Deck {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            sequence: 1,
        }
    }

    /// Raw bytes, such as a card loader, which precede the object records.
    pub fn prepend_loader(&mut self, loader: &[u8]) {
        self.data.extend_from_slice(loader);
    }

    pub fn push(&mut self, mut record: Record) {
        record.set_sequence(self.sequence);
        self.data.extend_from_slice(record.as_bytes());
        self.sequence += 1;
    }

    /// Number of records written so far.
    pub fn records(&self) -> u32 {
        self.sequence - 1
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for [`build_deck()`].
#[derive(Debug, Clone)]
pub struct DeckOptions<'a> {
    pub address: u32,
    pub loader: Option<&'a [u8]>,
    pub psw: bool,
}

impl Default for DeckOptions<'_> {
    fn default() -> Self {
        Self {
            address: DEFAULT_LOAD_ADDRESS,
            loader: None,
            psw: false,
        }
    }
}

/// Builds an object deck loading `binary` at `options.address`.  Returns the
/// deck and the number of records in it.
pub fn build_deck(binary: &[u8], options: &DeckOptions) -> Result<(Vec<u8>, u32), ImageError> {
    let length = check_24_bit("binary length", binary.len() as u64)?;
    check_24_bit(
        "end address",
        (options.address as u64 + binary.len() as u64).saturating_sub(1),
    )?;

    let mut deck = Deck::new();
    if let Some(loader) = options.loader {
        deck.prepend_loader(loader);
    }

    deck.push(Record::esd(options.address, length)?);

    if options.psw {
        deck.push(Record::txt(0, &ipl_psw(options.address))?);
    }

    let mut address = options.address;
    for chunk in binary.chunks(TXT_DATA_SIZE) {
        deck.push(Record::txt(address, chunk)?);
        address += chunk.len() as u32;
    }

    deck.push(Record::end());

    let records = deck.records();
    log::debug!("Object deck: {} records", records);
    Ok((deck.into_bytes(), records))
}
