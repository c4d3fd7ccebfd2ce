// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use thiserror::Error;

/// Errors raised while building an image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("boot block must be {expected} bytes, got {actual} bytes")]
    BootBlockSize { expected: usize, actual: usize },

    #[error("{what} is {size} bytes, which does not fit in {capacity} bytes")]
    TooLarge {
        what: &'static str,
        size: usize,
        capacity: usize,
    },

    #[error("{what} value 0x{value:X} does not fit in {bits} bits")]
    FieldOverflow {
        what: &'static str,
        value: u64,
        bits: u32,
    },

    #[error("template must be {expected} bytes, got {actual} bytes")]
    TemplateSize { expected: usize, actual: usize },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("malformed line {line}: {text}")]
    MalformedLine { line: usize, text: String },

    #[error("field `{field}` value `{value}` is longer than {max} characters")]
    FieldTooLong {
        field: &'static str,
        value: String,
        max: usize,
    },

    #[error("field `{field}` value `{value}` is not ASCII")]
    NotAscii { field: &'static str, value: String },

    #[error("invalid area symbol in `{0}` (only J, U and E are allowed)")]
    InvalidAreaSymbol(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("design file parse error: {0}")]
    Design(#[from] quick_xml::DeError),

    #[error("invalid base address `{value}` for {end}")]
    InvalidAddress { end: String, value: String },

    #[error("endpoint(s) not found: {}", .0.join(", "))]
    EndpointNotFound(Vec<String>),

    #[error("record encoding failed: {0}")]
    Encode(#[from] deku::DekuError),
}
