// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("connection closed before the response was complete")]
    ConnectionClosed,

    #[error("no \"{0}\" prompt received")]
    NoPrompt(String),

    #[error("{command} not acknowledged (reply {reply:02X?})")]
    BadAck { command: String, reply: Vec<u8> },

    #[error("serial port {port}: {source}")]
    Serial {
        port: String,
        #[source]
        source: ::serial::Error,
    },

    #[error("packet encoding failed: {0}")]
    Encode(#[from] deku::DekuError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
