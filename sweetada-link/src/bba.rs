// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Dreamcast loader over the Broadband Adapter (dcload-ip protocol).
//!
//! Every packet is a 12 byte header, a 4 character command tag followed by
//! a big-endian address and size, optionally followed by payload.  The
//! target acknowledges commands by echoing the tag back.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use deku::prelude::*;
use strum::{AsRefStr, Display, EnumString};
use sweetada_common::platform::msleep;

use crate::LinkError;

pub const DEFAULT_TARGET_IP: &str = "192.168.2.2";
pub const DEFAULT_HOST_IP: &str = "192.168.2.1";
pub const DEFAULT_PORT: u16 = 31313;
pub const DEFAULT_MAC: &str = "00:d0:f1:02:bc:5d";

/// Payload bytes per `PBIN` packet.
pub const CHUNK_SIZE: usize = 1024;

/// Pause between `PBIN` packets, which are not acknowledged, in
/// milliseconds.
pub const CHUNK_PACING_MS: u64 = 30;

const REPLY_SIZE: usize = 4096;

/// Bytes of the tag echoed back in an acknowledgement.
const ACK_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum Command {
    /// Execute
    #[strum(serialize = "EXEC")]
    Execute,

    /// Begin receiving a binary
    #[strum(serialize = "LBIN")]
    LoadBinary,

    /// Part of a binary
    #[strum(serialize = "PBIN")]
    PartBinary,

    /// End receiving a binary
    #[strum(serialize = "DBIN")]
    DoneBinary,

    /// Send a binary
    #[strum(serialize = "SBIN")]
    SendBinary,

    /// Send a binary, quietly
    #[strum(serialize = "SBIQ")]
    SendBinaryQuiet,

    /// Version information
    #[strum(serialize = "VERS")]
    Version,

    /// Return value
    #[strum(serialize = "RETV")]
    ReturnValue,

    /// Reboot
    #[strum(serialize = "RBOT")]
    Reboot,
}

impl Command {
    pub fn tag(&self) -> [u8; 4] {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(self.as_ref().as_bytes());
        tag
    }
}

/// Packet header.
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct Header {
    pub tag: [u8; 4],
    pub address: u32,
    pub size: u32,
}

pub const HEADER_SIZE: usize = 12;

/// Encodes a complete packet.
pub fn packet(
    command: Command,
    address: u32,
    size: u32,
    payload: &[u8],
) -> Result<Vec<u8>, LinkError> {
    let header = Header {
        tag: command.tag(),
        address,
        size,
    };
    let mut packet = header.to_bytes()?;
    packet.extend_from_slice(payload);
    Ok(packet)
}

/// A connected datagram transport.
pub trait Datagram {
    fn send_datagram(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl Datagram for UdpSocket {
    fn send_datagram(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }

    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

pub struct BbaLoader<D: Datagram> {
    socket: D,
    pacing_ms: u64,
}

impl BbaLoader<UdpSocket> {
    pub fn connect(target: SocketAddr, timeout: Duration) -> Result<Self, LinkError> {
        let error = |source| LinkError::Connect {
            address: target.to_string(),
            source,
        };
        let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(error)?;
        socket.connect(target).map_err(error)?;
        socket.set_read_timeout(Some(timeout)).map_err(error)?;
        log::debug!("BBA target {}", target);
        Ok(Self::new(socket))
    }
}

impl<D: Datagram> BbaLoader<D> {
    pub fn new(socket: D) -> Self {
        Self {
            socket,
            pacing_ms: CHUNK_PACING_MS,
        }
    }

    pub fn with_pacing(mut self, pacing_ms: u64) -> Self {
        self.pacing_ms = pacing_ms;
        self
    }

    pub fn send_command(
        &mut self,
        command: Command,
        address: u32,
        size: u32,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        let packet = packet(command, address, size, payload)?;
        self.socket.send_datagram(&packet)?;
        Ok(())
    }

    /// Waits for the target to echo back the command tag.
    pub fn expect_ack(&mut self, command: Command) -> Result<(), LinkError> {
        let mut reply = [0u8; REPLY_SIZE];
        let len = self.socket.recv_datagram(&mut reply)?;
        let reply = &reply[..len];
        if len >= ACK_LEN && reply[..ACK_LEN] == command.tag()[..ACK_LEN] {
            log::debug!("{} acknowledged", command);
            Ok(())
        } else {
            Err(LinkError::BadAck {
                command: command.to_string(),
                reply: reply.to_vec(),
            })
        }
    }

    /// Command plus acknowledgement.
    pub fn transact(&mut self, command: Command, address: u32, size: u32) -> Result<(), LinkError> {
        self.send_command(command, address, size, &[])?;
        self.expect_ack(command)
    }

    /// Uploads `data` to `load_address`, calling `progress` after each
    /// chunk.
    pub fn upload(
        &mut self,
        load_address: u32,
        data: &[u8],
        mut progress: impl FnMut(),
    ) -> Result<(), LinkError> {
        let size = u32::try_from(data.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "binary larger than 4GB")
        })?;
        self.transact(Command::LoadBinary, load_address, size)?;

        let mut address = load_address;
        let chunks = data.chunks(CHUNK_SIZE).count();
        for (index, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            self.send_command(Command::PartBinary, address, chunk.len() as u32, chunk)?;
            progress();
            address = address.wrapping_add(chunk.len() as u32);
            if index + 1 < chunks && self.pacing_ms > 0 {
                msleep(self.pacing_ms);
            }
        }

        self.transact(Command::DoneBinary, 0, 0)
    }

    pub fn execute(&mut self, start_address: u32) -> Result<(), LinkError> {
        self.transact(Command::Execute, start_address, 0)
    }

    pub fn into_inner(self) -> D {
        self.socket
    }
}
