// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Serial port setup.  All targets talk 8N1.

use std::time::Duration;

pub use ::serial::core::{BaudRate, FlowControl};
use ::serial::{PortSettings, SerialPort, SystemPort};

use crate::LinkError;

/// Line settings for a serial download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    pub baud_rate: BaudRate,
    pub flow_control: FlowControl,

    /// Read timeout
    pub timeout: Duration,
}

impl PortConfig {
    pub fn new(baud_rate: BaudRate) -> Self {
        Self {
            baud_rate,
            flow_control: FlowControl::FlowNone,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn speed(&self) -> usize {
        self.baud_rate.speed()
    }
}

/// Opens and configures a serial port.
pub fn open(port: &str, config: &PortConfig) -> Result<SystemPort, LinkError> {
    let error = |source| LinkError::Serial {
        port: port.to_string(),
        source,
    };

    let mut serial_port = ::serial::open(port).map_err(error)?;

    let settings = PortSettings {
        baud_rate: config.baud_rate,
        char_size: ::serial::core::Bits8,
        parity: ::serial::core::ParityNone,
        stop_bits: ::serial::core::Stop1,
        flow_control: config.flow_control,
    };
    serial_port.configure(&settings).map_err(error)?;
    serial_port.set_timeout(config.timeout).map_err(error)?;

    log::debug!(
        "Opened {} at {} baud, flow control {:?}",
        port,
        config.speed(),
        config.flow_control
    );
    Ok(serial_port)
}
