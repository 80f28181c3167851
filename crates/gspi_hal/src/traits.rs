use crate::config::{ClockConfig, ControlConfig};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("bus not initialized")]
    NotInitialized,
    #[error("bus busy")]
    Busy,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("communication error: {0}")]
    CommError(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

/// The three data-moving calls a driver can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusOperation {
    Transfer,
    Send,
    Receive,
}

impl fmt::Display for BusOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusOperation::Transfer => "transfer",
            BusOperation::Send => "send",
            BusOperation::Receive => "receive",
        };
        f.write_str(name)
    }
}

/// Asynchronous notifications raised by the driver, usually from interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    TransferComplete,
    DataLost,
    ModeFault,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStatus {
    pub busy: bool,
    pub data_lost: bool,
    pub mode_fault: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverVersion {
    pub release: u8,
    pub major: u8,
    pub minor: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlaveSelect {
    #[default]
    Slave0,
    Slave1,
    Slave2,
}

pub type EventCallback = Box<dyn Fn(BusEvent) + Send + Sync>;

/// Driver surface of a GSPI master.
///
/// `transfer`, `send` and `receive` only *issue* an operation; completion is
/// reported later through the registered [`EventCallback`]. `count` is a word
/// count, not a byte count.
pub trait GspiBus: Send {
    fn version(&self) -> DriverVersion;
    fn configure_clock(&mut self, clock: &ClockConfig) -> Result<(), HalError>;
    fn init(&mut self, role: Role) -> Result<(), HalError>;
    fn status(&self) -> BusStatus;
    fn set_configuration(&mut self, config: &ControlConfig) -> Result<(), HalError>;
    fn register_event_callback(&mut self, callback: EventCallback) -> Result<(), HalError>;
    fn clock_division_factor(&self) -> u32;
    /// Frame width in bits negotiated with the peripheral.
    fn frame_length(&self) -> u8;
    fn select_slave(&mut self, slave: SlaveSelect);

    fn transfer(
        &mut self,
        outbound: &[u8],
        inbound: &mut [u8],
        count: usize,
    ) -> Result<(), HalError>;
    fn send(&mut self, outbound: &[u8], count: usize) -> Result<(), HalError>;
    fn receive(&mut self, inbound: &mut [u8], count: usize) -> Result<(), HalError>;

    /// Housekeeping hook called once per poll. Interrupt-driven drivers have nothing to do here.
    fn service(&mut self) -> Result<(), HalError> {
        Ok(())
    }
}

impl GspiBus for Box<dyn GspiBus> {
    fn version(&self) -> DriverVersion {
        (**self).version()
    }
    fn configure_clock(&mut self, clock: &ClockConfig) -> Result<(), HalError> {
        (**self).configure_clock(clock)
    }
    fn init(&mut self, role: Role) -> Result<(), HalError> {
        (**self).init(role)
    }
    fn status(&self) -> BusStatus {
        (**self).status()
    }
    fn set_configuration(&mut self, config: &ControlConfig) -> Result<(), HalError> {
        (**self).set_configuration(config)
    }
    fn register_event_callback(&mut self, callback: EventCallback) -> Result<(), HalError> {
        (**self).register_event_callback(callback)
    }
    fn clock_division_factor(&self) -> u32 {
        (**self).clock_division_factor()
    }
    fn frame_length(&self) -> u8 {
        (**self).frame_length()
    }
    fn select_slave(&mut self, slave: SlaveSelect) {
        (**self).select_slave(slave)
    }
    fn transfer(
        &mut self,
        outbound: &[u8],
        inbound: &mut [u8],
        count: usize,
    ) -> Result<(), HalError> {
        (**self).transfer(outbound, inbound, count)
    }
    fn send(&mut self, outbound: &[u8], count: usize) -> Result<(), HalError> {
        (**self).send(outbound, count)
    }
    fn receive(&mut self, inbound: &mut [u8], count: usize) -> Result<(), HalError> {
        (**self).receive(inbound, count)
    }
    fn service(&mut self) -> Result<(), HalError> {
        (**self).service()
    }
}
