use crate::config::{ClockConfig, ControlConfig};
use crate::traits::{
    BusEvent, BusOperation, BusStatus, DriverVersion, EventCallback, GspiBus, HalError, Role,
    SlaveSelect,
};
use std::collections::HashMap;

const DEFAULT_FRAME_LENGTH: u8 = 8;

struct Pending {
    operation: BusOperation,
    remaining: u32,
}

/// Loop-back GSPI master: everything written is what gets read back.
///
/// Completion is not instantaneous. An issued operation is reported through
/// the event callback from `service()`, after `latency_polls` further calls.
pub struct SimBus {
    clock: Option<ClockConfig>,
    role: Option<Role>,
    control: Option<ControlConfig>,
    callback: Option<EventCallback>,
    frame_override: Option<u8>,
    latency_polls: u32,
    pending: Option<Pending>,
    queued_events: Vec<BusEvent>,
    wire: Vec<u8>,
    fail_next: HashMap<BusOperation, HalError>,
    corruption: Option<(usize, u8)>,
    slave: SlaveSelect,
    issued: HashMap<BusOperation, u32>,
    status: BusStatus,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            clock: None,
            role: None,
            control: None,
            callback: None,
            frame_override: None,
            latency_polls: 0,
            pending: None,
            queued_events: Vec::new(),
            wire: Vec::new(),
            fail_next: HashMap::new(),
            corruption: None,
            slave: SlaveSelect::default(),
            issued: HashMap::new(),
            status: BusStatus::default(),
        }
    }

    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency_polls = polls;
        self
    }

    /// Report `width` as the negotiated frame length regardless of the configured bit width.
    pub fn with_frame_length(mut self, width: u8) -> Self {
        self.frame_override = Some(width);
        self
    }

    pub fn set_frame_length(&mut self, width: u8) {
        self.frame_override = Some(width);
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&mut self, operation: BusOperation, error: HalError) {
        self.fail_next.insert(operation, error);
    }

    /// XOR `pattern` into byte `index` of the next inbound buffer filled by the bus.
    pub fn corrupt_next_inbound(&mut self, index: usize, pattern: u8) {
        self.corruption = Some((index, pattern));
    }

    /// Queue an event for delivery on the next `service()` call.
    pub fn raise_event(&mut self, event: BusEvent) {
        self.queued_events.push(event);
    }

    pub fn issued(&self, operation: BusOperation) -> u32 {
        self.issued.get(&operation).copied().unwrap_or(0)
    }

    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn selected_slave(&self) -> SlaveSelect {
        self.slave
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn bytes_per_word(&self) -> usize {
        if self.frame_length() > DEFAULT_FRAME_LENGTH {
            2
        } else {
            1
        }
    }

    /// Common admission checks; returns the number of bytes the operation moves.
    fn admit(
        &mut self,
        operation: BusOperation,
        count: usize,
        capacity: usize,
    ) -> Result<usize, HalError> {
        if self.role.is_none() || self.control.is_none() {
            return Err(HalError::NotInitialized);
        }
        if self.pending.is_some() {
            return Err(HalError::Busy);
        }
        if let Some(err) = self.fail_next.remove(&operation) {
            log::debug!("sim: injected {operation} failure: {err}");
            return Err(err);
        }
        let bytes = count
            .checked_mul(self.bytes_per_word())
            .filter(|&bytes| count != 0 && bytes <= capacity)
            .ok_or_else(|| {
                HalError::InvalidParameter(format!(
                    "{operation} of {count} words does not fit a {capacity}-byte buffer"
                ))
            })?;
        *self.issued.entry(operation).or_insert(0) += 1;
        self.pending = Some(Pending {
            operation,
            remaining: self.latency_polls,
        });
        self.status.busy = true;
        Ok(bytes)
    }

    fn apply_corruption(&mut self, inbound: &mut [u8]) {
        if let Some((index, pattern)) = self.corruption.take() {
            if let Some(byte) = inbound.get_mut(index) {
                *byte ^= pattern;
            }
        }
    }

    fn deliver(&mut self, event: BusEvent) {
        match event {
            BusEvent::DataLost => self.status.data_lost = true,
            BusEvent::ModeFault => self.status.mode_fault = true,
            BusEvent::TransferComplete => {}
        }
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl GspiBus for SimBus {
    fn version(&self) -> DriverVersion {
        DriverVersion {
            release: 0,
            major: 1,
            minor: 0,
        }
    }

    fn configure_clock(&mut self, clock: &ClockConfig) -> Result<(), HalError> {
        clock.validate()?;
        self.clock = Some(clock.clone());
        Ok(())
    }

    fn init(&mut self, role: Role) -> Result<(), HalError> {
        if self.clock.is_none() {
            return Err(HalError::NotInitialized);
        }
        if role != Role::Master {
            return Err(HalError::Unsupported("sim bus only runs as master".into()));
        }
        self.role = Some(role);
        Ok(())
    }

    fn status(&self) -> BusStatus {
        self.status
    }

    fn set_configuration(&mut self, config: &ControlConfig) -> Result<(), HalError> {
        if self.role.is_none() {
            return Err(HalError::NotInitialized);
        }
        config.validate()?;
        self.control = Some(config.clone());
        Ok(())
    }

    fn register_event_callback(&mut self, callback: EventCallback) -> Result<(), HalError> {
        if self.role.is_none() {
            return Err(HalError::NotInitialized);
        }
        self.callback = Some(callback);
        Ok(())
    }

    fn clock_division_factor(&self) -> u32 {
        match (&self.clock, &self.control) {
            (Some(clock), Some(control)) => {
                (clock.intf_pll_clock / control.bitrate.saturating_mul(2)).max(1)
            }
            _ => 0,
        }
    }

    fn frame_length(&self) -> u8 {
        self.frame_override
            .or_else(|| self.control.as_ref().map(|c| c.bit_width))
            .unwrap_or(DEFAULT_FRAME_LENGTH)
    }

    fn select_slave(&mut self, slave: SlaveSelect) {
        self.slave = slave;
    }

    fn transfer(
        &mut self,
        outbound: &[u8],
        inbound: &mut [u8],
        count: usize,
    ) -> Result<(), HalError> {
        let bytes = self.admit(
            BusOperation::Transfer,
            count,
            outbound.len().min(inbound.len()),
        )?;
        self.wire = outbound[..bytes].to_vec();
        inbound[..bytes].copy_from_slice(&outbound[..bytes]);
        self.apply_corruption(inbound);
        Ok(())
    }

    fn send(&mut self, outbound: &[u8], count: usize) -> Result<(), HalError> {
        let bytes = self.admit(BusOperation::Send, count, outbound.len())?;
        self.wire = outbound[..bytes].to_vec();
        Ok(())
    }

    fn receive(&mut self, inbound: &mut [u8], count: usize) -> Result<(), HalError> {
        let bytes = self.admit(BusOperation::Receive, count, inbound.len())?;
        for (i, byte) in inbound[..bytes].iter_mut().enumerate() {
            // Nothing driven on the line reads back as zero.
            *byte = self.wire.get(i).copied().unwrap_or(0);
        }
        self.apply_corruption(inbound);
        Ok(())
    }

    fn service(&mut self) -> Result<(), HalError> {
        for event in std::mem::take(&mut self.queued_events) {
            self.deliver(event);
        }
        let Some(pending) = self.pending.as_mut() else {
            return Ok(());
        };
        if pending.remaining > 0 {
            pending.remaining -= 1;
            return Ok(());
        }
        log::debug!("sim: {} complete", pending.operation);
        self.pending = None;
        self.status.busy = false;
        self.deliver(BusEvent::TransferComplete);
        Ok(())
    }
}
