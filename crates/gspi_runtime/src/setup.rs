use crate::compare::MAX_FRAME_BIT_WIDTH;
use crate::completion::CompletionFlag;
use crate::error::SetupError;
use crate::session::division_factor_for;
use gspi_hal::config::GspiSettings;
use gspi_hal::traits::{DriverVersion, GspiBus, HalError, Role};

/// Bus parameters learned while bringing the master up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub version: DriverVersion,
    pub frame_bit_width: u8,
    pub division_factor: usize,
    pub clock_division_factor: u32,
}

fn bus_step(step: &'static str) -> impl FnOnce(HalError) -> SetupError {
    move |source| {
        log::error!("{step}: {source}");
        SetupError::Bus { step, source }
    }
}

/// One-time bring-up of a GSPI master; must succeed before the first poll.
///
/// Configures clocks, initializes the master role, applies the control
/// configuration and routes transfer-complete events to `completion`.
/// The first failing step aborts the sequence.
pub fn setup<B: GspiBus + ?Sized>(
    bus: &mut B,
    settings: &GspiSettings,
    completion: &CompletionFlag,
) -> Result<Negotiated, SetupError> {
    let version = bus.version();
    log::info!(
        "GSPI driver version {}.{}.{}",
        version.release,
        version.major,
        version.minor
    );

    settings.clock.validate().map_err(|e| {
        log::error!("clock configuration rejected: {e}");
        SetupError::Configuration(e)
    })?;
    settings.control.validate().map_err(|e| {
        log::error!("control configuration rejected: {e}");
        SetupError::Configuration(e)
    })?;

    bus.configure_clock(&settings.clock)
        .map_err(bus_step("configure_clock"))?;
    log::info!("clock configuration successful");

    bus.init(Role::Master).map_err(bus_step("init"))?;
    log::info!("GSPI initialization successful");

    let status = bus.status();
    log::info!(
        "busy: {}, data lost: {}, mode fault: {}",
        status.busy,
        status.data_lost,
        status.mode_fault
    );

    bus.set_configuration(&settings.control)
        .map_err(bus_step("set_configuration"))?;
    log::info!("GSPI configuration successful");

    bus.register_event_callback(completion.event_handler())
        .map_err(bus_step("register_event_callback"))?;
    log::info!("event callback registered");

    let clock_division_factor = bus.clock_division_factor();
    let frame_bit_width = bus.frame_length();
    log::info!("clock division factor {clock_division_factor}, frame length {frame_bit_width}");
    if !(1..=MAX_FRAME_BIT_WIDTH).contains(&frame_bit_width) {
        log::error!("negotiated frame length {frame_bit_width} outside 1..={MAX_FRAME_BIT_WIDTH}");
        return Err(SetupError::Configuration(HalError::InvalidConfig(format!(
            "negotiated frame length {frame_bit_width} outside 1..={MAX_FRAME_BIT_WIDTH}"
        ))));
    }

    Ok(Negotiated {
        version,
        frame_bit_width,
        division_factor: division_factor_for(frame_bit_width),
        clock_division_factor,
    })
}
