//! Self-test orchestrator.
//!
//! Reads a TOML config file, selects the GSPI backend, brings the master up
//! and drives the requested number of loop-back runs.
//!
//! Supported modes:
//! - `sim`: SimBus loop-back (host, CI)
//! - `si91x`: on-chip GSPI master (target only, reserved)

use gspi_hal::config::GspiSettings;
use gspi_hal::sim::SimBus;
use gspi_hal::traits::{BusOperation, GspiBus, HalError};
use gspi_runtime::engine::LoopbackEngine;
use gspi_runtime::error::SetupError;
use gspi_runtime::machine::{LoopbackMachine, RunReport, TestFlags};
use serde::Deserialize;

/// Top-level self-test config, deserialized from TOML.
#[derive(Debug, Deserialize)]
pub struct OrchestratorConfig {
    pub mode: ModeConfig,
    #[serde(default)]
    pub sim: SimSection,
    #[serde(default)]
    pub gspi: GspiSettings,
    #[serde(default)]
    pub test: TestSection,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize)]
pub struct ModeConfig {
    #[serde(rename = "type")]
    pub mode_type: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimSection {
    #[serde(default)]
    pub latency_polls: u32,
    #[serde(default)]
    pub frame_width: Option<u8>,
    /// Fail the first call of this operation.
    #[serde(default)]
    pub fail_operation: Option<BusOperation>,
}

#[derive(Debug, Deserialize)]
pub struct TestSection {
    #[serde(default = "enabled")]
    pub use_transfer: bool,
    #[serde(default = "enabled")]
    pub use_send: bool,
    #[serde(default = "enabled")]
    pub use_receive: bool,
    #[serde(default = "default_runs")]
    pub runs: u32,
}

fn enabled() -> bool {
    true
}
fn default_runs() -> u32 {
    1
}

impl Default for TestSection {
    fn default() -> Self {
        Self {
            use_transfer: true,
            use_send: true,
            use_receive: true,
            runs: default_runs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u64,
}

fn default_poll_interval() -> u64 {
    1
}
fn default_max_polls() -> u64 {
    10_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_polls: default_max_polls(),
        }
    }
}

/// Parsed backend selection.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMode {
    Sim {
        latency_polls: u32,
        frame_width: Option<u8>,
        fail_operation: Option<BusOperation>,
    },
    Si91x,
}

impl OrchestratorConfig {
    /// Parse from TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Parse from TOML file path.
    pub fn from_file(path: &str) -> Result<Self, OrchestratorError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OrchestratorError::ConfigError(format!("{path}: {e}")))?;
        Self::from_toml(&content).map_err(|e| OrchestratorError::ConfigError(e.to_string()))
    }

    /// Resolve the mode from config.
    pub fn bus_mode(&self) -> Result<BusMode, OrchestratorError> {
        match self.mode.mode_type.as_str() {
            "sim" => Ok(BusMode::Sim {
                latency_polls: self.sim.latency_polls,
                frame_width: self.sim.frame_width,
                fail_operation: self.sim.fail_operation,
            }),
            "si91x" => Ok(BusMode::Si91x),
            other => Err(OrchestratorError::ConfigError(format!(
                "unknown mode type: {other}"
            ))),
        }
    }

    pub fn flags(&self) -> TestFlags {
        TestFlags {
            use_transfer: self.test.use_transfer,
            use_send: self.test.use_send,
            use_receive: self.test.use_receive,
        }
    }
}

/// Create a GSPI backend from orchestrator config.
pub fn create_backend(config: &OrchestratorConfig) -> Result<Box<dyn GspiBus>, OrchestratorError> {
    match config.bus_mode()? {
        BusMode::Sim {
            latency_polls,
            frame_width,
            fail_operation,
        } => {
            let mut bus = SimBus::new().with_latency(latency_polls);
            if let Some(width) = frame_width {
                bus.set_frame_length(width);
            }
            if let Some(operation) = fail_operation {
                log::info!("sim: first {operation} call will fail");
                bus.fail_next(
                    operation,
                    HalError::CommError(format!("injected {operation} failure")),
                );
            }
            Ok(Box::new(bus))
        }
        BusMode::Si91x => Err(OrchestratorError::ConfigError(
            "si91x backend is only available on target hardware".into(),
        )),
    }
}

/// Bring the bus up and perform `test.runs` loop-back runs.
///
/// Stops early if a run does not complete within `runtime.max_polls`; that
/// run's partial report is the last element returned.
pub fn run_self_test(config: &OrchestratorConfig) -> Result<Vec<RunReport>, OrchestratorError> {
    if config.test.runs == 0 {
        return Err(OrchestratorError::ConfigError("test.runs must be at least 1".into()));
    }
    let bus = create_backend(config)?;
    let (machine, negotiated) = LoopbackMachine::bring_up(bus, &config.gspi, config.flags())?;
    log::info!(
        "GSPI master up: frame width {}, division factor {}",
        negotiated.frame_bit_width,
        negotiated.division_factor
    );

    let mut engine: LoopbackEngine<Box<dyn GspiBus>> =
        LoopbackEngine::new(machine, config.runtime.poll_interval_ms);
    let mut reports = Vec::new();
    for run in 1..=config.test.runs {
        if run > 1 {
            engine.start_run();
        }
        let finished = engine.run_realtime(config.runtime.max_polls).is_some();
        let report = engine.machine.report().clone();
        log::info!(
            "run {run}: {} after {} polls",
            if report.passed() { "passed" } else { "failed" },
            engine.poll_count
        );
        reports.push(report);
        if !finished {
            break;
        }
    }
    Ok(reports)
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("config error: {0}")]
    ConfigError(String),
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),
}
