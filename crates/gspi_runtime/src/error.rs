use gspi_hal::traits::{BusOperation, HalError};
use thiserror::Error;

/// Outcomes that end or fail a loop-back run. None of them is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopbackError {
    #[error("configuration error: {0}")]
    ConfigurationError(String),
    #[error("{operation} call failed: {source}")]
    BusCallFailure {
        operation: BusOperation,
        source: HalError,
    },
    #[error("data mismatch at index {index}")]
    DataMismatch { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Configuration(#[source] HalError),
    #[error("{step} failed: {source}")]
    Bus {
        step: &'static str,
        source: HalError,
    },
}
