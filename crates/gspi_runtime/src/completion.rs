use gspi_hal::traits::{BusEvent, EventCallback};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-writer, single-reader "operation finished" flag.
///
/// The driver's event callback raises it; the polling side consumes it with
/// [`take`](Self::take), which reads and clears in one atomic step.
#[derive(Debug, Clone, Default)]
pub struct CompletionFlag {
    raised: Arc<AtomicBool>,
}

impl CompletionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Returns whether a completion was pending, clearing it.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::Acquire)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Event callback to register with the driver.
    pub fn event_handler(&self) -> EventCallback {
        let flag = self.clone();
        Box::new(move |event: BusEvent| match event {
            BusEvent::TransferComplete => flag.raise(),
            BusEvent::DataLost => log::warn!("GSPI event: data lost"),
            BusEvent::ModeFault => log::warn!("GSPI event: mode fault"),
        })
    }
}
