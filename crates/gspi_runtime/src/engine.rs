use gspi_hal::traits::GspiBus;
use std::time::{Duration, Instant};

use crate::machine::{LoopbackMachine, RunReport, TransmissionMode};
use crate::session::GSPI_BUFFER_SIZE;

/// Cooperative polling loop around a [`LoopbackMachine`].
pub struct LoopbackEngine<B: GspiBus, const N: usize = GSPI_BUFFER_SIZE> {
    pub machine: LoopbackMachine<B, N>,
    pub poll_interval: Duration,
    pub poll_count: u64,
}

impl<B: GspiBus, const N: usize> LoopbackEngine<B, N> {
    pub fn new(machine: LoopbackMachine<B, N>, poll_interval_ms: u64) -> Self {
        Self {
            machine,
            poll_interval: Duration::from_millis(poll_interval_ms),
            poll_count: 0,
        }
    }

    /// Reset the machine for another run and restart the poll counter.
    pub fn start_run(&mut self) {
        self.machine.reset();
        self.poll_count = 0;
    }

    pub fn step(&mut self) -> TransmissionMode {
        self.poll_count += 1;
        self.machine.step()
    }

    pub fn run_polls(&mut self, count: u64) {
        for _ in 0..count {
            self.step();
        }
    }

    /// Poll until the run completes. `None` if `max_polls` ran out first.
    pub fn run_until_complete(&mut self, max_polls: u64) -> Option<&RunReport> {
        for _ in 0..max_polls {
            if self.step() == TransmissionMode::Completed {
                return Some(self.machine.report());
            }
        }
        log::warn!(
            "run still in {:?} after {max_polls} polls",
            self.machine.mode()
        );
        None
    }

    /// Like [`run_until_complete`](Self::run_until_complete), pacing polls at `poll_interval`.
    pub fn run_realtime(&mut self, max_polls: u64) -> Option<&RunReport> {
        for _ in 0..max_polls {
            let t0 = Instant::now();
            if self.step() == TransmissionMode::Completed {
                return Some(self.machine.report());
            }
            let elapsed = t0.elapsed();
            if elapsed < self.poll_interval {
                std::thread::sleep(self.poll_interval - elapsed);
            }
        }
        log::warn!(
            "run still in {:?} after {max_polls} paced polls",
            self.machine.mode()
        );
        None
    }
}
