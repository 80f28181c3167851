use crate::completion::CompletionFlag;
use crate::error::{LoopbackError, SetupError};
use crate::session::{GSPI_BUFFER_SIZE, TransferSession};
use crate::setup::{Negotiated, setup};
use gspi_hal::config::GspiSettings;
use gspi_hal::traits::{BusOperation, GspiBus, SlaveSelect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionMode {
    Transfer,
    Send,
    Receive,
    Completed,
}

/// Static switches for the optional legs of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestFlags {
    /// Carried for completeness; the transfer leg always runs.
    pub use_transfer: bool,
    pub use_send: bool,
    pub use_receive: bool,
}

impl Default for TestFlags {
    fn default() -> Self {
        Self {
            use_transfer: true,
            use_send: true,
            use_receive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub phase: TransmissionMode,
    pub result: Result<(), LoopbackError>,
}

/// What happened during one run, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub visited: Vec<TransmissionMode>,
    pub comparisons: Vec<Comparison>,
    pub failure: Option<LoopbackError>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            visited: vec![TransmissionMode::Transfer],
            comparisons: Vec::new(),
            failure: None,
        }
    }

    pub fn completed(&self) -> bool {
        self.visited.last() == Some(&TransmissionMode::Completed)
    }

    pub fn passed(&self) -> bool {
        self.completed()
            && self.failure.is_none()
            && self.comparisons.iter().all(|c| c.result.is_ok())
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &Comparison> {
        self.comparisons.iter().filter(|c| c.result.is_err())
    }
}

/// Transfer → send → receive loop-back sequence over a GSPI bus.
pub struct LoopbackMachine<B: GspiBus, const N: usize = GSPI_BUFFER_SIZE> {
    bus: B,
    session: TransferSession<N>,
    mode: TransmissionMode,
    begin_transmission: bool,
    completion: CompletionFlag,
    flags: TestFlags,
    report: RunReport,
}

impl<B: GspiBus, const N: usize> LoopbackMachine<B, N> {
    /// Wrap an already brought-up bus. `completion` must be the flag its callback raises.
    pub fn new(bus: B, frame_bit_width: u8, completion: CompletionFlag, flags: TestFlags) -> Self {
        let mut machine = Self {
            bus,
            session: TransferSession::new(frame_bit_width),
            mode: TransmissionMode::Transfer,
            begin_transmission: true,
            completion,
            flags,
            report: RunReport::new(),
        };
        machine.reset_buffers();
        machine
    }

    /// Run [`setup`] on `bus` and build a machine ready for its first poll.
    pub fn bring_up(
        mut bus: B,
        settings: &GspiSettings,
        flags: TestFlags,
    ) -> Result<(Self, Negotiated), SetupError> {
        let completion = CompletionFlag::new();
        let negotiated = setup(&mut bus, settings, &completion)?;
        let machine = Self::new(bus, negotiated.frame_bit_width, completion, flags);
        Ok((machine, negotiated))
    }

    pub fn mode(&self) -> TransmissionMode {
        self.mode
    }

    pub fn is_complete(&self) -> bool {
        self.mode == TransmissionMode::Completed
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn session(&self) -> &TransferSession<N> {
        &self.session
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn reset_buffers(&mut self) {
        self.session.fill_pattern();
    }

    /// Start a new run from `Transfer`, discarding any stale completion.
    pub fn reset(&mut self) {
        self.completion.take();
        self.session.renegotiate(self.bus.frame_length());
        self.reset_buffers();
        self.mode = TransmissionMode::Transfer;
        self.begin_transmission = true;
        self.report = RunReport::new();
    }

    /// Advance the sequence by at most one transition. Never blocks.
    pub fn step(&mut self) -> TransmissionMode {
        if let Err(e) = self.bus.service() {
            log::debug!("bus service: {e}");
        }

        match self.mode {
            TransmissionMode::Transfer => {
                if self.begin_transmission && !self.issue(BusOperation::Transfer) {
                    return self.mode;
                }
                if self.completion.take() {
                    log::info!("GSPI transfer completed");
                    self.compare(TransmissionMode::Transfer);
                    let next = if self.flags.use_send {
                        TransmissionMode::Send
                    } else if self.flags.use_receive {
                        TransmissionMode::Receive
                    } else {
                        TransmissionMode::Completed
                    };
                    self.enter(next);
                }
            }
            TransmissionMode::Send => {
                if self.begin_transmission && !self.issue(BusOperation::Send) {
                    return self.mode;
                }
                if self.completion.take() {
                    log::info!("GSPI send completed");
                    let next = if self.flags.use_receive {
                        TransmissionMode::Receive
                    } else {
                        TransmissionMode::Completed
                    };
                    self.enter(next);
                }
            }
            TransmissionMode::Receive => {
                if self.begin_transmission && !self.issue(BusOperation::Receive) {
                    return self.mode;
                }
                if self.completion.take() {
                    log::info!("GSPI receive completed");
                    self.compare(TransmissionMode::Receive);
                    self.enter(TransmissionMode::Completed);
                }
            }
            TransmissionMode::Completed => {}
        }
        self.mode
    }

    /// Issue the bus call for the current state. On failure the run is over.
    fn issue(&mut self, operation: BusOperation) -> bool {
        self.bus.select_slave(SlaveSelect::Slave0);
        let count = self.session.word_count();
        let result = match operation {
            BusOperation::Transfer => {
                self.bus
                    .transfer(&self.session.outbound, &mut self.session.inbound, count)
            }
            BusOperation::Send => self.bus.send(&self.session.outbound, count),
            BusOperation::Receive => self.bus.receive(&mut self.session.inbound, count),
        };

        match result {
            Ok(()) => {
                log::info!("GSPI {operation} started ({count} words)");
                self.begin_transmission = false;
                true
            }
            Err(source) => {
                log::error!("GSPI {operation} failed: {source}");
                self.report.failure = Some(LoopbackError::BusCallFailure { operation, source });
                self.enter(TransmissionMode::Completed);
                false
            }
        }
    }

    fn compare(&mut self, phase: TransmissionMode) {
        // Width may have been renegotiated since the run started.
        self.session.set_frame_bit_width(self.bus.frame_length());
        let result = self.session.compare();
        match &result {
            Ok(()) => log::info!("loop-back data matches"),
            Err(e) => log::warn!("loop-back data differs: {e}"),
        }
        self.report.comparisons.push(Comparison { phase, result });
    }

    fn enter(&mut self, next: TransmissionMode) {
        log::debug!("{:?} -> {:?}", self.mode, next);
        self.mode = next;
        self.begin_transmission = true;
        self.report.visited.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gspi_hal::sim::SimBus;
    use gspi_hal::traits::HalError;

    fn machine(flags: TestFlags) -> LoopbackMachine<SimBus> {
        let (machine, _) =
            LoopbackMachine::bring_up(SimBus::new(), &GspiSettings::default(), flags).unwrap();
        machine
    }

    fn run(machine: &mut LoopbackMachine<SimBus>, max_polls: usize) -> usize {
        for poll in 1..=max_polls {
            machine.step();
            if machine.is_complete() {
                return poll;
            }
        }
        panic!("run did not complete within {max_polls} polls");
    }

    #[test]
    fn transfer_only_completes_after_one_cycle() {
        let mut m = machine(TestFlags {
            use_transfer: true,
            use_send: false,
            use_receive: false,
        });
        run(&mut m, 10);
        assert_eq!(
            m.report().visited,
            vec![TransmissionMode::Transfer, TransmissionMode::Completed]
        );
        assert_eq!(m.bus().issued(BusOperation::Transfer), 1);
        assert_eq!(m.bus().issued(BusOperation::Send), 0);
        assert_eq!(m.bus().selected_slave(), SlaveSelect::Slave0);
        assert_eq!(m.report().comparisons.len(), 1);
        assert!(m.report().passed());
    }

    #[test]
    fn all_legs_visit_every_state_in_order() {
        let mut m = machine(TestFlags::default());
        run(&mut m, 20);
        assert_eq!(
            m.report().visited,
            vec![
                TransmissionMode::Transfer,
                TransmissionMode::Send,
                TransmissionMode::Receive,
                TransmissionMode::Completed,
            ]
        );
        let phases: Vec<_> = m.report().comparisons.iter().map(|c| c.phase).collect();
        assert_eq!(phases, vec![TransmissionMode::Transfer, TransmissionMode::Receive]);
        assert!(m.report().passed());
    }

    #[test]
    fn receive_only_skips_send() {
        let mut m = machine(TestFlags {
            use_transfer: true,
            use_send: false,
            use_receive: true,
        });
        run(&mut m, 20);
        assert_eq!(
            m.report().visited,
            vec![
                TransmissionMode::Transfer,
                TransmissionMode::Receive,
                TransmissionMode::Completed,
            ]
        );
        assert!(m.report().passed());
    }

    #[test]
    fn issuing_call_is_not_repeated_while_waiting() {
        let (mut m, _) = LoopbackMachine::<SimBus>::bring_up(
            SimBus::new().with_latency(5),
            &GspiSettings::default(),
            TestFlags {
                use_transfer: true,
                use_send: false,
                use_receive: false,
            },
        )
        .unwrap();
        for _ in 0..5 {
            assert_eq!(m.step(), TransmissionMode::Transfer);
        }
        assert_eq!(m.bus().issued(BusOperation::Transfer), 1);
        assert_eq!(m.step(), TransmissionMode::Transfer);
        assert_eq!(m.step(), TransmissionMode::Completed);
        assert_eq!(m.bus().issued(BusOperation::Transfer), 1);
    }

    #[test]
    fn failed_transfer_completes_without_comparing() {
        let mut m = machine(TestFlags::default());
        m.bus_mut()
            .fail_next(BusOperation::Transfer, HalError::CommError("no clock".into()));
        assert_eq!(m.step(), TransmissionMode::Completed);
        assert!(m.report().comparisons.is_empty());
        assert!(matches!(
            m.report().failure,
            Some(LoopbackError::BusCallFailure {
                operation: BusOperation::Transfer,
                ..
            })
        ));
        assert!(!m.report().passed());
        assert_eq!(m.step(), TransmissionMode::Completed);
    }

    #[test]
    fn failed_send_skips_receive() {
        let mut m = machine(TestFlags::default());
        m.bus_mut().fail_next(BusOperation::Send, HalError::Busy);
        run(&mut m, 20);
        assert_eq!(
            m.report().visited,
            vec![
                TransmissionMode::Transfer,
                TransmissionMode::Send,
                TransmissionMode::Completed,
            ]
        );
        assert_eq!(m.report().comparisons.len(), 1);
        assert_eq!(m.bus().issued(BusOperation::Receive), 0);
    }

    #[test]
    fn failed_receive_does_not_compare() {
        let mut m = machine(TestFlags::default());
        m.bus_mut()
            .fail_next(BusOperation::Receive, HalError::CommError("overrun".into()));
        run(&mut m, 20);
        let phases: Vec<_> = m.report().comparisons.iter().map(|c| c.phase).collect();
        assert_eq!(phases, vec![TransmissionMode::Transfer]);
        assert!(m.report().failure.is_some());
    }

    #[test]
    fn corrupted_transfer_reports_mismatch_and_continues() {
        let mut m = machine(TestFlags::default());
        m.bus_mut().corrupt_next_inbound(500, 0x40);
        run(&mut m, 20);
        let mismatches: Vec<_> = m.report().mismatches().collect();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].phase, TransmissionMode::Transfer);
        assert_eq!(
            mismatches[0].result,
            Err(LoopbackError::DataMismatch { index: 500 })
        );
        assert!(m.report().completed());
        assert!(!m.report().passed());
    }

    #[test]
    fn reset_starts_a_fresh_run() {
        let mut m = machine(TestFlags::default());
        m.bus_mut().corrupt_next_inbound(3, 0x01);
        run(&mut m, 20);
        assert!(!m.report().passed());

        m.reset();
        assert_eq!(m.mode(), TransmissionMode::Transfer);
        assert_eq!(m.session().outbound[3], 4);
        run(&mut m, 20);
        assert!(m.report().passed());
        assert_eq!(m.bus().issued(BusOperation::Transfer), 2);
    }

    #[test]
    fn reset_discards_stale_completion() {
        let completion = CompletionFlag::new();
        let mut bus = SimBus::new();
        setup(&mut bus, &GspiSettings::default(), &completion).unwrap();
        let mut m = LoopbackMachine::<_, 16>::new(
            bus,
            8,
            completion.clone(),
            TestFlags::default(),
        );
        completion.raise();
        m.reset();
        assert!(!completion.is_raised());
    }

    #[test]
    fn wide_frames_issue_half_the_words() {
        let settings = GspiSettings {
            control: gspi_hal::config::ControlConfig {
                bit_width: 16,
                ..Default::default()
            },
            ..GspiSettings::default()
        };
        let (mut m, negotiated) = LoopbackMachine::<SimBus>::bring_up(
            SimBus::new(),
            &settings,
            TestFlags {
                use_transfer: true,
                use_send: false,
                use_receive: false,
            },
        )
        .unwrap();
        assert_eq!(negotiated.division_factor, 2);
        assert_eq!(m.session().word_count(), GSPI_BUFFER_SIZE / 2);
        run(&mut m, 10);
        assert!(m.report().passed());
        assert_eq!(m.bus().wire().len(), GSPI_BUFFER_SIZE);
    }
}
