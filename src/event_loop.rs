// event_loop.rs

//! Single threaded engine loop.
//!
//! Owns the status aggregator, the transport controller, the clock scheduler
//! and the MIDI output. Status reports arrive on a channel; between reports
//! the loop waits exactly until the next clock deadline, so retuning and
//! pulse emission never interleave.

use crate::clock::ClockScheduler;
use crate::config::Settings;
use crate::midi::{MidiEngine, MidiMessage};
use crate::status::{DerivedState, StatusAggregator, StatusReport};
use crate::transport::TransportController;
use crate::ui::{DisplayStatus, StatusDisplay};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

/// Longest the loop sleeps without a clock deadline, so device expiry is
/// still evaluated while no reports arrive.
const IDLE_WAIT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    Status(StatusReport),
    Shutdown,
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub reports: u64,
    pub pulses: u64,
}

pub struct EventLoop<E: MidiEngine> {
    aggregator: StatusAggregator,
    controller: TransportController,
    scheduler: ClockScheduler,
    engine: E,
    message_rx: Receiver<EngineMessage>,
    display: Option<StatusDisplay>,
    summary: LoopSummary,
    clock_send_failures: u64,
}

impl<E: MidiEngine> EventLoop<E> {
    pub fn new(settings: &Settings, engine: E, message_rx: Receiver<EngineMessage>) -> Self {
        let aggregator = match settings.device_timeout() {
            Some(timeout) => StatusAggregator::with_device_timeout(timeout),
            None => StatusAggregator::new(),
        };

        EventLoop {
            aggregator,
            controller: TransportController::new(),
            scheduler: ClockScheduler::new(settings.correction, settings.resolution),
            engine,
            message_rx,
            display: None,
            summary: LoopSummary::default(),
            clock_send_failures: 0,
        }
    }

    pub fn with_display(mut self, display: StatusDisplay) -> Self {
        self.display = Some(display);
        self
    }

    /// Runs until the status channel disconnects or a shutdown is requested.
    pub fn run(mut self) -> LoopSummary {
        info!(
            "Engine running at {} pulses per quarter note",
            self.scheduler.resolution()
        );

        loop {
            let timeout = self.wait_timeout(Instant::now());
            match self.message_rx.recv_timeout(timeout) {
                Ok(EngineMessage::Status(report)) => self.handle_status(report),
                Ok(EngineMessage::Shutdown) => {
                    info!("Shutdown requested");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Status feed disconnected");
                    break;
                }
            }

            let now = Instant::now();
            if self.aggregator.expire_stale(now) {
                let derived = self.aggregator.derived();
                self.reconcile(&derived, now);
            }
            self.emit_due_pulse(now);
        }

        self.shutdown();
        self.summary
    }

    fn wait_timeout(&self, now: Instant) -> Duration {
        self.scheduler
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
            .map_or(IDLE_WAIT, |remaining| remaining.min(IDLE_WAIT))
    }

    fn handle_status(&mut self, report: StatusReport) {
        let now = Instant::now();
        self.summary.reports += 1;
        let derived = self.aggregator.ingest_at(report, now);
        self.reconcile(&derived, now);
    }

    fn reconcile(&mut self, derived: &DerivedState, now: Instant) {
        if let Err(e) = self
            .controller
            .apply(derived, &mut self.scheduler, &mut self.engine, now)
        {
            error!("{}", e);
        }
        self.refresh_display();
    }

    fn emit_due_pulse(&mut self, now: Instant) {
        if !self.scheduler.poll(now) {
            return;
        }

        match self.engine.send(MidiMessage::Clock) {
            Ok(()) => {
                self.summary.pulses += 1;
                if self.clock_send_failures > 0 {
                    info!(
                        "Clock output recovered after {} failed pulses",
                        self.clock_send_failures
                    );
                    self.clock_send_failures = 0;
                }
            }
            Err(e) => {
                if self.clock_send_failures == 0 {
                    error!("{}", e);
                }
                self.clock_send_failures += 1;
            }
        }
    }

    fn refresh_display(&self) {
        if let Some(display) = &self.display {
            let derived = self.aggregator.derived();
            display.update(&DisplayStatus {
                bpm: self.scheduler.armed_bpm(),
                transport: self.controller.transport(),
                master: derived.master,
                devices: self.aggregator.device_count(),
                pulses: self.summary.pulses,
            });
        }
    }

    fn shutdown(&mut self) {
        self.scheduler.stop();
        if let Err(e) = self.controller.shutdown(&mut self.engine) {
            warn!("Failed to stop transport: {}", e);
        }
        if let Some(display) = &self.display {
            display.finish();
        }
        debug!(
            "Engine stopped after {} reports and {} pulses",
            self.summary.reports, self.summary.pulses
        );
    }
}
