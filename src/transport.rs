//! Transport functionality
//!
//! The [`TransportController`] turns derived tempo and play state into clock
//! retunes and MIDI Start/Stop messages, once per state change.

use crate::clock::ClockScheduler;
use crate::error::Result;
use crate::midi::{MidiEngine, MidiMessage};
use crate::status::DerivedState;
use log::{debug, info};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TempoState {
    Unset,
    Armed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
}

impl TransportState {
    fn from_playing(is_playing: bool) -> Self {
        if is_playing {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }
}

pub struct TransportController {
    tempo: TempoState,
    transport: TransportState,
}

impl Default for TransportController {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportController {
    pub fn new() -> Self {
        Self {
            tempo: TempoState::Unset,
            transport: TransportState::Stopped,
        }
    }

    pub fn tempo(&self) -> TempoState {
        self.tempo
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    /// Reconciles the controller with freshly derived state.
    ///
    /// Transport messages are emitted even if the retune failed; the retune
    /// error is returned afterwards.
    pub fn apply<E: MidiEngine + ?Sized>(
        &mut self,
        derived: &DerivedState,
        scheduler: &mut ClockScheduler,
        engine: &mut E,
        now: Instant,
    ) -> Result<()> {
        let tempo_result = match derived.bpm {
            Some(bpm) => self.update_tempo(bpm, scheduler, now),
            None => Ok(()),
        };
        self.update_transport(derived.is_playing, scheduler, engine, now)?;
        tempo_result
    }

    fn update_tempo(
        &mut self,
        bpm: f64,
        scheduler: &mut ClockScheduler,
        now: Instant,
    ) -> Result<()> {
        if self.tempo == TempoState::Armed(bpm) {
            return Ok(());
        }

        scheduler.retune(bpm, now)?;
        if self.tempo == TempoState::Unset {
            info!("Starting timer");
        }
        self.tempo = TempoState::Armed(bpm);

        let correction = scheduler.correction();
        if correction != 0.0 {
            info!("Setting bpm to: {} + {}%", bpm, correction);
        } else {
            info!("Setting bpm to: {}", bpm);
        }
        Ok(())
    }

    fn update_transport<E: MidiEngine + ?Sized>(
        &mut self,
        is_playing: bool,
        scheduler: &mut ClockScheduler,
        engine: &mut E,
        now: Instant,
    ) -> Result<()> {
        let next = TransportState::from_playing(is_playing);
        if next == self.transport {
            return Ok(());
        }

        let message = match next {
            TransportState::Playing => {
                scheduler.start(now);
                MidiMessage::Start
            }
            TransportState::Stopped => MidiMessage::Stop,
        };

        // The state flips even if the send fails so the message is not
        // retried on every following report.
        self.transport = next;
        engine.send(message)?;
        info!("Sent {} message", message);
        debug!("Transport is now {:?}", next);
        Ok(())
    }

    /// Sends a final Stop if transport is playing.
    pub fn shutdown<E: MidiEngine + ?Sized>(&mut self, engine: &mut E) -> Result<()> {
        if self.transport == TransportState::Playing {
            self.transport = TransportState::Stopped;
            engine.send(MidiMessage::Stop)?;
            info!("Sent {} message", MidiMessage::Stop);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::midi::MockMidiEngine;

    fn derived(bpm: Option<f64>, is_playing: bool) -> DerivedState {
        DerivedState {
            bpm,
            is_playing,
            master: bpm.map(|_| 1),
            beat_in_measure: None,
        }
    }

    #[test]
    fn test_initial_state() {
        let controller = TransportController::new();
        assert_eq!(controller.tempo(), TempoState::Unset);
        assert_eq!(controller.transport(), TransportState::Stopped);
    }

    #[test]
    fn test_first_bpm_arms_clock() {
        let now = Instant::now();
        let mut controller = TransportController::new();
        let mut clock = ClockScheduler::new(0.0, 24);
        let mut engine = MockMidiEngine::new();

        controller
            .apply(&derived(Some(128.0), false), &mut clock, &mut engine, now)
            .unwrap();

        assert_eq!(controller.tempo(), TempoState::Armed(128.0));
        assert_eq!(clock.armed_bpm(), Some(128.0));
        assert!(clock.is_running());
        // Arming the tempo never emits transport messages
        assert!(engine.messages().is_empty());
    }

    #[test]
    fn test_start_emitted_once() {
        let now = Instant::now();
        let mut controller = TransportController::new();
        let mut clock = ClockScheduler::new(0.0, 24);
        let mut engine = MockMidiEngine::new();

        for _ in 0..5 {
            controller
                .apply(&derived(Some(120.0), true), &mut clock, &mut engine, now)
                .unwrap();
        }
        assert_eq!(engine.messages(), vec![MidiMessage::Start]);

        controller
            .apply(&derived(Some(120.0), false), &mut clock, &mut engine, now)
            .unwrap();
        controller
            .apply(&derived(Some(120.0), false), &mut clock, &mut engine, now)
            .unwrap();
        assert_eq!(
            engine.messages(),
            vec![MidiMessage::Start, MidiMessage::Stop]
        );
        // Clock keeps running while stopped
        assert!(clock.is_running());
    }

    #[test]
    fn test_playing_without_tempo() {
        let now = Instant::now();
        let mut controller = TransportController::new();
        let mut clock = ClockScheduler::new(0.0, 24);
        let mut engine = MockMidiEngine::new();

        controller
            .apply(&derived(None, true), &mut clock, &mut engine, now)
            .unwrap();
        assert_eq!(engine.messages(), vec![MidiMessage::Start]);
        assert_eq!(controller.tempo(), TempoState::Unset);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_invalid_bpm_keeps_previous_tempo() {
        let now = Instant::now();
        let mut controller = TransportController::new();
        let mut clock = ClockScheduler::new(0.0, 24);
        let mut engine = MockMidiEngine::new();

        controller
            .apply(&derived(Some(120.0), false), &mut clock, &mut engine, now)
            .unwrap();
        let result = controller.apply(&derived(Some(0.0), true), &mut clock, &mut engine, now);

        assert!(matches!(result, Err(Error::Clock(_))));
        assert_eq!(controller.tempo(), TempoState::Armed(120.0));
        assert_eq!(clock.armed_bpm(), Some(120.0));
        // Transport still followed the play state
        assert_eq!(engine.messages(), vec![MidiMessage::Start]);
    }

    #[test]
    fn test_send_failure_does_not_retry() {
        let now = Instant::now();
        let mut controller = TransportController::new();
        let mut clock = ClockScheduler::new(0.0, 24);
        let mut engine = MockMidiEngine::failing();

        let first = controller.apply(&derived(None, true), &mut clock, &mut engine, now);
        assert!(matches!(first, Err(Error::Midi(_))));
        assert_eq!(controller.transport(), TransportState::Playing);

        let second = controller.apply(&derived(None, true), &mut clock, &mut engine, now);
        assert!(second.is_ok());
    }

    #[test]
    fn test_shutdown_stops_playing_transport() {
        let now = Instant::now();
        let mut controller = TransportController::new();
        let mut clock = ClockScheduler::new(0.0, 24);
        let mut engine = MockMidiEngine::new();

        controller.shutdown(&mut engine).unwrap();
        assert!(engine.messages().is_empty());

        controller
            .apply(&derived(Some(120.0), true), &mut clock, &mut engine, now)
            .unwrap();
        controller.shutdown(&mut engine).unwrap();
        assert_eq!(
            engine.messages(),
            vec![MidiMessage::Start, MidiMessage::Stop]
        );
        assert_eq!(controller.transport(), TransportState::Stopped);
    }
}
