// clock.rs

//! Deadline driven MIDI clock pulse scheduler.
//!
//! The scheduler never sleeps or spawns threads. The owner asks for the next
//! pulse deadline, waits until then, and calls [`ClockScheduler::poll`]. Every
//! deadline is derived from the previous one on the monotonic clock, so the
//! cadence does not accumulate drift and a retune keeps the phase of the last
//! emitted pulse.

use log::{debug, info, warn};
use std::time::{Duration, Instant};
use thiserror::Error;

/// MIDI standard PPQ (Pulses Per Quarter note)
pub const DEFAULT_RESOLUTION: u32 = 24;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClockError {
    #[error(
        "invalid tempo configuration: {bpm} BPM with {correction}% correction at {resolution} pulses per quarter note"
    )]
    InvalidTempoConfiguration {
        bpm: f64,
        correction: f64,
        resolution: u32,
    },
}

/// Interval between two clock pulses:
/// `(60 / (bpm + correction / 100 * bpm)) / resolution` seconds.
pub fn pulse_period(bpm: f64, correction: f64, resolution: u32) -> Result<Duration, ClockError> {
    let invalid = || ClockError::InvalidTempoConfiguration {
        bpm,
        correction,
        resolution,
    };

    let effective_bpm = bpm + (correction / 100.0) * bpm;
    if resolution == 0 || !effective_bpm.is_finite() || effective_bpm <= 0.0 {
        return Err(invalid());
    }

    let seconds = 60.0 / effective_bpm / f64::from(resolution);
    match Duration::try_from_secs_f64(seconds) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone, Copy)]
struct Cadence {
    period: Duration,
    last_pulse: Instant,
    next_pulse: Instant,
}

/// Owns the single repeating clock pulse.
#[derive(Debug)]
pub struct ClockScheduler {
    correction: f64,
    resolution: u32,
    bpm: Option<f64>,
    period: Option<Duration>,
    cadence: Option<Cadence>,
    halted: bool,
    retunes: u64,
}

impl Default for ClockScheduler {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_RESOLUTION)
    }
}

impl ClockScheduler {
    pub fn new(correction: f64, resolution: u32) -> Self {
        Self {
            correction,
            resolution,
            bpm: None,
            period: None,
            cadence: None,
            halted: false,
            retunes: 0,
        }
    }

    /// Replaces the active cadence with one matching `bpm`.
    ///
    /// The first pulse of the new cadence is due one new period after the
    /// last pulse of the old one, or immediately if that instant has already
    /// passed. An invalid tempo leaves the current cadence untouched. While
    /// the scheduler is stopped the tempo is only recorded.
    pub fn retune(&mut self, bpm: f64, now: Instant) -> Result<(), ClockError> {
        let period = pulse_period(bpm, self.correction, self.resolution)?;

        if self.bpm == Some(bpm) && self.period == Some(period) {
            debug!("Clock already running at {} BPM", bpm);
            return Ok(());
        }

        self.bpm = Some(bpm);
        self.period = Some(period);
        self.retunes += 1;

        if self.halted {
            debug!("Clock stopped, recorded {} BPM for next start", bpm);
            return Ok(());
        }

        self.cadence = Some(match self.cadence {
            Some(previous) => {
                let next_pulse = (previous.last_pulse + period).max(now);
                Cadence {
                    period,
                    last_pulse: previous.last_pulse,
                    next_pulse,
                }
            }
            None => Cadence {
                period,
                last_pulse: now,
                next_pulse: now + period,
            },
        });

        debug!("Clock pulse period set to {:?}", period);
        Ok(())
    }

    /// Cancels the repeating pulse. Idempotent.
    pub fn stop(&mut self) {
        self.halted = true;
        if self.cadence.take().is_some() {
            info!("Clock stopped");
        }
    }

    /// Re-arms the pulse at the last recorded tempo after a [`stop`](Self::stop).
    pub fn start(&mut self, now: Instant) {
        if !self.halted {
            return;
        }
        self.halted = false;

        if let Some(period) = self.period {
            self.cadence = Some(Cadence {
                period,
                last_pulse: now,
                next_pulse: now + period,
            });
            info!("Clock restarted");
        }
    }

    /// Returns true if a pulse is due at `now` and advances to the next deadline.
    ///
    /// The deadline advances by exactly one period. If the caller fell more
    /// than a period behind, the cadence is re-anchored at `now` so missed
    /// pulses are not replayed as a burst.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(cadence) = self.cadence.as_mut() else {
            return false;
        };

        if now < cadence.next_pulse {
            return false;
        }

        cadence.last_pulse = cadence.next_pulse;
        cadence.next_pulse += cadence.period;

        if now > cadence.next_pulse {
            warn!(
                "Clock fell {:?} behind, re-anchoring",
                now.duration_since(cadence.last_pulse)
            );
            cadence.last_pulse = now;
            cadence.next_pulse = now + cadence.period;
        }

        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.cadence.map(|c| c.next_pulse)
    }

    pub fn is_running(&self) -> bool {
        self.cadence.is_some()
    }

    pub fn armed_bpm(&self) -> Option<f64> {
        self.bpm
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Number of tempo changes accepted so far.
    pub fn retunes(&self) -> u64 {
        self.retunes
    }

    pub fn correction(&self) -> f64 {
        self.correction
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(d: Duration, seconds: f64) -> bool {
        (d.as_secs_f64() - seconds).abs() < 1e-5
    }

    #[test]
    fn test_pulse_period_values() {
        assert!(approx(pulse_period(120.0, 0.0, 24).unwrap(), 0.020833));
        assert!(approx(pulse_period(120.0, 2.0, 24).unwrap(), 0.020425));
        assert!(approx(pulse_period(60.0, 0.0, 1).unwrap(), 1.0));
    }

    #[test]
    fn test_correction_direction() {
        let base = pulse_period(128.0, 0.0, 24).unwrap();
        assert!(pulse_period(128.0, 5.0, 24).unwrap() < base);
        assert!(pulse_period(128.0, -5.0, 24).unwrap() > base);
    }

    #[test]
    fn test_invalid_tempo_configuration() {
        assert!(pulse_period(0.0, 0.0, 24).is_err());
        assert!(pulse_period(-10.0, 0.0, 24).is_err());
        assert!(pulse_period(120.0, -100.0, 24).is_err());
        assert!(pulse_period(f64::NAN, 0.0, 24).is_err());
        assert_eq!(
            pulse_period(120.0, 0.0, 0),
            Err(ClockError::InvalidTempoConfiguration {
                bpm: 120.0,
                correction: 0.0,
                resolution: 0
            })
        );
    }

    #[test]
    fn test_failed_retune_keeps_previous_cadence() {
        let t0 = Instant::now();
        let mut clock = ClockScheduler::new(0.0, 24);
        clock.retune(120.0, t0).unwrap();
        let deadline = clock.next_deadline();

        assert!(clock.retune(0.0, t0).is_err());
        assert_eq!(clock.armed_bpm(), Some(120.0));
        assert_eq!(clock.next_deadline(), deadline);
        assert!(clock.is_running());
    }

    #[test]
    fn test_first_pulse_after_one_period() {
        let t0 = Instant::now();
        let mut clock = ClockScheduler::new(0.0, 24);
        assert!(!clock.poll(t0));

        clock.retune(120.0, t0).unwrap();
        let period = clock.period().unwrap();
        assert!(!clock.poll(t0));
        assert!(clock.poll(t0 + period));
        assert!(!clock.poll(t0 + period));
        assert_eq!(clock.next_deadline(), Some(t0 + period * 2));
    }

    #[test]
    fn test_deadlines_do_not_drift() {
        let t0 = Instant::now();
        let mut clock = ClockScheduler::new(0.0, 24);
        clock.retune(128.0, t0).unwrap();
        let period = clock.period().unwrap();

        // Poll slightly late every time; deadlines stay on the grid
        for n in 1..=100u32 {
            assert!(clock.poll(t0 + period * n + Duration::from_micros(300)));
        }
        assert_eq!(clock.next_deadline(), Some(t0 + period * 101));
    }

    #[test]
    fn test_retune_preserves_phase_of_last_pulse() {
        let t0 = Instant::now();
        let mut clock = ClockScheduler::new(0.0, 24);
        clock.retune(120.0, t0).unwrap();
        let old = clock.period().unwrap();
        assert!(clock.poll(t0 + old));

        clock.retune(100.0, t0 + old + old / 2).unwrap();
        let new = clock.period().unwrap();
        assert_eq!(clock.next_deadline(), Some(t0 + old + new));
    }

    #[test]
    fn test_retune_to_shorter_period_fires_immediately_once() {
        let t0 = Instant::now();
        let mut clock = ClockScheduler::new(0.0, 24);
        clock.retune(60.0, t0).unwrap();
        let now = t0 + Duration::from_millis(30);

        clock.retune(180.0, now).unwrap();
        assert_eq!(clock.next_deadline(), Some(now));
        assert!(clock.poll(now));
        assert!(!clock.poll(now));
    }

    #[test]
    fn test_identical_retune_is_noop() {
        let t0 = Instant::now();
        let mut clock = ClockScheduler::new(0.0, 24);
        clock.retune(120.0, t0).unwrap();
        let period = clock.period().unwrap();
        assert!(clock.poll(t0 + period));

        clock.retune(120.0, t0 + period + period / 2).unwrap();
        assert_eq!(clock.next_deadline(), Some(t0 + period * 2));
        assert_eq!(clock.retunes(), 1);
    }

    #[test]
    fn test_late_poll_does_not_burst() {
        let t0 = Instant::now();
        let mut clock = ClockScheduler::new(0.0, 24);
        clock.retune(120.0, t0).unwrap();
        let period = clock.period().unwrap();

        let late = t0 + period * 10;
        assert!(clock.poll(late));
        assert!(!clock.poll(late));
        assert_eq!(clock.next_deadline(), Some(late + period));
    }

    #[test]
    fn test_stop_is_idempotent_and_retune_while_stopped_does_not_arm() {
        let t0 = Instant::now();
        let mut clock = ClockScheduler::new(0.0, 24);
        clock.retune(120.0, t0).unwrap();
        clock.stop();
        clock.stop();
        assert!(!clock.is_running());

        clock.retune(140.0, t0).unwrap();
        assert!(!clock.is_running());
        assert_eq!(clock.armed_bpm(), Some(140.0));

        let t1 = t0 + Duration::from_secs(1);
        clock.start(t1);
        assert!(clock.is_running());
        assert_eq!(clock.next_deadline(), Some(t1 + clock.period().unwrap()));
    }

    #[test]
    fn test_start_without_stop_keeps_cadence() {
        let t0 = Instant::now();
        let mut clock = ClockScheduler::new(0.0, 24);
        clock.retune(120.0, t0).unwrap();
        let deadline = clock.next_deadline();
        clock.start(t0 + Duration::from_millis(5));
        assert_eq!(clock.next_deadline(), deadline);
    }
}
