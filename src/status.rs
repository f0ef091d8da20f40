//! Device status tracking
//!
//! Keeps the latest [`StatusReport`] of every device seen on the network and
//! derives the two values the rest of the bridge cares about:
//! - the effective BPM of the current tempo master
//! - whether any tracked player is actively playing

use log::{debug, trace};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

pub type DeviceId = u32;

/// Play-state codes that count as "actively playing".
pub const PLAYING_STATES: [u8; 4] = [3, 4, 7, 9];

/// Player slots a DJ network normally assigns to decks.
pub const KNOWN_PLAYER_SLOTS: RangeInclusive<DeviceId> = 1..=4;

/// A single status report as announced by a device.
///
/// Field names follow the JSON emitted by prolink-connect status bridges.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub device_id: DeviceId,
    pub is_master: bool,
    /// Null while the player has no track loaded.
    #[serde(rename = "trackBPM", default)]
    pub track_bpm: Option<f64>,
    pub slider_pitch: f64,
    pub beat_in_measure: u8,
    pub play_state: u8,
}

impl StatusReport {
    /// Track BPM adjusted by the pitch slider. `None` without a loaded track.
    pub fn effective_bpm(&self) -> Option<f64> {
        self.track_bpm.map(|bpm| bpm * (100.0 + self.slider_pitch) / 100.0)
    }

    pub fn is_playing(&self) -> bool {
        PLAYING_STATES.contains(&self.play_state)
    }
}

/// Tempo and transport as derived from the tracked devices.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedState {
    /// Effective BPM of the latest master report, if any device has claimed master.
    pub bpm: Option<f64>,
    pub is_playing: bool,
    pub master: Option<DeviceId>,
    /// Beat within the measure of the master. Informational only.
    pub beat_in_measure: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MasterTempo {
    device: DeviceId,
    bpm: f64,
    beat_in_measure: u8,
}

#[derive(Debug, Clone)]
struct TrackedDevice {
    report: StatusReport,
    last_seen: Instant,
}

#[derive(Debug, Default)]
pub struct StatusAggregator {
    devices: BTreeMap<DeviceId, TrackedDevice>,
    tempo: Option<MasterTempo>,
    device_timeout: Option<Duration>,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an aggregator that forgets devices silent for longer than `timeout`.
    pub fn with_device_timeout(timeout: Duration) -> Self {
        Self {
            device_timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn ingest(&mut self, report: StatusReport) -> DerivedState {
        self.ingest_at(report, Instant::now())
    }

    /// Records `report` as the latest state of its device and returns the
    /// recomputed derived state.
    pub fn ingest_at(&mut self, report: StatusReport, now: Instant) -> DerivedState {
        if !KNOWN_PLAYER_SLOTS.contains(&report.device_id)
            && !self.devices.contains_key(&report.device_id)
        {
            debug!(
                "Tracking device {} outside the known player slots",
                report.device_id
            );
        }

        if report.is_master {
            self.update_master(&report);
        }

        self.devices.insert(
            report.device_id,
            TrackedDevice {
                report,
                last_seen: now,
            },
        );

        self.derived()
    }

    fn update_master(&mut self, report: &StatusReport) {
        let Some(bpm) = report.effective_bpm() else {
            debug!(
                "Master device {} has no track loaded, holding tempo",
                report.device_id
            );
            return;
        };

        if let Some(previous) = &self.tempo {
            if previous.device != report.device_id {
                debug!(
                    "Tempo master changed from device {} to device {}",
                    previous.device, report.device_id
                );
            }
            if report.beat_in_measure == 1 && previous.beat_in_measure != 1 {
                trace!("Downbeat on master device {}", report.device_id);
            }
        }

        self.tempo = Some(MasterTempo {
            device: report.device_id,
            bpm,
            beat_in_measure: report.beat_in_measure,
        });
    }

    /// Drops devices whose last report is older than the configured timeout.
    /// Returns true if any device was removed.
    pub fn expire_stale(&mut self, now: Instant) -> bool {
        let Some(timeout) = self.device_timeout else {
            return false;
        };

        let before = self.devices.len();
        self.devices.retain(|id, tracked| {
            let alive = now.saturating_duration_since(tracked.last_seen) <= timeout;
            if !alive {
                debug!("Device {} timed out after {:?}", id, timeout);
            }
            alive
        });
        before != self.devices.len()
    }

    /// The tempo of an expired master is held, but the device is no longer
    /// reported as master.
    pub fn derived(&self) -> DerivedState {
        let master = self.tempo.filter(|t| self.devices.contains_key(&t.device));
        DerivedState {
            bpm: self.tempo.map(|t| t.bpm),
            is_playing: self.is_playing(),
            master: master.map(|t| t.device),
            beat_in_measure: master.map(|t| t.beat_in_measure),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.devices.values().any(|d| d.report.is_playing())
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn latest(&self, device: DeviceId) -> Option<&StatusReport> {
        self.devices.get(&device).map(|d| &d.report)
    }
}
