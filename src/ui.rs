// ui.rs

use crate::status::DeviceId;
use crate::transport::TransportState;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// What the status line shows.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayStatus {
    pub bpm: Option<f64>,
    pub transport: TransportState,
    pub master: Option<DeviceId>,
    pub devices: usize,
    pub pulses: u64,
}

pub fn format_status(status: &DisplayStatus) -> String {
    let bpm = status
        .bpm
        .map(|bpm| format!("{:.2}", bpm))
        .unwrap_or_else(|| "--".to_string());
    let master = status
        .master
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());

    format!(
        "BPM: {}, Transport: {:?}, Master: {}, Devices: {}, Pulses: {}",
        bpm, status.transport, master, status.devices, status.pulses
    )
}

fn create_transport_spinner(target: ProgressDrawTarget) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, target);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix("Clock");
    pb
}

/// Live status line on stderr, refreshed by the engine loop.
pub struct StatusDisplay {
    transport_pb: ProgressBar,
}

impl Default for StatusDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDisplay {
    pub fn new() -> Self {
        StatusDisplay {
            transport_pb: create_transport_spinner(ProgressDrawTarget::stderr()),
        }
    }

    /// A display that renders nowhere.
    pub fn hidden() -> Self {
        StatusDisplay {
            transport_pb: create_transport_spinner(ProgressDrawTarget::hidden()),
        }
    }

    pub fn update(&self, status: &DisplayStatus) {
        self.transport_pb.set_message(format_status(status));
        self.transport_pb.tick();
    }

    pub fn message(&self) -> String {
        self.transport_pb.message()
    }

    pub fn finish(&self) {
        self.transport_pb.finish_and_clear();
    }
}
