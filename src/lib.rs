pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod feed;
pub mod logging;
pub mod midi;
pub mod status;
pub mod transport;
pub mod ui;

pub use cli::{validate_device, Args};
pub use clock::{ClockError, ClockScheduler};
pub use config::Settings;
pub use error::{Error, Result};
pub use event_loop::{EngineMessage, EventLoop, LoopSummary};
pub use status::{DerivedState, StatusAggregator, StatusReport};
pub use transport::{TempoState, TransportController, TransportState};

/// Names of the MIDI outputs clock can be sent to.
pub fn handle_device_list() -> Vec<String> {
    midi::list_output_ports()
}
