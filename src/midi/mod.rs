//! MIDI output for the clock bridge
//!
//! The main components are:
//! - [`MidiEngine`] trait for sending MIDI real-time messages
//! - [`MidirEngine`] for real MIDI device communication
//! - [`MockMidiEngine`] for testing
//!
mod engine;
pub mod midir_engine;
pub mod mock_engine;

pub use engine::{MidiEngine, MidiError, MidiMessage, Result};

pub use midir_engine::MidirEngine;
pub use mock_engine::MockMidiEngine;

// Set default engine type
pub type DefaultMidiEngine = MidirEngine;

/// Names of the MIDI output ports available to connect to.
#[cfg(not(feature = "test-mock"))]
pub fn list_output_ports() -> Vec<String> {
    match MidirEngine::list_output_ports() {
        Ok(ports) => ports,
        Err(e) => {
            log::error!("Failed to list MIDI output ports: {}", e);
            vec![]
        }
    }
}

#[cfg(feature = "test-mock")]
pub fn list_output_ports() -> Vec<String> {
    mock_engine::mock_output_ports()
}
