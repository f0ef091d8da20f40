use std::fmt;
use thiserror::Error;

/// Error type for MIDI output operations
#[derive(Error, Debug)]
pub enum MidiError {
    /// Error when sending a MIDI message
    #[error("MIDI send error: {0}")]
    SendError(String),
    /// Error when connecting to a MIDI device
    #[error("MIDI connection error: {0}")]
    ConnectionError(String),
    /// No output port matched the requested name
    #[error("MIDI output device '{name}' not found, available: {available:?}")]
    DeviceNotFound {
        name: String,
        available: Vec<String>,
    },
}

/// MIDI real-time messages emitted by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// MIDI Clock timing pulse
    Clock,
    /// MIDI Start message
    Start,
    /// MIDI Stop message
    Stop,
}

impl MidiMessage {
    pub fn to_bytes(self) -> [u8; 1] {
        match self {
            MidiMessage::Clock => [0xF8],
            MidiMessage::Start => [0xFA],
            MidiMessage::Stop => [0xFC],
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiMessage::Clock => write!(f, "CLOCK"),
            MidiMessage::Start => write!(f, "START"),
            MidiMessage::Stop => write!(f, "STOP"),
        }
    }
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, MidiError>;

/// Sink for outgoing MIDI messages
pub trait MidiEngine: Send {
    fn send(&mut self, msg: MidiMessage) -> Result<()>;
}
