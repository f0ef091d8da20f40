use crate::midi::{MidiEngine, MidiError, MidiMessage, Result};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Records every message it is asked to send.
///
/// Clones share the same log so a test can keep a handle while the engine
/// is moved into the event loop.
#[derive(Clone, Default)]
pub struct MockMidiEngine {
    sent: Arc<Mutex<Vec<(Instant, MidiMessage)>>>,
    fail_sends: bool,
}

impl MockMidiEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<MidiMessage> {
        self.sent
            .lock()
            .map(|sent| sent.iter().map(|(_, msg)| *msg).collect())
            .unwrap_or_default()
    }

    pub fn timed_messages(&self) -> Vec<(Instant, MidiMessage)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, msg: MidiMessage) -> usize {
        self.messages().iter().filter(|m| **m == msg).count()
    }

    /// Messages other than clock pulses, in send order.
    pub fn transport_messages(&self) -> Vec<MidiMessage> {
        self.messages()
            .into_iter()
            .filter(|m| *m != MidiMessage::Clock)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl MidiEngine for MockMidiEngine {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        if self.fail_sends {
            return Err(MidiError::SendError("mock output unavailable".to_string()));
        }
        self.sent
            .lock()
            .map_err(|e| MidiError::SendError(e.to_string()))?
            .push((Instant::now(), msg));
        Ok(())
    }
}

/// Output port names reported under the `test-mock` feature
pub fn mock_output_ports() -> Vec<String> {
    vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()]
}
