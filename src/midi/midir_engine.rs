use crate::midi::{MidiEngine, MidiError, MidiMessage, Result};
use log::{debug, info};
use midir::{MidiOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "djlink2midi-out";

pub struct MidirEngine {
    port_name: String,
    output: MidiOutputConnection,
}

impl MidirEngine {
    /// Connects to the first output port whose name contains `device_name`.
    pub fn new(device_name: &str) -> Result<Self> {
        let midi_out =
            MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        let out_ports = midi_out.ports();
        let available: Vec<String> = out_ports
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect();
        debug!("Available MIDI output ports: {:?}", available);

        let out_port = out_ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .unwrap_or_default()
                    .contains(device_name)
            })
            .ok_or_else(|| MidiError::DeviceNotFound {
                name: device_name.to_string(),
                available: available.clone(),
            })?;

        let port_name = midi_out
            .port_name(out_port)
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        info!("Connecting to MIDI output port: {}", port_name);
        let output = midi_out
            .connect(out_port, "djlink2midi-clock")
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        Ok(MidirEngine { port_name, output })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Lists the names of all MIDI output ports on this system.
    pub fn list_output_ports() -> Result<Vec<String>> {
        let midi_out = MidiOutput::new("djlink2midi-port-lister")
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect())
    }
}

impl MidiEngine for MidirEngine {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        self.output
            .send(&msg.to_bytes())
            .map_err(|e| MidiError::SendError(e.to_string()))
    }
}
