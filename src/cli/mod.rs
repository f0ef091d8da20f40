use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Select};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// MIDI output device to send clock to
    #[arg(short, long)]
    pub midi: Option<String>,

    /// MIDI clock resolution in pulses per quarter note
    #[arg(short, long)]
    pub resolution: Option<u32>,

    /// BPM correction in percent
    #[arg(short, long, allow_negative_numbers = true)]
    pub correction: Option<f64>,

    /// List available MIDI output devices
    #[arg(long)]
    pub list_devices: bool,

    /// Settings file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Newline-delimited JSON status reports, "-" for stdin
    #[arg(long)]
    pub feed: Option<String>,

    /// Show a live tempo/transport line on stderr
    #[arg(long)]
    pub display: bool,

    /// Forget devices that have not reported for this many milliseconds
    #[arg(long)]
    pub device_timeout_ms: Option<u64>,

    /// Terminal log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn validate_device(device_name: &str, devices: &[String]) -> Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}

/// Asks the user to pick a MIDI output when attached to a terminal.
pub fn select_device(devices: &[String]) -> Option<String> {
    if devices.is_empty() || !std::io::stderr().is_terminal() {
        return None;
    }

    match Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select MIDI output")
        .items(devices)
        .default(0)
        .interact_opt()
    {
        Ok(choice) => choice.map(|index| devices[index].clone()),
        Err(e) => {
            log::error!("MIDI output selection failed: {}", e);
            None
        }
    }
}

pub fn format_device_list(devices: &[String]) -> String {
    let mut out = String::from("Please specify MIDI interface with -m option from:\n");
    for device in devices {
        out.push_str(&format!("\t'{}'\n", device));
    }
    out
}
