// config.rs

use crate::cli::Args;
use crate::clock::DEFAULT_RESOLUTION;
use config::{Config, Environment, File};
use log::LevelFilter;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "DJLINK2MIDI";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Startup settings. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// MIDI output device, matched as a substring of the port name
    pub midi: Option<String>,
    /// Pulses per quarter note
    pub resolution: u32,
    /// BPM correction in percent
    pub correction: f64,
    /// Status report source, `-` for stdin
    pub feed: String,
    pub display: bool,
    /// Forget devices silent for this long. Unset keeps them forever.
    pub device_timeout_ms: Option<u64>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            midi: None,
            resolution: DEFAULT_RESOLUTION,
            correction: 0.0,
            feed: "-".to_string(),
            display: false,
            device_timeout_ms: None,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Layers defaults, the optional config file, `DJLINK2MIDI_*` environment
    /// variables and command line flags, in increasing priority.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("resolution", i64::from(defaults.resolution))?
            .set_default("correction", defaults.correction)?
            .set_default("feed", defaults.feed)?
            .set_default("display", defaults.display)?
            .set_default("log_level", defaults.log_level)?;

        if let Some(path) = &args.config {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        let device_timeout_ms = args
            .device_timeout_ms
            .map(i64::try_from)
            .transpose()
            .map_err(|_| ConfigError::Invalid {
                key: "device_timeout_ms",
                reason: "too large".to_string(),
            })?;

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("midi", args.midi.clone())?
            .set_override_option("resolution", args.resolution.map(i64::from))?
            .set_override_option("correction", args.correction)?
            .set_override_option("feed", args.feed.clone())?
            .set_override_option("display", args.display.then_some(true))?
            .set_override_option("device_timeout_ms", device_timeout_ms)?
            .set_override_option("log_level", args.log_level.clone())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        log::debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution == 0 {
            return Err(ConfigError::Invalid {
                key: "resolution",
                reason: "must be a positive number of pulses per quarter note".to_string(),
            });
        }
        if !self.correction.is_finite() || self.correction <= -100.0 {
            return Err(ConfigError::Invalid {
                key: "correction",
                reason: format!("{}% leaves no positive tempo", self.correction),
            });
        }
        if self.device_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                key: "device_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.log_level_filter()?;
        Ok(())
    }

    pub fn log_level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level).map_err(|_| ConfigError::Invalid {
            key: "log_level",
            reason: format!("unknown level '{}'", self.log_level),
        })
    }

    pub fn device_timeout(&self) -> Option<Duration> {
        self.device_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "djlink2midi-{}-{}.toml",
            name,
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load(&Args::parse_from(["djlink2midi"])).unwrap();
        assert_eq!(settings.resolution, 24);
        assert_eq!(settings.correction, 0.0);
        assert_eq!(settings.feed, "-");
        assert_eq!(settings.midi, None);
        assert_eq!(settings.device_timeout(), None);
        assert_eq!(settings.log_level_filter().unwrap(), LevelFilter::Info);
    }

    #[test]
    fn test_cli_flags_override_defaults() {
        let args = Args::parse_from([
            "djlink2midi",
            "-m",
            "Synth",
            "-r",
            "48",
            "-c",
            "-1.5",
            "--device-timeout-ms",
            "5000",
        ]);
        let settings = Settings::load(&args).unwrap();
        assert_eq!(settings.midi.as_deref(), Some("Synth"));
        assert_eq!(settings.resolution, 48);
        assert_eq!(settings.correction, -1.5);
        assert_eq!(settings.device_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_file_layer_below_cli() {
        let path = write_config(
            "layering",
            "resolution = 96\ncorrection = 2.0\nmidi = \"From File\"\n",
        );
        let args = Args::parse_from([
            "djlink2midi",
            "--config",
            path.to_str().unwrap(),
            "--resolution",
            "12",
        ]);
        let settings = Settings::load(&args).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.resolution, 12);
        assert_eq!(settings.correction, 2.0);
        assert_eq!(settings.midi.as_deref(), Some("From File"));
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let args = Args::parse_from(["djlink2midi", "--resolution", "0"]);
        assert!(matches!(
            Settings::load(&args),
            Err(ConfigError::Invalid {
                key: "resolution",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let settings = Settings {
            correction: -100.0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            log_level: "loud".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_oversized_device_timeout_is_invalid() {
        let too_large = (u64::MAX).to_string();
        let args = Args::parse_from(["djlink2midi", "--device-timeout-ms", too_large.as_str()]);
        assert!(matches!(
            Settings::load(&args),
            Err(ConfigError::Invalid {
                key: "device_timeout_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = Args::parse_from(["djlink2midi", "--config", "/nonexistent/djlink2midi.toml"]);
        assert!(matches!(Settings::load(&args), Err(ConfigError::Load(_))));
    }
}
