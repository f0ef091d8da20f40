use simplelog::*;
use std::fs::{self, File, OpenOptions};
use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

static INIT: Once = Once::new();
static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Directory holding the persistent application log.
pub fn log_dir() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("djlink2midi")
        .join("logs"))
}

fn open_log_file() -> Result<File, Error> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("app.log"))
}

/// Logs to stderr at `level` and, when the log directory is writable,
/// to `~/.local/share/djlink2midi/logs/app.log` at debug level.
pub fn init_logger(level: LevelFilter) -> Result<(), Error> {
    INIT.call_once(|| {
        let config = ConfigBuilder::new()
            .set_time_format_rfc3339()
            .set_target_level(LevelFilter::Error)
            .build();

        let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )];

        let file_error = match open_log_file() {
            Ok(log_file) => {
                loggers.push(WriteLogger::new(LevelFilter::Debug, config, log_file));
                None
            }
            Err(e) => Some(e),
        };

        if CombinedLogger::init(loggers).is_ok() {
            LOGGER_INITIALIZED.store(true, Ordering::SeqCst);
            if let Some(e) = file_error {
                log::warn!("File logging disabled: {}", e);
            }
            log::info!(
                "Session started at {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );
        }
    });

    if LOGGER_INITIALIZED.load(Ordering::SeqCst) {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::Other, "Logger initialization failed"))
    }
}
