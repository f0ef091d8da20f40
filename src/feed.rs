//! Status report feed
//!
//! Reads newline-delimited JSON status reports (as produced by a DJ network
//! bridge) and forwards them to the engine loop.

use crate::event_loop::EngineMessage;
use crate::status::StatusReport;
use crossbeam::channel::Sender;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("malformed status report on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("engine stopped accepting status reports")]
    Disconnected,

    #[error("cannot open status feed '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Parses one feed line. Blank lines yield `None`.
pub fn parse_report(line: &str) -> Result<Option<StatusReport>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Forwards every report in `reader` to `tx` until end of input.
/// Malformed lines are logged and skipped. Returns the number of reports sent.
pub fn read_reports<R: BufRead>(
    reader: R,
    tx: &Sender<EngineMessage>,
) -> Result<usize, FeedError> {
    let mut sent = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_report(&line) {
            Ok(Some(report)) => {
                debug!("Status report: {:?}", report);
                tx.send(EngineMessage::Status(report))
                    .map_err(|_| FeedError::Disconnected)?;
                sent += 1;
            }
            Ok(None) => {}
            Err(source) => {
                let err = FeedError::Malformed {
                    line: index + 1,
                    source,
                };
                warn!("{}", err);
            }
        }
    }
    Ok(sent)
}

/// Opens the feed source; `-` means standard input.
pub fn open_feed(path: &str) -> Result<Box<dyn BufRead + Send>, FeedError> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).map_err(|source| FeedError::Open {
        path: path.to_string(),
        source,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

/// Runs the feed on its own thread. The sender is dropped when input ends,
/// which lets the engine loop finish.
pub fn spawn_feed<R>(reader: R, tx: Sender<EngineMessage>) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        info!("Waiting for players to report tempo...");
        match read_reports(reader, &tx) {
            Ok(count) => info!("Status feed ended after {} reports", count),
            Err(e) => warn!("Status feed stopped: {}", e),
        }
    })
}
