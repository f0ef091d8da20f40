use thiserror::Error;

pub use crate::clock::ClockError;
pub use crate::config::ConfigError;
pub use crate::feed::FeedError;
pub use crate::midi::MidiError;

/// Top level error for the bridge.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
