use std::io;

use thiserror::Error;

/// Errors raised while building a client or one of its sinks.
#[derive(Debug, Error)]
pub enum StatsdError {
    #[error("unable to resolve {0}: {1}")]
    Resolve(String, #[source] io::Error),

    #[error("no {family} address found for {host}")]
    NoAddress { host: String, family: &'static str },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Misuse of a [`Timer`](crate::Timer).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer has not started")]
    NotStarted,

    #[error("no data recorded")]
    NoData,

    #[error("already sent data")]
    AlreadySent,
}

/// Error types for parsing metrics from wire lines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    // Error message, column
    #[error("{0} (column {1})")]
    SyntaxError(&'static str, usize),
}

pub type Result<T> = std::result::Result<T, StatsdError>;
