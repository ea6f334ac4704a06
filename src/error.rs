//! Errors found throughout this crate

use std::{io, process::ExitStatus};
use thiserror::Error;
use x11rb::errors::ConnectError;

/// Errors that occur from interacting with the display server
#[derive(Debug, Error)]
pub(crate) enum Error {
    /// The output exists but nothing is plugged into it
    #[error("output {0} is not connected")]
    NotConnected(String),

    /// The output is missing from the listing entirely
    #[error("output {0} was not found on this server")]
    NoOutput(String),

    /// The output is connected but not driving a mode
    #[error("output {0} is connected but has no active mode")]
    Inactive(String),

    /// An external command exited unsuccessfully
    #[error("`{command}` failed with {status}")]
    CommandFailed {
        /// The full command line that was run
        command: String,
        /// Exit status of the command
        status:  ExitStatus,
    },

    /// An external command could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Name of the program
        program: String,
        /// Underlying error
        source:  io::Error,
    },

    /// Failure to connect to the server
    #[error("failed to connect to the X11 server: {0}")]
    Connection(#[from] ConnectError),
}
