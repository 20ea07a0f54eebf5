#![deny(clippy::unwrap_used)]

mod aggregate;
mod config;
mod device;
mod exec;
mod free;
mod lock;
mod manager;
mod partition;
mod table;
mod udev;
mod units;

pub use aggregate::*;
pub use config::*;
pub use device::*;
pub use exec::*;
pub use free::*;
pub use lock::*;
pub use manager::*;
pub use partition::*;
pub use table::*;
pub use udev::*;
pub use units::*;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to launch `{command}`")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Exit {
        command: String,
        status: String,
        stderr: String,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{what} not found on {device}")]
    NotFound { device: String, what: String },
    #[error("{0} has no partition table and table initialization was not requested")]
    Uninitialized(String),
    #[error("a partition named {name:?} already exists on {device} (№{number})")]
    DuplicateName {
        device: String,
        name: String,
        number: String,
    },
    #[error("invalid partition name {0:?}")]
    InvalidName(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: expected at least {expected} fields, found {found}: {text:?}")]
    ShortRow {
        line: usize,
        expected: usize,
        found: usize,
        text: String,
    },
    #[error("invalid size {0:?}")]
    InvalidSize(String),
    #[error("unknown unit {unit:?} in {text:?}")]
    UnknownUnit { text: String, unit: String },
    #[error("invalid boundary {0:?}")]
    InvalidBoundary(String),
    #[error("malformed device listing")]
    Json(#[from] serde_json::Error),
}
