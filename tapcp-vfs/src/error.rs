use std::{error::Error, fmt::Display};

/// Reasons an open request is rejected. A rejected open performs no
/// hardware access; the engine answers the client with a protocol error.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum OpenError {
    /// No such top-level command.
    UnknownPath(String),
    /// Device name not present in the catalog.
    UnknownDevice(String),
    /// PUT to a read-only resource.
    ReadOnly(String),
    /// `/fpga` and `/cpu` require an offset.
    MissingOffset,
    /// The requested range contains nothing to read.
    EmptyRange,
    /// The requested range extends past the end of the resource.
    OutOfBounds { offset: u32, length: u32, size: u32 },
    /// `/temp` on a platform without a temperature sensor.
    NoTempSensor,
    /// The device catalog blob is malformed.
    BadCatalog,
}

impl OpenError {
    /// Whether the engine should answer "file not found" rather than
    /// "access violation".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OpenError::UnknownPath(_) | OpenError::UnknownDevice(_) | OpenError::NoTempSensor
        )
    }
}

impl Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::UnknownPath(path) => write!(f, "unknown command {}", path),
            OpenError::UnknownDevice(name) => write!(f, "unknown device {}", name),
            OpenError::ReadOnly(name) => write!(f, "{} is read-only", name),
            OpenError::MissingOffset => write!(f, "missing offset"),
            OpenError::EmptyRange => write!(f, "nothing to read in requested range"),
            OpenError::OutOfBounds {
                offset,
                length,
                size,
            } => write!(
                f,
                "range {:#x}+{:#x} exceeds resource size {:#x}",
                offset, length, size
            ),
            OpenError::NoTempSensor => write!(f, "no temperature sensor"),
            OpenError::BadCatalog => write!(f, "device catalog is malformed"),
        }
    }
}

impl Error for OpenError {}

/// Fatal conditions detected while consuming write data. The transfer is
/// aborted; words already stored are not rolled back.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConsumeError {
    /// Another byte or word would exceed the declared write bound.
    BoundExceeded,
    /// An input line overflowed the line buffer before its newline.
    LineOverflow,
}

impl Display for ConsumeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumeError::BoundExceeded => write!(f, "write exceeds resource bounds"),
            ConsumeError::LineOverflow => write!(f, "input line too long"),
        }
    }
}

impl Error for ConsumeError {}
