//! Zone update errors.

use core::fmt;
use std::error;

//------------ ZoneUpdateError -----------------------------------------------

/// A mutating zone operation could not be carried out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ZoneUpdateError {
    /// A zone with this name is already loaded.
    ///
    /// Returned by load only. Callers that want replace semantics should
    /// use reload instead.
    AlreadyLoaded,

    /// No zone with this name is currently loaded.
    NotLoaded,

    /// The manager's run task has terminated and can no longer accept
    /// operations.
    Shutdown,
}

impl fmt::Display for ZoneUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneUpdateError::AlreadyLoaded => {
                write!(f, "Zone already loaded")
            }
            ZoneUpdateError::NotLoaded => write!(f, "Zone not loaded"),
            ZoneUpdateError::Shutdown => {
                write!(f, "Zone manager has shut down")
            }
        }
    }
}

impl error::Error for ZoneUpdateError {}
