//! Error types for the motion core.

use core::fmt;

use crate::vector::Axis;

/// Errors surfaced by machine-model operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionError {
    /// The machine has not been homed; absolute coordinates are unknown.
    NotHomed,
    /// A work coordinate system index outside the stored table.
    InvalidWcs(usize),
    /// A homing pass finished without the axis endstop engaging.
    HomingFault(Axis),
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::NotHomed => write!(f, "machine not homed"),
            MotionError::InvalidWcs(n) => write!(f, "no work coordinate system {}", n),
            MotionError::HomingFault(axis) => {
                write!(f, "{} endstop not hit - hard fault", axis.letter())
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}
