//! # Mill Motion Core
//!
//! A deterministic five-axis (X, Y, Z, A, B) motion engine for a small CNC
//! mill, usable on both host and MCU (`no_std`-friendly).
//!
//! Provides the core motion primitives:
//! - Coordinate algebra in user units and in motor steps
//! - A Bresenham-style DDA segment engine with feedrate ease-in/out and
//!   endstop gating
//! - A four-slot motion ring buffer with single-producer/single-consumer
//!   discipline between the foreground and the step interrupt
//! - The machine model: units, absolute/incremental mode, work coordinate
//!   systems, homing, canned-cycle retract state
//! - Step-timer reload math and the interrupt trampoline

#![cfg_attr(not(feature = "std"), no_std)]

pub mod board;
pub mod config;
pub mod endstop;
pub mod error;
pub mod gpio;
pub mod isr;
pub mod machine;
mod math;
pub mod segment;
pub mod timer;
pub mod vector;

#[cfg(test)]
mod test_support;

// Re-export core types for easier access
pub use board::{Board, EndstopSide, NoopPanel, OperatorPanel};
pub use endstop::EndstopFlags;
pub use error::MotionError;
pub use machine::MachineModel;
pub use segment::Segment;
pub use vector::{from_steps, to_steps, Axis, FloatPoint, StepPoint};
