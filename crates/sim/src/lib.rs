//! # In-Process Machine Simulation
//!
//! A deterministic simulation environment for the mill firmware core,
//! built for CI: no hardware, no wall clock, no threads. [`SimBoard`]
//! stands in for the pins and the step timer; [`MillHarness`] wires a
//! machine model and a G-code interpreter to it, captures every host-link
//! frame, and can dump a JSON trace of a run for offline analysis.

pub mod board;
pub mod harness;

pub use board::SimBoard;
pub use harness::{CaptureLink, LinkEvent, MillHarness, ScriptedPanel, TraceEntry};
