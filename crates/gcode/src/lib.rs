//! # Mill G-code Interpreter
//!
//! A streaming G-code front end for the mill motion core:
//!
//! - **[`line`]**: byte-at-a-time line assembly with comment stripping and
//!   overflow protection.
//! - **[`parser`]**: tokenizes one line into letters-with-values and
//!   computes the XOR checksum used by the resend protocol.
//! - **[`exec`]**: dispatches parsed lines onto the machine model — moves,
//!   arcs, homing, units, work coordinate systems, canned drilling cycles,
//!   and the essential M codes.
//! - **[`link`]**: the host-link trait through which echo, errors, resend
//!   requests and reports travel.
//!
//! The interpreter is deliberately synchronous: every blocking operation
//! pumps the machine's cooperative `manage` loop so the panel and the step
//! interrupt stay serviced.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod arc;
mod cycle;
pub mod exec;
pub mod line;
pub mod link;
mod math;
pub mod parser;

#[cfg(test)]
mod test_support;

pub use arc::{plan_arc, ArcPlan};
pub use exec::Interpreter;
pub use line::{LineReader, COMMAND_SIZE};
pub use link::{DebugMask, HostLink};
pub use parser::{checksum, parse_line, ParseError, ParsedLine};
