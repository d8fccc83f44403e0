//! The host-link surface the interpreter talks through.
//!
//! The link owns the wire format; the interpreter only states intent. A
//! processed line always ends with [`HostLink::finish_line`], which closes
//! the status frame — "ok", a resend request, or the latched fatal flag,
//! whatever the implementation frames it as.

use bitflags::bitflags;
use mill_motion::FloatPoint;

bitflags! {
    /// Which classes of output the interpreter emits (set via M111).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugMask: u8 {
        const ECHO = 1 << 0;
        const INFO = 1 << 1;
        const ERRORS = 1 << 2;
    }
}

impl Default for DebugMask {
    fn default() -> Self {
        DebugMask::ECHO | DebugMask::INFO | DebugMask::ERRORS
    }
}

/// Byte-stream-out half of the serial host protocol.
pub trait HostLink {
    /// Echo of a received line (debug echo enabled).
    fn echo(&mut self, line: &str);

    /// Non-fatal error text for the current frame.
    fn error(&mut self, message: &str);

    /// Ask the host to retransmit starting at `line`.
    fn request_resend(&mut self, line: i32);

    /// Latch the one-shot fatal flag, surfaced in the next status frame.
    fn set_fatal(&mut self, message: &str);

    /// M114 coordinate report.
    fn report_position(&mut self, position: FloatPoint);

    /// M115 firmware capability report.
    fn report_capabilities(&mut self);

    /// Close the status frame for the line just processed.
    fn finish_line(&mut self);
}
