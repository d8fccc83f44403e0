//! Stdout framing of the host link, and a panel that logs instead of
//! lighting up an LCD.

use std::fmt::Write as _;

use mill_gcode::HostLink;
use mill_motion::{FloatPoint, OperatorPanel};
use tracing::{info, warn};

/// Frames the link protocol onto stdout: `Echo:` lines, error text, then
/// one status frame per processed line — `ok` with optional payloads,
/// `rs <n>` for a resend, `!!` once a fatal fault is latched.
#[derive(Debug, Default)]
pub struct ConsoleLink {
    resend: Option<i32>,
    fatal: Option<String>,
    coords: Option<FloatPoint>,
    capabilities: bool,
}

impl HostLink for ConsoleLink {
    fn echo(&mut self, line: &str) {
        println!("Echo: {}", line);
    }

    fn error(&mut self, message: &str) {
        println!("{}", message);
    }

    fn request_resend(&mut self, line: i32) {
        self.resend = Some(line);
    }

    fn set_fatal(&mut self, message: &str) {
        self.fatal = Some(message.to_string());
    }

    fn report_position(&mut self, position: FloatPoint) {
        self.coords = Some(position);
    }

    fn report_capabilities(&mut self) {
        self.capabilities = true;
    }

    fn finish_line(&mut self) {
        // One-shot: the fault is surfaced on the next frame, then cleared.
        if let Some(message) = self.fatal.take() {
            println!("!! {}", message);
        }

        if let Some(line) = self.resend.take() {
            println!("rs {}", line);
            return;
        }

        let mut frame = String::from("ok");
        if let Some(p) = self.coords.take() {
            let _ = write!(
                frame,
                " C: X:{:.3} Y:{:.3} Z:{:.3} A:{:.3} B:{:.3}",
                p.x, p.y, p.z, p.a, p.b
            );
        }
        if std::mem::take(&mut self.capabilities) {
            let _ = write!(
                frame,
                " PROTOCOL_VERSION:1.0 FIRMWARE_NAME:{} FIRMWARE_VERSION:{} MACHINE_TYPE:Mill AXES:5",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            );
        }
        println!("{}", frame);
    }
}

/// Operator panel that reports through the log.
#[derive(Debug, Default)]
pub struct LoggingPanel;

impl OperatorPanel for LoggingPanel {
    fn startup(&mut self) {
        info!("panel up");
    }

    fn shutdown(&mut self) {
        warn!("machine shut down");
    }

    fn manual_tool_change(&mut self, description: &str) {
        // No buttons on a console build; acknowledge immediately.
        info!(tool = description, "tool change requested");
    }

    fn emergency_stop(&mut self) {
        warn!("emergency stop serviced; queue flushed");
    }
}
