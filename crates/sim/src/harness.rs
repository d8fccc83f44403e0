//! Harness utilities: wire a machine model and interpreter to the
//! simulated board, capture host-link traffic, and dump run traces.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use mill_gcode::{Interpreter, LineReader};
use mill_motion::{FloatPoint, MachineModel, OperatorPanel};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::{SimBoard, StepPulse};

/// Everything the interpreter pushed out of the host link, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkEvent {
    Echo(String),
    Error(String),
    Resend(i32),
    Fatal(String),
    Position(FloatPoint),
    Capabilities,
    Ok,
}

/// Recording implementation of the host link.
#[derive(Debug, Default)]
pub struct CaptureLink {
    pub events: Vec<LinkEvent>,
}

impl CaptureLink {
    pub fn resends(&self) -> Vec<i32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                LinkEvent::Resend(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    pub fn has_fatal(&self) -> bool {
        self.events.iter().any(|e| matches!(e, LinkEvent::Fatal(_)))
    }
}

impl mill_gcode::HostLink for CaptureLink {
    fn echo(&mut self, line: &str) {
        self.events.push(LinkEvent::Echo(line.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.events.push(LinkEvent::Error(message.to_string()));
    }

    fn request_resend(&mut self, line: i32) {
        self.events.push(LinkEvent::Resend(line));
    }

    fn set_fatal(&mut self, message: &str) {
        self.events.push(LinkEvent::Fatal(message.to_string()));
    }

    fn report_position(&mut self, position: FloatPoint) {
        self.events.push(LinkEvent::Position(position));
    }

    fn report_capabilities(&mut self) {
        self.events.push(LinkEvent::Capabilities);
    }

    fn finish_line(&mut self) {
        self.events.push(LinkEvent::Ok);
    }
}

/// Panel double that records every callback.
#[derive(Debug, Default)]
pub struct ScriptedPanel {
    pub started: bool,
    pub shut_down: bool,
    pub ui_polls: u64,
    pub tool_prompts: Vec<String>,
    pub emergency_notices: u32,
}

impl OperatorPanel for ScriptedPanel {
    fn startup(&mut self) {
        self.started = true;
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }

    fn handle_ui(&mut self) {
        self.ui_polls += 1;
    }

    fn manual_tool_change(&mut self, description: &str) {
        // Auto-confirm: record the prompt and return immediately.
        self.tool_prompts.push(description.to_string());
    }

    fn emergency_stop(&mut self) {
        self.emergency_notices += 1;
    }
}

/// One record of a dumped run trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TraceEntry {
    Pulse(StepPulse),
    Frame(LinkEvent),
}

/// The full simulated machine: board, machine model, interpreter, link.
pub struct MillHarness {
    pub machine: MachineModel<SimBoard, ScriptedPanel>,
    pub interp: Interpreter,
    pub link: CaptureLink,
    reader: LineReader,
}

impl MillHarness {
    pub fn new() -> Self {
        let mut machine = MachineModel::new(SimBoard::new(), ScriptedPanel::default());
        machine.startup();
        Self {
            machine,
            interp: Interpreter::new(),
            link: CaptureLink::default(),
            reader: LineReader::new(),
        }
    }

    /// Feed raw host bytes; complete lines are executed as they form.
    pub fn feed(&mut self, text: &str) {
        for byte in text.bytes() {
            if let Some(line) = self.reader.feed(byte) {
                debug!(line = %line.as_str(), "executing");
                let Self {
                    machine,
                    interp,
                    link,
                    ..
                } = self;
                interp.process_line(line.as_str(), machine, link);
            }
        }
    }

    /// Feed one G-code line (the newline is implied).
    pub fn feed_line(&mut self, line: &str) {
        self.feed(line);
        self.feed("\n");
    }

    /// Pump the machine until the motion queue drains.
    pub fn run_until_idle(&mut self) {
        self.machine.wait_for_q_empty();
    }

    /// Steps emitted so far on the X, Y, Z, A, B axes.
    pub fn step_counts(&self) -> [u64; 5] {
        self.machine.board().steps
    }

    /// Write the captured pulses and link frames as pretty JSON.
    pub fn dump_trace(&self, path: &Path) -> Result<()> {
        let mut trace: Vec<TraceEntry> = Vec::new();
        trace.extend(
            self.machine
                .board()
                .pulses
                .iter()
                .cloned()
                .map(TraceEntry::Pulse),
        );
        trace.extend(self.link.events.iter().cloned().map(TraceEntry::Frame));

        let json = serde_json::to_string_pretty(&trace)?;
        let mut file = File::create(path)
            .with_context(|| format!("failed to create trace file {}", path.display()))?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

impl Default for MillHarness {
    fn default() -> Self {
        Self::new()
    }
}
