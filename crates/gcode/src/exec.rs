//! Dispatches parsed G-code lines onto the machine model.
//!
//! The interpreter owns the pieces of protocol state that outlive a line:
//! the last G word (repeated when a line carries only parameters), the
//! resend line counter, the debug mask, and the sticky drill-cycle depth.
//! Everything machine-shaped lives in [`MachineModel`].

use core::fmt::Write as _;

use heapless::String;

use mill_motion::config::{FAST_XY_FEEDRATE, SLOW_FEEDRATE};
use mill_motion::{Board, FloatPoint, MachineModel, MotionError, OperatorPanel};

use crate::arc::plan_arc;
use crate::link::{DebugMask, HostLink};
use crate::parser::{self, ParseError, ParsedLine};

/// Streaming G-code executor. One per host connection.
pub struct Interpreter {
    /// Command mode to reuse when a line carries only parameters.
    pub(crate) last_g: Option<i32>,
    pub(crate) last_line_received: i32,
    pub(crate) debug: DebugMask,
    /// Plunge depth reused when a canned cycle omits Z.
    pub(crate) sticky_z: f32,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            last_g: None,
            last_line_received: 0,
            debug: DebugMask::default(),
            sticky_z: 0.0,
        }
    }

    pub fn last_line_received(&self) -> i32 {
        self.last_line_received
    }

    pub fn debug_mask(&self) -> DebugMask {
        self.debug
    }

    /// Process one complete line and close its status frame.
    pub fn process_line<B, U, L>(
        &mut self,
        line: &str,
        machine: &mut MachineModel<B, U>,
        link: &mut L,
    ) where
        B: Board,
        U: OperatorPanel,
        L: HostLink,
    {
        if self.debug.contains(DebugMask::ECHO) && !line.is_empty() {
            link.echo(line);
        }
        self.execute(line, machine, link);
        link.finish_line();
    }

    fn execute<B, U, L>(&mut self, line: &str, machine: &mut MachineModel<B, U>, link: &mut L)
    where
        B: Board,
        U: OperatorPanel,
        L: HostLink,
    {
        // A leading slash deletes the whole block.
        if line.is_empty() || line.starts_with('/') {
            return;
        }

        let mut parsed = match parser::parse_line(line) {
            Ok(parsed) => parsed,
            Err(ParseError::TooManyGWords) => {
                link.set_fatal("Too many G codes per line");
                return;
            }
        };

        if !self.verify_line_protocol(line, &parsed, link) {
            return;
        }

        if machine.is_halted() {
            self.report_error(link, format_args!("Machine halted, reset to continue"));
            return;
        }

        // Deal with emergency stop as priority number one, before any other
        // word on the line takes effect.
        if parsed.m == Some(112) {
            machine.shutdown();
            return;
        }

        // No command but parameters: repeat the previous G code with the
        // new arguments.
        if parsed.g.is_empty() && parsed.m.is_none() && parsed.t.is_none() && parsed.any_seen() {
            if let Some(last) = self.last_g {
                let _ = parsed.g.push(last);
            }
        }

        let gcodes = parsed.g.clone();
        for &code in &gcodes {
            self.last_g = Some(code);
            self.run_gcode(code, &parsed, machine, link);
        }

        // A trailing F against an idle queue updates the sticky feedrate.
        if let Some(feed) = parsed.f {
            if machine.q_empty() {
                machine.local_position.f = feed.min(FAST_XY_FEEDRATE);
            }
        }

        if let Some(mcode) = parsed.m {
            machine.wait_for_q_empty();
            self.run_mcode(mcode, &parsed, machine, link);
        }

        // Tool change: nothing to select here, but the queue must drain
        // before the spindle is touched.
        if parsed.t.is_some() {
            machine.wait_for_q_empty();
        }
    }

    /// Line-number/checksum validation. Returns false when the line must
    /// not execute (a resend has been requested).
    fn verify_line_protocol<L: HostLink>(
        &mut self,
        line: &str,
        parsed: &ParsedLine,
        link: &mut L,
    ) -> bool {
        if parsed.checksum.is_none() && parsed.n.is_none() {
            return true;
        }

        // One without the other means a corrupted line.
        if parsed.checksum.is_some() != parsed.n.is_some() {
            if let Some(cs) = parsed.checksum {
                self.report_error(
                    link,
                    format_args!(
                        "Serial Error: checksum without line number. Checksum: {}, line received: {}",
                        cs, line
                    ),
                );
            } else {
                self.report_error(
                    link,
                    format_args!(
                        "Serial Error: line number without checksum. Linenumber: {}, line received: {}",
                        parsed.n.unwrap_or(0),
                        line
                    ),
                );
            }
            self.request_resend(link);
            return false;
        }

        let local = parser::checksum(line) as i32;
        if parsed.checksum != Some(local) {
            self.report_error(
                link,
                format_args!(
                    "Serial Error: checksum mismatch. Remote ({}) not equal to local ({}), line received: {}",
                    parsed.checksum.unwrap_or(0),
                    local,
                    line
                ),
            );
            self.request_resend(link);
            return false;
        }

        let n = parsed.n.unwrap_or(0);
        // M110 resets the counter instead of checking it.
        if parsed.m != Some(110) && n != self.last_line_received + 1 {
            self.report_error(
                link,
                format_args!(
                    "Serial Error: Linenumber ({}) is not last + 1 ({}), line received: {}",
                    n,
                    self.last_line_received + 1,
                    line
                ),
            );
            self.request_resend(link);
            return false;
        }

        self.last_line_received = n;
        true
    }

    fn run_gcode<B, U, L>(
        &mut self,
        code: i32,
        parsed: &ParsedLine,
        machine: &mut MachineModel<B, U>,
        link: &mut L,
    ) where
        B: Board,
        U: OperatorPanel,
        L: HostLink,
    {
        match code {
            // Buffered commands first.
            0 => {
                let target = fetch_cartesian_parameters(parsed, machine);
                rapid_move(machine, target);
            }
            1 => {
                let target = fetch_cartesian_parameters(parsed, machine);
                machine.q_move(target);
            }
            2 | 3 => {
                let target = fetch_cartesian_parameters(parsed, machine);
                let clockwise = code == 2;
                if parsed.r.is_some() {
                    self.report_error(
                        link,
                        format_args!("Dud G code: G{} with R param not yet implemented", code),
                    );
                    self.request_resend(link);
                } else if parsed.i.is_some() || parsed.j.is_some() {
                    // I/J are relative to the position the arc starts from.
                    let mut base = machine.local_position;
                    base.f = target.f;
                    let center = (
                        base.x + parsed.i.unwrap_or(0.0),
                        base.y + parsed.j.unwrap_or(0.0),
                    );
                    for waypoint in plan_arc(base, center, (target.x, target.y), clockwise) {
                        machine.q_move(waypoint);
                    }
                } else {
                    self.report_error(
                        link,
                        format_args!("Dud G code: G{} without I or J params", code),
                    );
                    self.request_resend(link);
                }
            }
            28 => {
                // Home. With coordinate words only those axes are zeroed,
                // whatever their values; bare G28 homes everything and
                // validates the absolute frame.
                let mut axis_selected = false;
                if parsed.z.is_some() {
                    self.home_axis(machine.zero_z(), link);
                    axis_selected = true;
                }
                if parsed.x.is_some() {
                    self.home_axis(machine.zero_x(), link);
                    axis_selected = true;
                }
                if parsed.y.is_some() {
                    self.home_axis(machine.zero_y(), link);
                    axis_selected = true;
                }
                if !axis_selected {
                    self.home_axis(machine.zero_z(), link);
                    self.home_axis(machine.zero_x(), link);
                    self.home_axis(machine.zero_y(), link);
                    machine.set_absolute_position_valid(true);
                }
                // Most sensible feedrate to leave it in.
                machine.local_position.f = SLOW_FEEDRATE;
            }

            // Non-buffered commands drain the queue before they act.
            4 => {
                machine.wait_for_q_empty();
                let ms = (parsed.p.unwrap_or(0.0) + 0.5) as u32;
                machine.dwell(ms);
            }
            20 => {
                machine.wait_for_q_empty();
                machine.set_units(false);
            }
            21 => {
                machine.wait_for_q_empty();
                machine.set_units(true);
            }
            54..=59 => {
                machine.wait_for_q_empty();
                if machine.switch_to_wcs((code - 54) as usize).is_err() {
                    self.report_error(
                        link,
                        format_args!(
                            "Dud G code: G{} not possible, probably machine not homed",
                            code
                        ),
                    );
                    self.request_resend(link);
                }
            }
            73 | 81 | 82 | 83 | 85 | 89 => {
                machine.wait_for_q_empty();
                let target = fetch_cartesian_parameters(parsed, machine);
                self.drill_cycle(code, target, parsed, machine, link);
            }
            90 => {
                machine.wait_for_q_empty();
                machine.set_abs_mode(true);
            }
            91 => {
                machine.wait_for_q_empty();
                machine.set_abs_mode(false);
            }
            92 => {
                machine.wait_for_q_empty();
                let zero_point = fetch_cartesian_parameters(parsed, machine);
                machine.set_local_zero(zero_point);
            }
            98 => {
                machine.wait_for_q_empty();
                machine.set_retract_mode(true);
            }
            99 => {
                machine.wait_for_q_empty();
                machine.set_retract_mode(false);
            }
            _ => {
                self.report_error(link, format_args!("Dud G code: G{}", code));
                self.request_resend(link);
            }
        }
    }

    fn run_mcode<B, U, L>(
        &mut self,
        code: i32,
        parsed: &ParsedLine,
        machine: &mut MachineModel<B, U>,
        link: &mut L,
    ) where
        B: Board,
        U: OperatorPanel,
        L: HostLink,
    {
        match code {
            0 | 112 => machine.shutdown(),
            1 | 2 => {} // optional stop / program end: nothing to do here
            6 => machine.manual_tool_change(parsed.t),
            110 => {
                // Starting a new transmission: reset the line counter.
                if let Some(n) = parsed.n {
                    self.last_line_received = n;
                }
            }
            111 => {
                if let Some(s) = parsed.s {
                    self.debug = DebugMask::from_bits_truncate(s as u8);
                }
            }
            114 => link.report_position(machine.local_position),
            115 => link.report_capabilities(),
            141 | 142 => {} // chamber temperature / holding pressure: not fitted
            _ => {
                self.report_error(link, format_args!("Dud M code: M{}", code));
                self.request_resend(link);
            }
        }
    }

    fn home_axis<L: HostLink>(&mut self, result: Result<(), MotionError>, link: &mut L) {
        if let Err(fault) = result {
            let mut message: String<96> = String::new();
            let _ = write!(message, "{}", fault);
            link.set_fatal(&message);
        }
    }

    pub(crate) fn report_error<L: HostLink>(&self, link: &mut L, args: core::fmt::Arguments) {
        if self.debug.contains(DebugMask::ERRORS) {
            let mut message: String<192> = String::new();
            // Overlong diagnostics are truncated, never dropped.
            let _ = message.write_fmt(args);
            link.error(&message);
        }
    }

    pub(crate) fn request_resend<L: HostLink>(&self, link: &mut L) {
        link.request_resend(self.last_line_received + 1);
    }
}

/// Build the move target from the line's coordinate words, starting from
/// the committed position. Absolute mode assigns, incremental adds; E is a
/// legacy synonym for A; F is always absolute and clamped to the rapid
/// envelope.
pub(crate) fn fetch_cartesian_parameters<B: Board, U: OperatorPanel>(
    parsed: &ParsedLine,
    machine: &MachineModel<B, U>,
) -> FloatPoint {
    let mut fp = machine.local_position;
    if machine.abs_mode() {
        if let Some(x) = parsed.x {
            fp.x = x;
        }
        if let Some(y) = parsed.y {
            fp.y = y;
        }
        if let Some(z) = parsed.z {
            fp.z = z;
        }
        if parsed.e_seen {
            fp.a = parsed.a.unwrap_or(0.0);
        }
        if parsed.a_seen {
            fp.a = parsed.a.unwrap_or(0.0);
        }
        if let Some(b) = parsed.b {
            fp.b = b;
        }
    } else {
        if let Some(x) = parsed.x {
            fp.x += x;
        }
        if let Some(y) = parsed.y {
            fp.y += y;
        }
        if let Some(z) = parsed.z {
            fp.z += z;
        }
        if parsed.e_seen {
            fp.a += parsed.a.unwrap_or(0.0);
        }
        if parsed.a_seen {
            fp.a += parsed.a.unwrap_or(0.0);
        }
        if let Some(b) = parsed.b {
            fp.b += b;
        }
    }

    if let Some(feed) = parsed.f {
        fp.f = feed.min(FAST_XY_FEEDRATE);
    }
    fp
}

/// Traverse at the rapid feedrate without making it sticky.
pub(crate) fn rapid_move<B: Board, U: OperatorPanel>(
    machine: &mut MachineModel<B, U>,
    mut target: FloatPoint,
) {
    let feed = target.f;
    target.f = FAST_XY_FEEDRATE;
    machine.q_move(target);
    machine.local_position.f = feed;
}
