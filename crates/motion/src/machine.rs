//! The machine model: motion ring buffer, coordinate systems, modes,
//! homing, and the interrupt entry point.
//!
//! There is exactly one `MachineModel` per machine. The foreground owns it
//! and enqueues moves; the timer interrupt consumes them through
//! [`MachineModel::handle_interrupt`]. The head index is only ever advanced
//! by the producer and the tail only by the consumer, so the ring needs no
//! lock; cancellation is the one operation that touches both sides and runs
//! inside a critical section.

use core::fmt::Write as _;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use heapless::String;

use crate::board::{Board, OperatorPanel};
use crate::config::{
    A_STEPS_PER_INCH, A_STEPS_PER_MM, B_STEPS_PER_INCH, B_STEPS_PER_MM, FAST_XY_FEEDRATE,
    FAST_Z_FEEDRATE, MACHINE_MAX_X_MM, MACHINE_MAX_Y_MM, MACHINE_MAX_Z_MM, MACHINE_MAX_Z_STEPS,
    QUEUE_DEPTH, SLOW_FEEDRATE, TOOL_COUNT, TOOL_NAME_LEN, WCS_COUNT, X_STEPS_PER_INCH,
    X_STEPS_PER_MM, Y_STEPS_PER_INCH, Y_STEPS_PER_MM, Z_STEPS_PER_INCH, Z_STEPS_PER_MM,
};
use crate::endstop::{EndstopFlags, PositionTracker};
use crate::error::MotionError;
use crate::isr::TickHandler;
use crate::segment::Segment;
use crate::vector::{from_steps, Axis, FloatPoint, StepPoint};

/// Central machine state and motion queue.
pub struct MachineModel<B, U> {
    board: B,
    panel: U,

    segments: [Segment; QUEUE_DEPTH],
    head: AtomicU8,
    tail: AtomicU8,

    pub(crate) tracker: PositionTracker,

    /// Steps per user unit on each axis; f stays 1.0 in both unit systems.
    units: FloatPoint,
    using_mm: bool,
    abs_mode: bool,
    /// true: canned cycles return to the initial Z; false: to the R plane.
    old_z_retract_mode: bool,
    /// 0 = off, 1 = right of path, -1 = left of path.
    cutter_radius_compensation: i8,
    retract_height: f32,
    /// Chip-break retract distance for the high-speed peck cycle.
    clearance_increment: f32,

    /// The commanded position in user coordinates. Committed at planning
    /// time, not at segment completion.
    pub local_position: FloatPoint,
    local_zero_offset: FloatPoint,

    emergency_stop: AtomicBool,
    halted: bool,

    /// Canned-cycle dwell remembered from the previous invocation.
    pub sticky_p: f32,
    /// Canned-cycle peck depth remembered from the previous invocation.
    pub sticky_q: f32,

    wcs_offsets: [FloatPoint; WCS_COUNT],
    tool_table: [String<TOOL_NAME_LEN>; TOOL_COUNT],
}

impl<B: Board, U: OperatorPanel> MachineModel<B, U> {
    pub fn new(board: B, panel: U) -> Self {
        let mut machine = Self {
            board,
            panel,
            segments: [Segment::new(); QUEUE_DEPTH],
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
            tracker: PositionTracker::default(),
            units: FloatPoint::default(),
            using_mm: true,
            abs_mode: true,
            old_z_retract_mode: true,
            cutter_radius_compensation: 0,
            retract_height: 0.0,
            clearance_increment: 2.5,
            local_position: FloatPoint {
                f: SLOW_FEEDRATE,
                ..FloatPoint::default()
            },
            local_zero_offset: FloatPoint::default(),
            emergency_stop: AtomicBool::new(false),
            halted: false,
            sticky_p: 0.0,
            sticky_q: 0.0,
            wcs_offsets: [FloatPoint::default(); WCS_COUNT],
            tool_table: Default::default(),
        };
        machine.set_units(true);
        machine
    }

    pub fn startup(&mut self) {
        self.emergency_stop.store(false, Ordering::Release);
        self.panel.startup();
    }

    /// Hard stop: flush the queue, release every driver regardless of the
    /// per-axis policy, and latch the halted flag. Only a reset clears it.
    pub fn shutdown(&mut self) {
        self.halted = true;
        self.cancel_and_clear_queue();
        for axis in Axis::ALL {
            self.board.disable_axis(axis);
        }
        self.panel.shutdown();
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Housekeeping pumped from every cooperative wait: emergency stop,
    /// polled timer ticks, and the operator panel.
    pub fn manage(&mut self, with_gui: bool) {
        if self.emergency_stop.swap(false, Ordering::AcqRel) {
            self.cancel_and_clear_queue();
            self.panel.emergency_stop();
        }
        if self.board.timer_elapsed() {
            self.handle_interrupt();
        }
        if with_gui {
            self.panel.handle_ui();
        }
    }

    /// The timer interrupt body: step the active segment, or arm the next
    /// queued one.
    pub fn handle_interrupt(&mut self) {
        let t = self.tail.load(Ordering::Acquire) as usize;
        if self.segments[t].active() {
            let Self {
                segments,
                board,
                tracker,
                ..
            } = self;
            segments[t].dda_step(board, tracker);
        } else {
            self.dq_move();
        }
    }

    // --- The move buffer ---

    pub fn q_empty(&self) -> bool {
        let h = self.head.load(Ordering::Acquire);
        let t = self.tail.load(Ordering::Acquire);
        h == t && !self.segments[t as usize].active()
    }

    pub fn q_full(&self) -> bool {
        let h = self.head.load(Ordering::Acquire) as usize;
        let t = self.tail.load(Ordering::Acquire) as usize;
        (h + 1) % QUEUE_DEPTH == t
    }

    /// Number of planned segments not yet released by the consumer.
    pub fn queued(&self) -> usize {
        let h = self.head.load(Ordering::Acquire) as usize;
        let t = self.tail.load(Ordering::Acquire) as usize;
        (h + QUEUE_DEPTH - t) % QUEUE_DEPTH
    }

    pub fn wait_for_q_empty(&mut self) {
        while !self.q_empty() {
            self.manage(true);
        }
    }

    pub fn wait_for_q_not_full(&mut self) {
        while self.q_full() {
            self.manage(true);
        }
    }

    /// Enqueue a move to `p`. Blocks (pumping `manage`) while the ring is
    /// full. The logical position advances immediately so the next move
    /// plans against the intended finish point.
    pub fn q_move(&mut self, p: FloatPoint) {
        self.wait_for_q_not_full();
        let h = (self.head.load(Ordering::Relaxed) as usize + 1) % QUEUE_DEPTH;
        let start = self.local_position;
        self.segments[h].plan(p, start, self.local_zero_offset, self.units);
        self.local_position = p;
        // The slot must be fully planned before the consumer can see it.
        self.head.store(h as u8, Ordering::Release);
    }

    /// Consumer side: advance the tail past a completed segment and arm the
    /// next one.
    fn dq_move(&mut self) {
        if self.q_empty() {
            return;
        }
        let t = (self.tail.load(Ordering::Relaxed) as usize + 1) % QUEUE_DEPTH;
        let Self {
            segments, board, ..
        } = self;
        segments[t].dda_start(board);
        self.tail.store(t as u8, Ordering::Release);
    }

    /// Discard everything in the ring buffer and stop the active segment.
    pub fn cancel_and_clear_queue(&mut self) {
        critical_section::with(|_| {
            let h = self.head.load(Ordering::Relaxed);
            self.tail.store(h, Ordering::Relaxed);
            let Self {
                segments, board, ..
            } = self;
            for segment in segments.iter_mut() {
                segment.shutdown(board);
            }
        });
    }

    // --- Units, modes, coordinate systems ---

    /// True selects millimeters, false inches. Feedrate conversion stays
    /// 1.0 either way: F is always distance per minute in the current
    /// system.
    pub fn set_units(&mut self, use_mm: bool) {
        self.using_mm = use_mm;
        self.units = if use_mm {
            FloatPoint {
                x: X_STEPS_PER_MM,
                y: Y_STEPS_PER_MM,
                z: Z_STEPS_PER_MM,
                a: A_STEPS_PER_MM,
                b: B_STEPS_PER_MM,
                f: 1.0,
            }
        } else {
            FloatPoint {
                x: X_STEPS_PER_INCH,
                y: Y_STEPS_PER_INCH,
                z: Z_STEPS_PER_INCH,
                a: A_STEPS_PER_INCH,
                b: B_STEPS_PER_INCH,
                f: 1.0,
            }
        };
    }

    pub fn using_mm(&self) -> bool {
        self.using_mm
    }

    pub fn units(&self) -> FloatPoint {
        self.units
    }

    pub fn set_abs_mode(&mut self, absolute: bool) {
        self.abs_mode = absolute;
    }

    pub fn abs_mode(&self) -> bool {
        self.abs_mode
    }

    pub fn set_retract_mode(&mut self, old_z: bool) {
        self.old_z_retract_mode = old_z;
    }

    pub fn retract_mode(&self) -> bool {
        self.old_z_retract_mode
    }

    pub fn set_retract_height(&mut self, height: f32) {
        self.retract_height = height;
    }

    pub fn retract_height(&self) -> f32 {
        self.retract_height
    }

    pub fn cutter_radius_compensation(&self) -> i8 {
        self.cutter_radius_compensation
    }

    pub fn set_cutter_radius_compensation(&mut self, mode: i8) {
        self.cutter_radius_compensation = mode;
    }

    pub fn clearance_increment(&self) -> f32 {
        self.clearance_increment
    }

    /// Move the user-coordinate origin so that the current position reads
    /// as `zero_point`. The absolute step frame is unchanged.
    pub fn set_local_zero(&mut self, zero_point: FloatPoint) {
        self.local_zero_offset = self.local_zero_offset + self.local_position - zero_point;
        self.local_zero_offset.f = 0.0;
        self.local_position = zero_point;
    }

    /// Replace the local zero offset with stored work coordinate system
    /// `number` (0 = G54). Requires a homed machine.
    pub fn switch_to_wcs(&mut self, number: usize) -> Result<(), MotionError> {
        if !self.tracker.absolute_position_valid {
            return Err(MotionError::NotHomed);
        }
        if number >= WCS_COUNT {
            return Err(MotionError::InvalidWcs(number));
        }
        let current_offset = self.local_position + self.local_zero_offset;
        self.local_zero_offset = self.wcs_offsets[number];
        self.local_position = current_offset - self.local_zero_offset;
        Ok(())
    }

    pub fn wcs_offset(&self, number: usize) -> Option<FloatPoint> {
        self.wcs_offsets.get(number).copied()
    }

    pub fn set_wcs_offset(&mut self, number: usize, offset: FloatPoint) -> Result<(), MotionError> {
        if number >= WCS_COUNT {
            return Err(MotionError::InvalidWcs(number));
        }
        self.wcs_offsets[number] = offset;
        Ok(())
    }

    /// Install the persisted work-offset and tool tables at startup.
    pub fn load_tables(
        &mut self,
        wcs_offsets: [FloatPoint; WCS_COUNT],
        tool_table: [String<TOOL_NAME_LEN>; TOOL_COUNT],
    ) {
        self.wcs_offsets = wcs_offsets;
        self.tool_table = tool_table;
    }

    pub fn local_zero_offset(&self) -> FloatPoint {
        self.local_zero_offset
    }

    /// The position actually reached by the steppers, in user coordinates.
    /// This is what the panel displays; it may lag the commanded position
    /// by the depth of the queue.
    pub fn live_position(&self) -> FloatPoint {
        let mut absolute = from_steps(&self.units, &self.tracker.absolute_position);
        absolute.f = self.local_position.f;
        absolute - self.local_zero_offset
    }

    // --- Endstop state ---

    pub fn endstop_hits(&self) -> EndstopFlags {
        self.tracker.endstop_hits
    }

    pub fn is_endstop_hit(&self, flag: EndstopFlags) -> bool {
        self.tracker.is_hit(flag)
    }

    pub fn absolute_position(&self) -> StepPoint {
        self.tracker.absolute_position
    }

    pub fn absolute_position_valid(&self) -> bool {
        self.tracker.absolute_position_valid
    }

    pub fn set_absolute_position_valid(&mut self, valid: bool) {
        self.tracker.absolute_position_valid = valid;
    }

    // --- Homing ---

    /// Single-axis helper moves used by homing and panel jogs.
    pub fn special_move_x(&mut self, x: f32, feed: f32) {
        let mut sp = self.local_position;
        sp.x = x;
        sp.f = feed;
        self.q_move(sp);
    }

    pub fn special_move_y(&mut self, y: f32, feed: f32) {
        let mut sp = self.local_position;
        sp.y = y;
        sp.f = feed;
        self.q_move(sp);
    }

    pub fn special_move_z(&mut self, z: f32, feed: f32) {
        let mut sp = self.local_position;
        sp.z = z;
        sp.f = feed;
        self.q_move(sp);
    }

    /// Home X against its reference switch at the low end of travel.
    pub fn zero_x(&mut self) -> Result<(), MotionError> {
        // 110% of the travel guarantees switch contact from anywhere.
        self.special_move_x(self.local_position.x - MACHINE_MAX_X_MM * 1.1, FAST_XY_FEEDRATE);
        self.local_position.x = 0.0;
        self.special_move_x(self.local_position.x + 1.0, SLOW_FEEDRATE);
        self.special_move_x(self.local_position.x - 10.0, SLOW_FEEDRATE);

        // Wait for movements to finish, then check we hit the stop.
        self.wait_for_q_empty();
        self.local_position.x = 0.0;
        self.local_zero_offset.x = 0.0;
        self.tracker.absolute_position.x = 0;

        if !self.tracker.is_hit(EndstopFlags::X_LOW) {
            return Err(MotionError::HomingFault(Axis::X));
        }
        Ok(())
    }

    /// Home Y against its reference switch at the low end of travel.
    pub fn zero_y(&mut self) -> Result<(), MotionError> {
        self.special_move_y(self.local_position.y - MACHINE_MAX_Y_MM * 1.1, FAST_XY_FEEDRATE);
        self.local_position.y = 0.0;
        self.special_move_y(self.local_position.y + 1.0, SLOW_FEEDRATE);
        self.special_move_y(self.local_position.y - 10.0, SLOW_FEEDRATE);

        self.wait_for_q_empty();
        self.local_position.y = 0.0;
        self.local_zero_offset.y = 0.0;
        self.tracker.absolute_position.y = 0;

        if !self.tracker.is_hit(EndstopFlags::Y_LOW) {
            return Err(MotionError::HomingFault(Axis::Y));
        }
        Ok(())
    }

    /// Home Z against its reference switch at the top of travel.
    pub fn zero_z(&mut self) -> Result<(), MotionError> {
        self.special_move_z(self.local_position.z + MACHINE_MAX_Z_MM * 1.1, FAST_Z_FEEDRATE);
        self.local_position.z = MACHINE_MAX_Z_MM;
        self.special_move_z(self.local_position.z - 1.0, SLOW_FEEDRATE);
        self.special_move_z(self.local_position.z + 2.0, SLOW_FEEDRATE);

        self.wait_for_q_empty();
        self.local_position.z = MACHINE_MAX_Z_MM;
        self.local_zero_offset.z = 0.0;
        self.tracker.absolute_position.z = MACHINE_MAX_Z_STEPS;

        if !self.tracker.is_hit(EndstopFlags::Z_HIGH) {
            return Err(MotionError::HomingFault(Axis::Z));
        }
        Ok(())
    }

    // --- Operator interaction ---

    /// Look up the described tool and hand the prompt to the panel, which
    /// blocks until the operator confirms the change.
    pub fn manual_tool_change(&mut self, tool: Option<i32>) {
        let mut description: String<TOOL_NAME_LEN> = String::new();
        match tool {
            Some(number) => {
                if number > 0 && (number as usize) <= TOOL_COUNT {
                    description = self.tool_table[number as usize - 1].clone();
                }
                if description.is_empty() {
                    let _ = write!(description, "Tool #{}", number);
                }
            }
            None => {
                let _ = description.push_str("Unspecified Tool");
            }
        }
        self.panel.manual_tool_change(&description);
    }

    /// Busy-dwell for `ms` milliseconds, keeping the panel and queue alive.
    pub fn dwell(&mut self, ms: u32) {
        let end = self.board.now_ms().wrapping_add(ms);
        while (end.wrapping_sub(self.board.now_ms()) as i32) > 0 {
            self.manage(true);
        }
    }

    /// May be called from any context on an emergency-stop edge; the next
    /// `manage` pass flushes the queue.
    pub fn trigger_emergency_stop(&self) {
        self.emergency_stop.store(true, Ordering::Release);
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn panel(&self) -> &U {
        &self.panel
    }
}

impl<B, U> TickHandler for MachineModel<B, U>
where
    B: Board + Send,
    U: OperatorPanel + Send,
{
    fn on_tick(&mut self) {
        self.handle_interrupt();
    }
}
