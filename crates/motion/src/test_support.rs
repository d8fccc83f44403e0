//! A scripted board for unit tests: counts pulses, models the carriage
//! position against the reference switches, and free-runs the step timer.

use crate::board::{Board, EndstopSide};
use crate::config::{
    DEFAULT_TICK_US, MACHINE_MAX_X_STEPS, MACHINE_MAX_Y_STEPS, MACHINE_MAX_Z_STEPS,
    X_STEPS_PER_MM, Y_STEPS_PER_MM, Z_STEPS_PER_MM,
};
use crate::vector::Axis;

pub(crate) struct TestBoard {
    pub steps: [u32; 5],
    pub dirs: [bool; 5],
    pub dir_writes: [u32; 5],
    pub enabled: [bool; 5],
    /// Physical carriage position in steps, X/Y/Z only.
    pub true_steps: [i64; 3],
    /// Simulate a dead reference switch.
    pub broken_min: [bool; 3],
    pub broken_max: [bool; 3],
    /// When true, every `timer_elapsed` poll delivers one tick.
    pub ticking: bool,
    pub delay_us: u32,
    pub now_us: u64,
}

impl TestBoard {
    pub fn new() -> Self {
        Self {
            steps: [0; 5],
            dirs: [true; 5],
            dir_writes: [0; 5],
            enabled: [false; 5],
            true_steps: [0; 3],
            broken_min: [false; 3],
            broken_max: [false; 3],
            ticking: true,
            delay_us: DEFAULT_TICK_US,
            now_us: 0,
        }
    }

    /// Put the carriage at a physical position, in millimeters.
    pub fn place_mm(&mut self, x: f32, y: f32, z: f32) {
        self.true_steps = [
            (x * X_STEPS_PER_MM) as i64,
            (y * Y_STEPS_PER_MM) as i64,
            (z * Z_STEPS_PER_MM) as i64,
        ];
    }
}

impl Board for TestBoard {
    fn step(&mut self, axis: Axis) {
        let i = axis.index();
        self.steps[i] += 1;
        if i < 3 {
            self.true_steps[i] += if self.dirs[i] { 1 } else { -1 };
        }
    }

    fn set_direction(&mut self, axis: Axis, forward: bool) {
        let i = axis.index();
        self.dirs[i] = forward;
        self.dir_writes[i] += 1;
    }

    fn enable_axis(&mut self, axis: Axis) {
        self.enabled[axis.index()] = true;
    }

    fn disable_axis(&mut self, axis: Axis) {
        self.enabled[axis.index()] = false;
    }

    fn endstop_hit(&mut self, axis: Axis, side: EndstopSide) -> bool {
        let i = axis.index();
        let max_steps = [MACHINE_MAX_X_STEPS, MACHINE_MAX_Y_STEPS, MACHINE_MAX_Z_STEPS];
        match side {
            EndstopSide::Min => !self.broken_min[i] && self.true_steps[i] <= 0,
            EndstopSide::Max => !self.broken_max[i] && self.true_steps[i] >= max_steps[i] as i64,
        }
    }

    fn arm_timer(&mut self, delay_us: u32) {
        self.delay_us = delay_us;
    }

    fn timer_elapsed(&mut self) -> bool {
        if self.ticking {
            self.now_us += u64::from(self.delay_us);
            true
        } else {
            false
        }
    }

    fn now_ms(&self) -> u32 {
        (self.now_us / 1000) as u32
    }
}
