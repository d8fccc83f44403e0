//! Simulated pins, switches and step timer.
//!
//! The board models the one piece of physics the firmware cares about: a
//! carriage whose true position only changes when a step pulse fires, with
//! reference switches at the low end of X and Y travel and the high end of
//! Z. The step timer free-runs — every poll delivers one tick and advances
//! virtual time by the armed delay — which makes whole-program runs exactly
//! reproducible.

use mill_motion::config::{
    DEFAULT_TICK_US, MACHINE_MAX_X_STEPS, MACHINE_MAX_Y_STEPS, MACHINE_MAX_Z_STEPS,
    X_STEPS_PER_MM, Y_STEPS_PER_MM, Z_STEPS_PER_MM,
};
use mill_motion::{Axis, Board, EndstopSide};
use serde::{Deserialize, Serialize};

/// One recorded step pulse, for trace dumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepPulse {
    pub t_us: u64,
    pub axis: Axis,
    pub forward: bool,
}

/// The simulated machine electronics.
pub struct SimBoard {
    /// Step pulses per axis since power-up.
    pub steps: [u64; 5],
    /// Physical carriage position in steps (X, Y, Z).
    pub true_steps: [i64; 3],
    pub dirs: [bool; 5],
    pub enabled: [bool; 5],
    /// Force a switch closed regardless of position (fault injection).
    pub jam_min: [bool; 3],
    /// Pretend a switch is missing (it never closes).
    pub break_min: [bool; 3],
    pub break_max: [bool; 3],
    delay_us: u32,
    now_us: u64,
    /// When set, every pulse lands in `pulses`.
    pub record_pulses: bool,
    pub pulses: Vec<StepPulse>,
}

impl SimBoard {
    /// A board with the carriage parked mid-travel.
    pub fn new() -> Self {
        let mut board = Self {
            steps: [0; 5],
            true_steps: [0; 3],
            dirs: [true; 5],
            enabled: [false; 5],
            jam_min: [false; 3],
            break_min: [false; 3],
            break_max: [false; 3],
            delay_us: DEFAULT_TICK_US,
            now_us: 0,
            record_pulses: false,
            pulses: Vec::new(),
        };
        board.place_mm(
            90.0, // mid X travel
            72.0, 40.0,
        );
        board
    }

    /// Park the carriage at a physical position, in millimeters.
    pub fn place_mm(&mut self, x: f32, y: f32, z: f32) {
        self.true_steps = [
            (x * X_STEPS_PER_MM) as i64,
            (y * Y_STEPS_PER_MM) as i64,
            (z * Z_STEPS_PER_MM) as i64,
        ];
    }

    /// Physical position in millimeters.
    pub fn position_mm(&self) -> [f32; 3] {
        [
            self.true_steps[0] as f32 / X_STEPS_PER_MM,
            self.true_steps[1] as f32 / Y_STEPS_PER_MM,
            self.true_steps[2] as f32 / Z_STEPS_PER_MM,
        ]
    }

    pub fn now_us(&self) -> u64 {
        self.now_us
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Board for SimBoard {
    fn step(&mut self, axis: Axis) {
        let i = axis.index();
        self.steps[i] += 1;
        if i < 3 {
            self.true_steps[i] += if self.dirs[i] { 1 } else { -1 };
        }
        if self.record_pulses {
            self.pulses.push(StepPulse {
                t_us: self.now_us,
                axis,
                forward: self.dirs[i],
            });
        }
    }

    fn set_direction(&mut self, axis: Axis, forward: bool) {
        self.dirs[axis.index()] = forward;
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
            EndstopSide::Min => {
                self.jam_min[i] || (!self.break_min[i] && self.true_steps[i] <= 0)
            }
            EndstopSide::Max => !self.break_max[i] && self.true_steps[i] >= max_steps[i] as i64,
        }
    }

    fn arm_timer(&mut self, delay_us: u32) {
        self.delay_us = delay_us;
    }

    fn timer_elapsed(&mut self) -> bool {
        // Free-running: one tick per poll, clocked by the armed delay.
        self.now_us += u64::from(self.delay_us);
        true
    }

    fn now_ms(&self) -> u32 {
        (self.now_us / 1000) as u32
    }
}
