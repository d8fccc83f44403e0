//! Machine configuration constants.
//!
//! One place for the electromechanical facts of the mill: step resolution,
//! feedrate envelopes, axis travel, and the sizes of the fixed buffers.

/// Driver microstepping factor. The leadscrews give 100 full steps per mm.
pub const MICROSTEPPING: f32 = 8.0;

pub const X_STEPS_PER_MM: f32 = MICROSTEPPING * 100.0;
pub const Y_STEPS_PER_MM: f32 = MICROSTEPPING * 100.0;
pub const Z_STEPS_PER_MM: f32 = MICROSTEPPING * 100.0;
pub const A_STEPS_PER_MM: f32 = MICROSTEPPING * 100.0;
pub const B_STEPS_PER_MM: f32 = MICROSTEPPING * 100.0;

pub const INCHES_TO_MM: f32 = 25.4;

pub const X_STEPS_PER_INCH: f32 = X_STEPS_PER_MM * INCHES_TO_MM;
pub const Y_STEPS_PER_INCH: f32 = Y_STEPS_PER_MM * INCHES_TO_MM;
pub const Z_STEPS_PER_INCH: f32 = Z_STEPS_PER_MM * INCHES_TO_MM;
pub const A_STEPS_PER_INCH: f32 = A_STEPS_PER_MM * INCHES_TO_MM;
pub const B_STEPS_PER_INCH: f32 = B_STEPS_PER_MM * INCHES_TO_MM;

/// Feedrate floor (units/min) from which the ease-in ramp starts and to
/// which the ease-out ramp decelerates.
pub const SLOW_FEEDRATE: f32 = 500.0;
pub const FAST_XY_FEEDRATE: f32 = 1100.0;
pub const FAST_Z_FEEDRATE: f32 = 1100.0;

/// Greater values stretch the ease-in/out ramps over more of the move.
pub const EASE_INTERLEAF: i32 = 2;

/// Distances below this are insignificant (one tenth of the machine
/// resolution).
pub const SMALL_DISTANCE: f32 = 0.01;
pub const SMALL_DISTANCE2: f32 = SMALL_DISTANCE * SMALL_DISTANCE;

/// Number of slots in the motion ring buffer.
pub const QUEUE_DEPTH: usize = 4;

/// Microseconds between timer interrupts when no movement is happening.
pub const DEFAULT_TICK_US: u32 = 1000;

pub const MACHINE_MAX_X_MM: f32 = 180.0;
pub const MACHINE_MAX_Y_MM: f32 = 145.0;
pub const MACHINE_MAX_Z_MM: f32 = 80.0;

pub const MACHINE_MAX_X_STEPS: i32 = (X_STEPS_PER_MM * MACHINE_MAX_X_MM) as i32;
pub const MACHINE_MAX_Y_STEPS: i32 = (Y_STEPS_PER_MM * MACHINE_MAX_Y_MM) as i32;
pub const MACHINE_MAX_Z_STEPS: i32 = (Z_STEPS_PER_MM * MACHINE_MAX_Z_MM) as i32;

/// Per-axis policy: release the driver when a segment finishes. All axes
/// hold torque between moves on this machine.
pub const DISABLE_AFTER_MOVE: [bool; 5] = [false, false, false, false, false];

/// Direction-line wiring inversion per axis (X, Y, Z, A, B).
pub const INVERT_DIR: [bool; 5] = [true, true, false, false, false];

/// The endstop switches on X, Y, Z read low when pressed.
pub const ENDSTOP_INVERTING: [bool; 3] = [true, true, true];

/// Number of work coordinate systems (G54..G59).
pub const WCS_COUNT: usize = 6;

/// Number of tool records in the tool table.
pub const TOOL_COUNT: usize = 6;

/// Maximum length of a tool description.
pub const TOOL_NAME_LEN: usize = 20;
