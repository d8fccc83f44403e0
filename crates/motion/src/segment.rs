//! A single straight-line move, planned and executed as a five-axis DDA.
//!
//! Planning happens in the foreground when the move is enqueued; stepping
//! happens one tick at a time from the timer interrupt. The feedrate rides
//! along as a sixth DDA axis, which is what produces the ease-in/out ramp:
//! the step delay is recomputed from the live feedrate value whenever it
//! changes.

use crate::board::{Board, EndstopSide};
use crate::config::{
    DEFAULT_TICK_US, DISABLE_AFTER_MOVE, EASE_INTERLEAF, SLOW_FEEDRATE, SMALL_DISTANCE2,
};
use crate::endstop::{EndstopFlags, PositionTracker};
use crate::math::{round_to_steps, sqrtf};
use crate::vector::{to_steps, Axis, FloatPoint, StepPoint};

/// One slot of the motion ring buffer.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    target_position: FloatPoint,
    delta_position: FloatPoint,
    /// Euclidean path length used for feedrate timing.
    distance: f32,

    // Step-space bookkeeping, in absolute step coordinates (the local zero
    // offset is folded in so endstop limits compare directly).
    current_steps: StepPoint,
    target_steps: StepPoint,
    delta_steps: StepPoint,
    dda_counter: StepPoint,

    directions: [bool; 5],
    f_direction: bool,
    can_step: [bool; 5],
    f_can_step: bool,

    /// Steps on the dominant axis; the length of the DDA.
    total_steps: i32,
    steps_made: i32,
    /// Feedrate floor in step-rate units.
    slow_steps: i32,
    /// Step index at which deceleration must begin.
    ease_out_trigger: i32,
    t_scale: i32,

    nullmove: bool,
    real_move: bool,
    feed_change: bool,
    live: bool,
}

impl Segment {
    pub(crate) fn new() -> Self {
        Self {
            target_position: FloatPoint {
                f: SLOW_FEEDRATE,
                ..FloatPoint::default()
            },
            delta_position: FloatPoint::default(),
            distance: 0.0,
            current_steps: StepPoint::default(),
            target_steps: StepPoint::default(),
            delta_steps: StepPoint::default(),
            dda_counter: StepPoint::default(),
            directions: [true; 5],
            f_direction: true,
            can_step: [false; 5],
            f_can_step: false,
            total_steps: 0,
            steps_made: 0,
            slow_steps: 0,
            ease_out_trigger: 0,
            t_scale: 1,
            nullmove: false,
            real_move: false,
            feed_change: false,
            live: false,
        }
    }

    /// Is this segment currently being executed by the interrupt?
    pub fn active(&self) -> bool {
        self.live
    }

    pub fn is_nullmove(&self) -> bool {
        self.nullmove
    }

    pub fn total_steps(&self) -> i32 {
        self.total_steps
    }

    pub fn delta_steps(&self) -> StepPoint {
        self.delta_steps
    }

    pub fn current_steps(&self) -> StepPoint {
        self.current_steps
    }

    pub fn target_steps(&self) -> StepPoint {
        self.target_steps
    }

    /// Plan a move from `start` to `target`, both in user units.
    ///
    /// `zero_offset` and `units` come from the machine model; the committed
    /// position update (`local_position = target`) is the caller's job so
    /// that a null move still advances the logical position.
    pub(crate) fn plan(
        &mut self,
        target: FloatPoint,
        start: FloatPoint,
        zero_offset: FloatPoint,
        units: FloatPoint,
    ) {
        self.steps_made = 0;
        self.target_position = target;
        self.nullmove = false;

        self.delta_position = (target - start).abs();

        // Feedrate timing follows distance in (X, Y, Z) space; the auxiliary
        // axes (and finally f itself) only count when nothing else moves.
        let squares = self.delta_position * self.delta_position;
        let mut distance2 = squares.x + squares.y + squares.z;
        if distance2 < SMALL_DISTANCE2 {
            distance2 = squares.a;
        }
        if distance2 < SMALL_DISTANCE2 {
            distance2 = squares.b;
        }
        if distance2 < SMALL_DISTANCE2 {
            distance2 = squares.f;
        }
        self.distance = sqrtf(distance2);

        // Step coordinates are always absolute so virtual endstop limits can
        // be compared against them.
        self.current_steps = to_steps(&units, &(start + zero_offset));
        self.target_steps = to_steps(&units, &(target + zero_offset));
        self.delta_steps = (self.target_steps - self.current_steps).abs();

        // The dominant axis. f is ignored: a feedrate step takes no time.
        let mut total = self.delta_steps.x.max(self.delta_steps.y);
        total = total.max(self.delta_steps.z);
        total = total.max(self.delta_steps.a);
        total = total.max(self.delta_steps.b);
        self.total_steps = total;

        if self.total_steps == 0 {
            self.nullmove = true;
            return;
        }

        self.slow_steps = round_to_steps(SLOW_FEEDRATE * units.f);
        if self.target_steps.f <= self.slow_steps {
            // At or below the floor: start at the commanded rate and never
            // decelerate.
            self.current_steps.f = self.target_steps.f;
            self.ease_out_trigger = self.total_steps;
            self.delta_steps.f = self.total_steps / EASE_INTERLEAF;
        } else {
            self.current_steps.f = self.slow_steps;
            self.delta_steps.f = (self.target_steps.f - self.current_steps.f).abs() * EASE_INTERLEAF;
            self.ease_out_trigger = if self.total_steps < self.delta_steps.f {
                // Short move: spend at least half of it ramping back down.
                self.total_steps / 2
            } else {
                self.total_steps - self.delta_steps.f
            };
            self.delta_steps.f = self.total_steps / EASE_INTERLEAF;
        }
        self.t_scale = 1;

        self.directions = [
            target.x >= start.x,
            target.y >= start.y,
            target.z >= start.z,
            target.a >= start.a,
            target.b >= start.b,
        ];
        self.f_direction = target.f >= start.f;

        let seed = -self.total_steps / 2;
        self.dda_counter = StepPoint {
            x: seed,
            y: seed,
            z: seed,
            a: seed,
            b: seed,
            f: seed,
        };
    }

    /// Arm the direction pins and the timer; called by the consumer when the
    /// segment reaches the tail of the queue.
    pub(crate) fn dda_start<B: Board>(&mut self, board: &mut B) {
        if self.nullmove {
            return;
        }
        for axis in Axis::ALL {
            board.set_direction(axis, self.directions[axis.index()]);
        }
        self.enable_steppers(board);
        board.arm_timer(DEFAULT_TICK_US);
        self.live = true;
        // Force a timer reload on the first dda_step call.
        self.feed_change = true;
    }

    /// Advance one tick of the DDA. Called from the timer interrupt, so this
    /// has to stay lean.
    ///
    /// The loop repeats while only the feedrate axis made progress: pure-f
    /// updates collapse into a single tick instead of wasting timer reloads.
    pub(crate) fn dda_step<B: Board>(&mut self, board: &mut B, tracker: &mut PositionTracker) {
        if !self.live {
            return;
        }

        loop {
            for axis in Axis::LINEAR {
                self.can_step[axis.index()] = self.linear_can_step(board, tracker, axis);
            }
            self.can_step[Axis::A.index()] = self.target_steps.a != self.current_steps.a;
            self.can_step[Axis::B.index()] = self.target_steps.b != self.current_steps.b;
            self.f_can_step = if self.steps_made > self.ease_out_trigger {
                self.current_steps.f != self.slow_steps
            } else {
                self.current_steps.f != self.target_steps.f
            };

            self.real_move = false;
            for axis in Axis::ALL {
                let i = axis.index();
                if !self.can_step[i] {
                    continue;
                }
                *self.dda_counter.axis_mut(axis) += self.delta_steps.axis(axis);
                if self.dda_counter.axis(axis) > 0 {
                    board.step(axis);
                    self.real_move = true;
                    *self.dda_counter.axis_mut(axis) -= self.total_steps;
                    let current = self.current_steps.axis_mut(axis);
                    if self.directions[i] {
                        *current += 1;
                    } else {
                        *current -= 1;
                    }
                }
            }

            if self.steps_made > self.ease_out_trigger {
                // Decelerating toward the floor.
                self.dda_counter.f += self.delta_steps.f;
                if self.dda_counter.f > 0 {
                    self.dda_counter.f -= self.total_steps;
                    if self.current_steps.f > self.slow_steps {
                        self.current_steps.f -= 1;
                    }
                    self.feed_change = true;
                }
            } else if self.current_steps.f < self.target_steps.f {
                // Accelerating toward the commanded rate.
                self.dda_counter.f += self.delta_steps.f;
                if self.dda_counter.f > 0 {
                    self.dda_counter.f -= self.total_steps;
                    self.current_steps.f += 1;
                    self.feed_change = true;
                }
            }

            self.steps_made += 1;

            // Reload the timer only when something physical happened this
            // tick; the feedrate alone does not warrant one.
            if self.real_move && self.feed_change {
                let step_rate = (self.t_scale * self.current_steps.f) as f32;
                board.arm_timer(self.feedrate_delay(step_rate));
            }
            self.feed_change = false;

            if self.real_move || !self.f_can_step {
                break;
            }
        }

        self.live = self.f_can_step || self.can_step.iter().any(|&c| c);

        // Wrap up at the end of a line.
        if !self.live {
            self.disable_steppers(board);
            board.arm_timer(DEFAULT_TICK_US);
        }
    }

    /// Stop all activity on this slot. Used by queue cancellation.
    pub(crate) fn shutdown<B: Board>(&mut self, board: &mut B) {
        self.live = false;
        self.nullmove = false;
        self.target_steps = self.current_steps;
        self.disable_steppers(board);
    }

    /// Endstop- and target-gated step predicate for X, Y and Z.
    fn linear_can_step<B: Board>(
        &self,
        board: &mut B,
        tracker: &mut PositionTracker,
        axis: Axis,
    ) -> bool {
        let dir = self.directions[axis.index()];
        let current = self.current_steps.axis(axis);
        let target = self.target_steps.axis(axis);

        // Stop us if we're at a switch and still heading into it.
        let min_engaged = board.endstop_hit(axis, EndstopSide::Min);
        let mut can = tracker.check_endstops(EndstopFlags::low(axis), min_engaged, current, dir);
        if can {
            let max_engaged = board.endstop_hit(axis, EndstopSide::Max);
            can = tracker.check_endstops(EndstopFlags::high(axis), max_engaged, current, dir);
        }

        // Stop us if we're on target.
        can && current != target
    }

    /// Microseconds between dominant-axis steps at the given step rate.
    fn feedrate_delay(&self, feedrate: f32) -> u32 {
        // feedrate is units/min and distance is in units:
        // distance * 60e6 / feedrate is the move duration in microseconds;
        // divided by total_steps it is the per-step delay.
        round_to_steps((self.distance * 60_000_000.0) / (feedrate * self.total_steps as f32)) as u32
    }

    fn enable_steppers<B: Board>(&self, board: &mut B) {
        for axis in Axis::ALL {
            if self.delta_steps.axis(axis) != 0 {
                board.enable_axis(axis);
            }
        }
    }

    fn disable_steppers<B: Board>(&self, board: &mut B) {
        for axis in Axis::ALL {
            if DISABLE_AFTER_MOVE[axis.index()] {
                board.disable_axis(axis);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn dda_counter(&self) -> StepPoint {
        self.dda_counter
    }

    #[cfg(test)]
    pub(crate) fn ease_out_trigger(&self) -> i32 {
        self.ease_out_trigger
    }

    #[cfg(test)]
    pub(crate) fn feedrate_steps(&self) -> i32 {
        self.current_steps.f
    }
}
