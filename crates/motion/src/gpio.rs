//! `embedded-hal` pin bindings for the [`Board`] trait.
//!
//! A real controller wires step/dir/enable outputs and the six endstop
//! inputs to MCU pins; this adapter maps them onto the interface the motion
//! core drives. The step timer stays behind its own small trait because it
//! is a peripheral, not a pin.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::board::{Board, EndstopSide};
use crate::config::{ENDSTOP_INVERTING, INVERT_DIR};
use crate::vector::Axis;

/// The step-timer peripheral behind a [`GpioBoard`].
pub trait StepTimer {
    /// Reprogram the compare register to fire after `delay_us`.
    fn arm(&mut self, delay_us: u32);

    /// Milliseconds since power-up, wrapping.
    fn now_ms(&self) -> u32;
}

/// A [`Board`] built from `embedded-hal` digital pins.
///
/// Pin arrays are indexed by axis (X, Y, Z, A, B); the endstop arrays cover
/// the three linear axes. Pin errors read as "not pressed" / are dropped —
/// the wiring uses plain GPIOs whose error type is infallible.
pub struct GpioBoard<OUT, IN, T> {
    step: [OUT; 5],
    dir: [OUT; 5],
    enable: [OUT; 5],
    min_stop: [IN; 3],
    max_stop: [IN; 3],
    timer: T,
}

impl<OUT, IN, T> GpioBoard<OUT, IN, T>
where
    OUT: OutputPin,
    IN: InputPin,
    T: StepTimer,
{
    pub fn new(
        step: [OUT; 5],
        dir: [OUT; 5],
        enable: [OUT; 5],
        min_stop: [IN; 3],
        max_stop: [IN; 3],
        timer: T,
    ) -> Self {
        Self {
            step,
            dir,
            enable,
            min_stop,
            max_stop,
            timer,
        }
    }
}

impl<OUT, IN, T> Board for GpioBoard<OUT, IN, T>
where
    OUT: OutputPin,
    IN: InputPin,
    T: StepTimer,
{
    fn step(&mut self, axis: Axis) {
        let pin = &mut self.step[axis.index()];
        let _ = pin.set_high();
        let _ = pin.set_low();
    }

    fn set_direction(&mut self, axis: Axis, forward: bool) {
        let i = axis.index();
        let level = forward != INVERT_DIR[i];
        let _ = if level {
            self.dir[i].set_high()
        } else {
            self.dir[i].set_low()
        };
    }

    // The driver enable lines are active low.

    fn enable_axis(&mut self, axis: Axis) {
        let _ = self.enable[axis.index()].set_low();
    }

    fn disable_axis(&mut self, axis: Axis) {
        let _ = self.enable[axis.index()].set_high();
    }

    fn endstop_hit(&mut self, axis: Axis, side: EndstopSide) -> bool {
        let i = axis.index();
        let pin = match side {
            EndstopSide::Min => &mut self.min_stop[i],
            EndstopSide::Max => &mut self.max_stop[i],
        };
        let raw_high = pin.is_high().unwrap_or(false);
        // Inverting switches read low when pressed.
        raw_high != ENDSTOP_INVERTING[i]
    }

    fn arm_timer(&mut self, delay_us: u32) {
        self.timer.arm(delay_us);
    }

    fn now_ms(&self) -> u32 {
        self.timer.now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::pin::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    struct FakeTimer {
        armed: Option<u32>,
    }

    impl StepTimer for FakeTimer {
        fn arm(&mut self, delay_us: u32) {
            self.armed = Some(delay_us);
        }

        fn now_ms(&self) -> u32 {
            0
        }
    }

    fn quiet() -> PinMock {
        PinMock::new(&[])
    }

    fn quiet5() -> [PinMock; 5] {
        core::array::from_fn(|_| quiet())
    }

    fn quiet3() -> [PinMock; 3] {
        core::array::from_fn(|_| quiet())
    }

    fn finish(pins: impl IntoIterator<Item = PinMock>) {
        for mut pin in pins {
            pin.done();
        }
    }

    #[test]
    fn step_pulses_the_axis_pin() {
        let mut step = quiet5();
        step[0].update_expectations(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);

        let mut board = GpioBoard::new(
            step,
            quiet5(),
            quiet5(),
            quiet3(),
            quiet3(),
            FakeTimer { armed: None },
        );
        board.step(Axis::X);

        let GpioBoard {
            step,
            dir,
            enable,
            min_stop,
            max_stop,
            ..
        } = board;
        finish(step);
        finish(dir);
        finish(enable);
        finish(min_stop);
        finish(max_stop);
    }

    #[test]
    fn direction_honors_the_wiring_inversion() {
        let mut dir = quiet5();
        // X is inverted in the wiring table: forward drives the line low.
        dir[0].update_expectations(&[PinTransaction::set(PinState::Low)]);
        // Z is not inverted: forward drives it high.
        dir[2].update_expectations(&[PinTransaction::set(PinState::High)]);

        let mut board = GpioBoard::new(
            quiet5(),
            dir,
            quiet5(),
            quiet3(),
            quiet3(),
            FakeTimer { armed: None },
        );
        board.set_direction(Axis::X, true);
        board.set_direction(Axis::Z, true);

        let GpioBoard {
            step,
            dir,
            enable,
            min_stop,
            max_stop,
            ..
        } = board;
        finish(step);
        finish(dir);
        finish(enable);
        finish(min_stop);
        finish(max_stop);
    }

    #[test]
    fn inverting_endstop_reads_low_as_pressed() {
        let mut min_stop = quiet3();
        min_stop[1].update_expectations(&[
            PinTransaction::get(PinState::Low),
            PinTransaction::get(PinState::High),
        ]);

        let mut board = GpioBoard::new(
            quiet5(),
            quiet5(),
            quiet5(),
            min_stop,
            quiet3(),
            FakeTimer { armed: None },
        );
        assert!(board.endstop_hit(Axis::Y, EndstopSide::Min));
        assert!(!board.endstop_hit(Axis::Y, EndstopSide::Min));

        let GpioBoard {
            step,
            dir,
            enable,
            min_stop,
            max_stop,
            ..
        } = board;
        finish(step);
        finish(dir);
        finish(enable);
        finish(min_stop);
        finish(max_stop);
    }

    #[test]
    fn timer_requests_pass_through() {
        let mut board = GpioBoard::new(
            quiet5(),
            quiet5(),
            quiet5(),
            quiet3(),
            quiet3(),
            FakeTimer { armed: None },
        );
        board.arm_timer(125);
        assert_eq!(board.timer.armed, Some(125));

        let GpioBoard {
            step,
            dir,
            enable,
            min_stop,
            max_stop,
            ..
        } = board;
        finish(step);
        finish(dir);
        finish(enable);
        finish(min_stop);
        finish(max_stop);
    }
}
