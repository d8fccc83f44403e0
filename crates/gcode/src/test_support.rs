//! In-crate test fixtures: a physical-ish board, a recording link, and a
//! rig that wires them to a machine and an interpreter.

use mill_motion::config::{
    DEFAULT_TICK_US, MACHINE_MAX_X_STEPS, MACHINE_MAX_Y_STEPS, MACHINE_MAX_Z_STEPS,
};
use mill_motion::{Axis, Board, EndstopSide, FloatPoint, MachineModel, NoopPanel};

use crate::exec::Interpreter;
use crate::link::HostLink;

pub(crate) struct TestBoard {
    pub steps: [u32; 5],
    dirs: [bool; 5],
    true_steps: [i64; 3],
    delay_us: u32,
    now_us: u64,
}

impl TestBoard {
    fn new() -> Self {
        Self {
            steps: [0; 5],
            dirs: [true; 5],
            // Mid-travel so test moves never brush a switch.
            true_steps: [
                MACHINE_MAX_X_STEPS as i64 / 2,
                MACHINE_MAX_Y_STEPS as i64 / 2,
                MACHINE_MAX_Z_STEPS as i64 / 2,
            ],
            delay_us: DEFAULT_TICK_US,
            now_us: 0,
        }
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
        self.dirs[axis.index()] = forward;
    }

    fn enable_axis(&mut self, _axis: Axis) {}

    fn disable_axis(&mut self, _axis: Axis) {}

    fn endstop_hit(&mut self, axis: Axis, side: EndstopSide) -> bool {
        let i = axis.index();
        let max_steps = [MACHINE_MAX_X_STEPS, MACHINE_MAX_Y_STEPS, MACHINE_MAX_Z_STEPS];
        match side {
            EndstopSide::Min => self.true_steps[i] <= 0,
            EndstopSide::Max => self.true_steps[i] >= max_steps[i] as i64,
        }
    }

    fn arm_timer(&mut self, delay_us: u32) {
        self.delay_us = delay_us;
    }

    fn timer_elapsed(&mut self) -> bool {
        self.now_us += u64::from(self.delay_us);
        true
    }

    fn now_ms(&self) -> u32 {
        (self.now_us / 1000) as u32
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum LinkEvent {
    Echo(String),
    Error(String),
    Resend(i32),
    Fatal(String),
    Position(FloatPoint),
    Capabilities,
    Ok,
}

#[derive(Default)]
pub(crate) struct CollectLink {
    pub events: Vec<LinkEvent>,
}

impl HostLink for CollectLink {
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

pub(crate) struct TestRig {
    pub machine: MachineModel<TestBoard, NoopPanel>,
    pub interp: Interpreter,
    pub link: CollectLink,
}

impl TestRig {
    pub fn new() -> Self {
        Self {
            machine: MachineModel::new(TestBoard::new(), NoopPanel),
            interp: Interpreter::new(),
            link: CollectLink::default(),
        }
    }

    pub fn process(&mut self, line: &str) {
        let Self {
            machine,
            interp,
            link,
        } = self;
        interp.process_line(line, machine, link);
    }
}
