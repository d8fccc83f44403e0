//! Endstop bookkeeping shared between the DDA and the machine model.
//!
//! Every per-axis step decision consults [`PositionTracker::check_endstops`],
//! which keeps the absolute step record slaved to DDA progress, maintains the
//! hit bitmap, and enforces the virtual envelope limits once the machine has
//! been homed.

use bitflags::bitflags;

use crate::config::{MACHINE_MAX_X_STEPS, MACHINE_MAX_Y_STEPS};
use crate::vector::{Axis, StepPoint};

bitflags! {
    /// Which endstops are currently engaged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EndstopFlags: u8 {
        const X_LOW = 1 << 0;
        const Y_LOW = 1 << 1;
        const Z_LOW = 1 << 2;
        const X_HIGH = 1 << 3;
        const Y_HIGH = 1 << 4;
        const Z_HIGH = 1 << 5;
    }
}

impl EndstopFlags {
    /// The low-end flag for a linear axis; empty for A and B.
    pub fn low(axis: Axis) -> Self {
        match axis {
            Axis::X => EndstopFlags::X_LOW,
            Axis::Y => EndstopFlags::Y_LOW,
            Axis::Z => EndstopFlags::Z_LOW,
            _ => EndstopFlags::empty(),
        }
    }

    /// The high-end flag for a linear axis; empty for A and B.
    pub fn high(axis: Axis) -> Self {
        match axis {
            Axis::X => EndstopFlags::X_HIGH,
            Axis::Y => EndstopFlags::Y_HIGH,
            Axis::Z => EndstopFlags::Z_HIGH,
            _ => EndstopFlags::empty(),
        }
    }

    fn axis(self) -> Axis {
        if self.intersects(EndstopFlags::X_LOW | EndstopFlags::X_HIGH) {
            Axis::X
        } else if self.intersects(EndstopFlags::Y_LOW | EndstopFlags::Y_HIGH) {
            Axis::Y
        } else {
            Axis::Z
        }
    }
}

/// Absolute-step position record and endstop state.
///
/// Written from the step interrupt, read by the foreground (`live_position`,
/// homing verification). Foreground reads tolerate one tick of staleness.
#[derive(Debug, Default)]
pub struct PositionTracker {
    pub absolute_position: StepPoint,
    pub absolute_position_valid: bool,
    pub endstop_hits: EndstopFlags,
    /// Step coordinates at which each endstop last closed.
    pub zero_hit: StepPoint,
}

impl PositionTracker {
    /// Records one tick of DDA progress on the axis behind `flag` and
    /// decides whether that axis may step toward `dir`.
    ///
    /// `current` is the axis position in absolute steps and `engaged` the
    /// raw switch state. The hit bitmap mirrors engagement, so a switch a
    /// parked axis rests on stays visible; motion is only refused when the
    /// engaged end is the one being moved into. Once the machine is homed,
    /// the ends that carry no reference switch are limited in software:
    /// X and Y high, Z low.
    pub fn check_endstops(
        &mut self,
        flag: EndstopFlags,
        engaged: bool,
        current: i32,
        dir: bool,
    ) -> bool {
        let axis = flag.axis();
        *self.absolute_position.axis_mut(axis) = current;

        let high_end = flag.intersects(
            EndstopFlags::X_HIGH | EndstopFlags::Y_HIGH | EndstopFlags::Z_HIGH,
        );
        let into_switch = if high_end { dir } else { !dir };

        let mut engaged = engaged;
        if self.absolute_position_valid {
            // A software limit only counts while the axis is driving
            // further into it; backing away releases it at once.
            engaged |= if flag == EndstopFlags::X_HIGH {
                dir && current >= MACHINE_MAX_X_STEPS
            } else if flag == EndstopFlags::Y_HIGH {
                dir && current >= MACHINE_MAX_Y_STEPS
            } else if flag == EndstopFlags::Z_LOW {
                !dir && current <= 0
            } else {
                false
            };
        }

        if engaged {
            self.endstop_hits |= flag;
            *self.zero_hit.axis_mut(axis) = current;
        } else {
            self.endstop_hits &= !flag;
        }

        !(engaged && into_switch)
    }

    pub fn is_hit(&self, flag: EndstopFlags) -> bool {
        self.endstop_hits.intersects(flag)
    }
}
