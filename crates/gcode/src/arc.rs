//! Arc decomposition for G2/G3.
//!
//! An arc becomes a run of short straight chords enqueued as ordinary
//! segments. The chord count is the larger of 2.4 waypoints per radian and
//! one per unit of arc length, so small arcs stay round and long ones stay
//! dense. Waypoints use `atan2`/`sin`/`cos`; step counts are deterministic
//! per target but may differ by a waypoint across float implementations.

use core::f32::consts::PI;

use mill_motion::FloatPoint;

use crate::math::{atan2f, ceilf, cosf, fmaxf, sinf, sqrtf};

/// Iterator over the waypoints of one planned arc.
pub struct ArcPlan {
    base: FloatPoint,
    center_x: f32,
    center_y: f32,
    radius: f32,
    angle_a: f32,
    angle: f32,
    steps: i32,
    next: i32,
    clockwise: bool,
}

/// Plan an arc from `base` (the current position; its z/a/b/f ride along
/// unchanged) to `endpoint`, around `center`. The XY plane only.
pub fn plan_arc(
    base: FloatPoint,
    center: (f32, f32),
    endpoint: (f32, f32),
    clockwise: bool,
) -> ArcPlan {
    let a_x = base.x - center.0;
    let a_y = base.y - center.1;
    let b_x = endpoint.0 - center.0;
    let b_y = endpoint.1 - center.1;

    let (angle_a, mut angle_b) = if clockwise {
        (atan2f(b_y, b_x), atan2f(a_y, a_x))
    } else {
        (atan2f(a_y, a_x), atan2f(b_y, b_x))
    };

    // angle_b must end up greater than angle_a; an equal pair means a full
    // circle.
    if angle_b <= angle_a {
        angle_b += 2.0 * PI;
    }
    let angle = angle_b - angle_a;

    let radius = sqrtf(a_x * a_x + a_y * a_y);
    let length = radius * angle;
    let steps = ceilf(fmaxf(angle * 2.4, length)) as i32;

    ArcPlan {
        base,
        center_x: center.0,
        center_y: center.1,
        radius,
        angle_a,
        angle,
        steps,
        next: 1,
        clockwise,
    }
}

impl ArcPlan {
    /// Total number of waypoints this arc will produce.
    pub fn steps(&self) -> i32 {
        self.steps
    }
}

impl Iterator for ArcPlan {
    type Item = FloatPoint;

    fn next(&mut self) -> Option<FloatPoint> {
        if self.next > self.steps {
            return None;
        }
        let s = self.next;
        self.next += 1;

        // Forwards for counterclockwise, backwards for clockwise; either
        // way the final waypoint lands exactly on the endpoint angle.
        let step = if self.clockwise { self.steps - s } else { s };
        let theta = self.angle_a + self.angle * (step as f32 / self.steps as f32);

        let mut point = self.base;
        point.x = self.center_x + self.radius * cosf(theta);
        point.y = self.center_y + self.radius * sinf(theta);
        Some(point)
    }
}
