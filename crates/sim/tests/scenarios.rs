//! End-to-end scenarios: G-code text in, step pulses and status frames out.

use float_cmp::approx_eq;
use mill_gcode::checksum;
use mill_motion::config::{MACHINE_MAX_X_STEPS, MACHINE_MAX_Z_STEPS};
use mill_motion::{Axis, EndstopFlags, FloatPoint};
use mill_sim::{LinkEvent, MillHarness};

#[test]
fn linear_move_emits_the_planned_steps() {
    let mut mill = MillHarness::new();
    mill.feed_line("G1 X10 Y0 Z0 F600");
    mill.run_until_idle();

    assert_eq!(mill.step_counts()[0], 8000);
    assert_eq!(mill.step_counts()[1], 0);
    assert_eq!(mill.step_counts()[2], 0);

    let position = mill.machine.local_position;
    assert_eq!(position.x, 10.0);
    assert_eq!(position.y, 0.0);
    assert_eq!(position.z, 0.0);
    assert!(mill.link.events.contains(&LinkEvent::Ok));
}

#[test]
fn arc_traverses_a_half_circle() {
    let mut mill = MillHarness::new();
    mill.feed_line("G2 X10 Y0 I5 J0 F300");
    mill.run_until_idle();

    let position = mill.machine.local_position;
    assert!(approx_eq!(f32, position.x, 10.0, epsilon = 1e-3));
    assert!(approx_eq!(f32, position.y, 0.0, epsilon = 1e-3));

    // X sweeps monotonically 0 -> 10 mm; Y rises 5 mm and comes back.
    let steps = mill.step_counts();
    assert!((7990..=8010).contains(&steps[0]), "x steps {}", steps[0]);
    assert!((7900..=8100).contains(&steps[1]), "y steps {}", steps[1]);
}

#[test]
fn home_then_move_anchors_the_absolute_frame() {
    let mut mill = MillHarness::new();
    mill.feed_line("G28");

    assert!(mill.machine.absolute_position_valid());
    let hits = mill.machine.endstop_hits();
    assert!(hits.contains(EndstopFlags::X_LOW));
    assert!(hits.contains(EndstopFlags::Y_LOW));
    assert!(hits.contains(EndstopFlags::Z_HIGH));
    assert!(!mill.link.has_fatal());

    mill.feed_line("G1 X50 F500");
    mill.run_until_idle();
    assert_eq!(mill.machine.absolute_position().x, 40_000);
}

#[test]
fn wcs_switch_shifts_the_live_position() {
    let mut mill = MillHarness::new();
    mill.feed_line("G28");
    mill.feed_line("G92 X0 Y0 Z0");
    mill.feed_line("G1 X10 Y0 Z0 F600");
    mill.run_until_idle();

    mill.machine
        .set_wcs_offset(
            0,
            FloatPoint {
                x: 5.0,
                y: 5.0,
                ..FloatPoint::default()
            },
        )
        .unwrap();
    mill.feed_line("G54");

    let live = mill.machine.live_position();
    assert!(approx_eq!(f32, live.x, 5.0, epsilon = 2e-3));
    assert!(approx_eq!(f32, live.y, -5.0, epsilon = 2e-3));
    // Z stays in the machine frame anchored at the top of travel.
    assert!(approx_eq!(f32, live.z, 80.0, epsilon = 2e-3));
}

#[test]
fn g83_pecks_its_way_down() {
    let mut mill = MillHarness::new();
    // Make the current position (0, 0, 5) without motion.
    mill.feed_line("G92 X0 Y0 Z5");
    mill.machine.board_mut().record_pulses = true;

    mill.feed_line("G83 X10 Y0 Z-3 Q1 R5");
    mill.run_until_idle();

    // The cycle ends back at the initial Z (G98 retract mode).
    let position = mill.machine.local_position;
    assert_eq!(position.x, 10.0);
    assert_eq!(position.z, 5.0);

    // Replay the Z pulses: the deepest point is the commanded bottom,
    // 8 mm below the start.
    let start_z = 40.0 * 800.0; // physical park position in steps
    let mut z = start_z as i64;
    let mut z_min = z;
    let mut runs: Vec<bool> = Vec::new();
    for pulse in &mill.machine.board().pulses {
        if pulse.axis == Axis::Z {
            z += if pulse.forward { 1 } else { -1 };
            z_min = z_min.min(z);
            if runs.last() != Some(&pulse.forward) {
                runs.push(pulse.forward);
            }
        }
    }
    assert_eq!((start_z as i64) - z_min, 6400, "deepest point is -3 local");

    // Eight descents (first plunge plus seven re-entries) interleaved with
    // seven chip retracts and the final lift.
    let descents = runs.iter().filter(|&&forward| !forward).count();
    let lifts = runs.iter().filter(|&&forward| forward).count();
    assert_eq!(descents, 8);
    assert_eq!(lifts, 8);
}

#[test]
fn checksum_mismatch_requests_a_resend() {
    let mut mill = MillHarness::new();

    mill.feed_line("N1 G1 X1 F600*23");
    assert_eq!(mill.link.resends(), vec![1]);
    assert_eq!(mill.interp.last_line_received(), 0);
    // The bad line must not have moved anything.
    assert_eq!(mill.machine.local_position.x, 0.0);

    let line = "N1 G1 X1 F600";
    let framed = format!("{}*{}", line, checksum(line));
    mill.feed_line(&framed);
    mill.run_until_idle();

    assert_eq!(mill.interp.last_line_received(), 1);
    assert_eq!(mill.link.resends(), vec![1]); // no new resend
    assert_eq!(mill.machine.local_position.x, 1.0);
}

#[test]
fn zero_length_move_is_accepted_without_steps() {
    let mut mill = MillHarness::new();
    mill.feed_line("G1 X0 Y0 Z0 F600");
    mill.run_until_idle();

    assert_eq!(mill.step_counts(), [0; 5]);
    assert!(mill.link.events.contains(&LinkEvent::Ok));
}

#[test]
fn the_step_onto_the_soft_limit_is_the_last_one() {
    let mut mill = MillHarness::new();
    mill.feed_line("G28");
    mill.feed_line("G1 X180 F600");
    mill.run_until_idle();

    // From the homed origin the move covers the whole travel; the step at
    // the limit is recorded as an endstop event.
    assert_eq!(mill.step_counts()[0], MACHINE_MAX_X_STEPS as u64);
    assert!(mill.machine.endstop_hits().contains(EndstopFlags::X_HIGH));

    // Attempting to go further produces no more X steps.
    let before = mill.step_counts()[0];
    mill.feed_line("G1 X185 F600");
    mill.run_until_idle();
    assert_eq!(mill.step_counts()[0], before);
}

#[test]
fn inch_parameters_scale_until_g21() {
    let mut mill = MillHarness::new();
    mill.feed_line("G20");
    assert!(!mill.machine.using_mm());

    mill.feed_line("G1 X1 F600");
    mill.run_until_idle();
    // One inch of travel at 800 steps/mm rounds to 20320 steps.
    assert_eq!(mill.step_counts()[0], 20_320);

    mill.feed_line("G21");
    assert!(mill.machine.using_mm());
    assert_eq!(mill.machine.units().x, 800.0);
}

#[test]
fn homing_is_reported_fatal_when_a_switch_is_missing() {
    let mut mill = MillHarness::new();
    mill.machine.board_mut().break_min[0] = true;
    mill.feed_line("G28 X0");
    assert!(mill.link.has_fatal());
}

#[test]
fn absolute_z_survives_the_whole_session() {
    let mut mill = MillHarness::new();
    mill.feed_line("G28");
    assert_eq!(mill.machine.absolute_position().z, MACHINE_MAX_Z_STEPS);

    mill.feed_line("G1 Z40 F600");
    mill.run_until_idle();
    assert_eq!(mill.machine.absolute_position().z, 40 * 800);
}
