//! Harness plumbing: persisted tables, panel hooks, emergency stop, and
//! trace capture.

use mill_motion::FloatPoint;
use mill_persist::{MemoryStorage, PersistentStore};
use mill_sim::{LinkEvent, MillHarness};

#[test]
fn persisted_tables_drive_wcs_and_tool_prompts() {
    let (mut store, defaulted) = PersistentStore::open(MemoryStorage::blank());
    assert!(defaulted);
    store
        .write_wcs(
            1,
            FloatPoint {
                x: 12.5,
                y: -4.0,
                ..FloatPoint::default()
            },
        )
        .unwrap();
    store.write_tool(1, "6mm rougher").unwrap();

    let mut mill = MillHarness::new();
    mill.machine.load_tables(store.wcs_table(), store.tool_table());

    // G55 applies the stored offset once the machine is homed.
    mill.feed_line("G28");
    mill.feed_line("G55");
    assert_eq!(mill.machine.local_zero_offset().x, 12.5);
    assert_eq!(mill.machine.local_zero_offset().y, -4.0);

    // M6 T2 prompts with the stored description (tools are 1-based).
    mill.feed_line("M6 T2");
    assert_eq!(
        mill.machine.panel().tool_prompts,
        vec!["6mm rougher".to_string()]
    );

    // An unnamed tool falls back to its number.
    mill.feed_line("M6 T4");
    assert_eq!(mill.machine.panel().tool_prompts[1], "Tool #4");

    // M6 without T prompts generically.
    mill.feed_line("M6");
    assert_eq!(mill.machine.panel().tool_prompts[2], "Unspecified Tool");
}

#[test]
fn emergency_stop_flushes_and_notifies_the_panel() {
    let mut mill = MillHarness::new();
    mill.feed_line("G1 X40 F600");

    mill.machine.trigger_emergency_stop();
    mill.machine.manage(true);

    assert!(mill.machine.q_empty());
    assert_eq!(mill.machine.panel().emergency_notices, 1);
}

#[test]
fn echo_and_capability_frames_reach_the_link() {
    let mut mill = MillHarness::new();
    mill.feed_line("M115");
    assert_eq!(
        mill.link.events,
        vec![
            LinkEvent::Echo("M115".to_string()),
            LinkEvent::Capabilities,
            LinkEvent::Ok,
        ]
    );

    // M111 S0 mutes the echo.
    mill.feed_line("M111 S0");
    mill.feed_line("M115");
    assert!(!mill
        .link
        .events
        .iter()
        .skip(3)
        .any(|e| matches!(e, LinkEvent::Echo(_))));
}

#[test]
fn m114_reports_the_commanded_position() {
    let mut mill = MillHarness::new();
    mill.feed_line("G1 X2.5 Y1 F600");
    mill.feed_line("M114");
    assert!(mill
        .link
        .events
        .iter()
        .any(|e| matches!(e, LinkEvent::Position(p) if p.x == 2.5 && p.y == 1.0)));
}

#[test]
fn trace_dump_round_trips_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");

    let mut mill = MillHarness::new();
    mill.machine.board_mut().record_pulses = true;
    mill.feed_line("G1 X0.01 F600");
    mill.run_until_idle();
    mill.dump_trace(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let entries: Vec<mill_sim::TraceEntry> = serde_json::from_str(&text).unwrap();
    // 8 pulses for the 0.01 mm move plus the link frames.
    assert!(entries.len() >= 9);
}

#[test]
fn panel_sees_startup_and_ui_polls() {
    let mut mill = MillHarness::new();
    assert!(mill.machine.panel().started);

    mill.feed_line("G1 X1 F600");
    mill.run_until_idle();
    assert!(mill.machine.panel().ui_polls > 0);
}
