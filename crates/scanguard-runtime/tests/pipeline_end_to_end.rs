//! Full scan → collision vector runs through the public runtime API.

use std::sync::Arc;
use std::time::Duration;

use scanguard_middleware::rosbridge::{self, Inbound};
use scanguard_middleware::{EventBus, RosTopics, Topic};
use scanguard_runtime::{AvoidanceNode, CycleOutput, Pipeline, SharedPipeline};
use scanguard_types::{CollisionVector, Event, EventPayload, ScanError, ScanFrame, Sector, WindowSize, WindowTuning};
use tokio::sync::watch;

fn scan_with(f: impl Fn(usize) -> f64) -> ScanFrame {
    ScanFrame::new((0..720).map(f).collect()).unwrap()
}

fn fifth_output(pipeline: &mut Pipeline, scan: &ScanFrame) -> CycleOutput {
    for _ in 0..4 {
        assert!(pipeline.process_scan(scan).is_none());
    }
    pipeline.process_scan(scan).unwrap()
}

#[test]
fn open_space_is_all_clear() {
    let mut pipeline = Pipeline::default();
    let out = fifth_output(&mut pipeline, &ScanFrame::uniform(5.0));
    assert_eq!(out.collision, CollisionVector::all_clear());
    assert_eq!(out.collision.as_i16_array(), [1; 8]);
}

#[test]
fn out_of_range_scan_is_all_clear() {
    let mut pipeline = Pipeline::default();
    let out = fifth_output(&mut pipeline, &ScanFrame::uniform(f64::INFINITY));
    assert_eq!(out.collision, CollisionVector::all_clear());
}

#[test]
fn open_doorway_ahead_stays_clear() {
    // Beams through a doorway never return; the walls either side are 5 m off.
    let scan = scan_with(|i| if (640..680).contains(&i) { f64::INFINITY } else { 5.0 });
    let mut pipeline = Pipeline::default();
    let out = fifth_output(&mut pipeline, &scan);
    assert!(out.collision.is_clear(Sector::Top));
    assert_eq!(out.collision, CollisionVector::all_clear());
}

#[test]
fn null_ranges_from_rosbridge_are_all_clear() {
    let text = serde_json::json!({
        "op": "publish",
        "topic": "/scan",
        "msg": { "range_max": 10.0, "ranges": vec![serde_json::Value::Null; 720] }
    })
    .to_string();
    let Some(Inbound::Scan(scan)) = rosbridge::parse_inbound(&text, &RosTopics::default()).unwrap() else {
        panic!("expected a scan");
    };
    let mut pipeline = Pipeline::default();
    let out = fifth_output(&mut pipeline, &scan);
    assert_eq!(out.collision, CollisionVector::all_clear());
}

#[test]
fn wide_close_obstacle_ahead_blocks_only_top() {
    // 35 bearings at 0.1 m: after 31-wide smoothing bearings 659..=663 stay at
    // 0.1 m, while the edges of `top_R` and `top_slow` are lifted above their
    // thresholds by the surrounding 5 m readings.
    let scan = scan_with(|i| if (644..=678).contains(&i) { 0.1 } else { 5.0 });
    let mut pipeline = Pipeline::default();
    let out = fifth_output(&mut pipeline, &scan);
    assert_eq!(out.collision.blocked_sectors(), vec![Sector::Top]);
    assert_eq!(out.collision.as_i16_array(), [0, 1, 1, 1, 1, 1, 1, 1]);
}

#[test]
fn short_close_run_is_absorbed_by_smoothing() {
    let scan = scan_with(|i| if (700..705).contains(&i) { 0.1 } else { 5.0 });
    let mut pipeline = Pipeline::default();
    let out = fifth_output(&mut pipeline, &scan);
    assert_eq!(out.collision, CollisionVector::all_clear());
}

#[test]
fn obstacle_behind_trips_slow_before_stop() {
    // 0.5 m wall behind: inside the 0.8 m slow-down distance only.
    let scan = scan_with(|i| if (320..400).contains(&i) { 0.5 } else { 5.0 });
    let mut pipeline = Pipeline::default();
    let out = fifth_output(&mut pipeline, &scan);
    assert_eq!(out.collision.blocked_sectors(), vec![Sector::BottomSlow]);
}

#[test]
fn repeated_scan_gives_identical_cycles() {
    let scan = scan_with(|i| 0.5 + (i % 40) as f64 * 0.1);
    let mut pipeline = Pipeline::default();
    let first = fifth_output(&mut pipeline, &scan);
    for _ in 0..10 {
        let next = pipeline.process_scan(&scan).unwrap();
        assert_eq!(next.collision, first.collision);
        assert_eq!(next.window.current, WindowSize::DEFAULT);
    }
}

#[test]
fn flickering_dropouts_widen_the_window() {
    let steady = ScanFrame::uniform(1.0);
    let dropout = scan_with(|i| if i < 100 { 0.0 } else { 1.0 });
    let mut pipeline = Pipeline::default();

    let mut last = None;
    for scan in [&steady, &dropout, &steady, &dropout, &steady] {
        last = pipeline.process_scan(scan);
    }
    let out = last.unwrap();
    assert!(out.window.instability > 0.08);
    assert_eq!(out.window.previous, WindowSize::DEFAULT);
    assert_eq!(out.window.current.get(), 51);
    assert_eq!(pipeline.window_size().get(), 51);
}

#[test]
fn widened_window_changes_the_next_detection() {
    // 35 bearings at 0.1 m ahead block `top` at width 31 but are averaged
    // away at width 51.
    let obstacle = scan_with(|i| if (644..=678).contains(&i) { 0.1 } else { 5.0 });
    let flicker = scan_with(|i| if (200..300).contains(&i) { 0.0 } else { obstacle.ranges()[i] });

    let mut widened = Pipeline::default();
    let mut last = None;
    for scan in [&obstacle, &flicker, &obstacle, &flicker, &obstacle] {
        last = widened.process_scan(scan);
    }
    let first = last.unwrap();
    assert_eq!(first.collision.blocked_sectors(), vec![Sector::Top]);
    assert_eq!(first.window.current.get(), 51);

    let mut steady = Pipeline::default();
    fifth_output(&mut steady, &obstacle);
    let unchanged = steady.process_scan(&obstacle).unwrap();
    assert_eq!(unchanged.window.previous, WindowSize::DEFAULT);
    assert!(!unchanged.collision.is_clear(Sector::Top));

    // Same history in front of the robot; only the new frame's width differs.
    let next = widened.process_scan(&obstacle).unwrap();
    assert_eq!(next.window.previous.get(), 51);
    assert!(next.collision.is_clear(Sector::Top));
    assert_ne!(next.collision, unchanged.collision);
}

#[test]
fn negative_tuning_from_minimum_is_rejected() {
    let mut pipeline = Pipeline::default();
    assert!(matches!(
        pipeline.apply_tuning(WindowTuning(-1)),
        Err(ScanError::TuningRejected { .. })
    ));
    assert_eq!(pipeline.window_size(), WindowSize::DEFAULT);

    // The rejected request does not disturb processing.
    let out = fifth_output(&mut pipeline, &ScanFrame::uniform(5.0));
    assert_eq!(out.collision, CollisionVector::all_clear());
}

#[tokio::test]
async fn node_publishes_collision_vectors_over_the_bus() -> Result<(), Box<dyn std::error::Error>> {
    let bus = Arc::new(EventBus::default());
    let node = AvoidanceNode::new(Arc::clone(&bus), SharedPipeline::default());
    let mut collisions = bus.subscribe_to(Topic::Collision);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(node.run(shutdown_rx));

    let blocked = scan_with(|i| if (644..=678).contains(&i) { 0.1 } else { 5.0 });
    for _ in 0..5 {
        bus.publish(Event::new("test", EventPayload::Scan(blocked.clone())))?;
    }

    let event = tokio::time::timeout(Duration::from_secs(2), collisions.recv()).await??;
    let EventPayload::Collision(vector) = event.payload else {
        panic!("expected a collision vector");
    };
    assert!(!vector.is_clear(Sector::Top));

    shutdown_tx.send(true)?;
    tokio::time::timeout(Duration::from_secs(2), handle).await???;
    Ok(())
}
