//! rosbridge JSON codec.
//!
//! Translates between `rosbridge_server` v2 protocol frames and the workspace
//! types.  Three ROS topics are involved:
//!
//! | Direction | Default topic | ROS type | Payload |
//! |---|---|---|---|
//! | in | `/scan` | `sensor_msgs/LaserScan` | `msg.ranges` |
//! | in | `/sliding_window/set` | `std_msgs/Int8` | `msg.data` |
//! | out | `/collision` | `std_msgs/Int16MultiArray` | `msg.data` |
//!
//! JSON cannot carry `inf`/`NaN`, so rosbridge encodes them as `null`.  A
//! LaserScan reports an out-of-range beam as `+inf`, so a `null` range is read
//! as open space and capped at the message's `range_max`.

use scanguard_types::{CollisionVector, ScanError, ScanFrame, WindowTuning};
use serde_json::{Value, json};

pub const LASER_SCAN_TYPE: &str = "sensor_msgs/LaserScan";
pub const INT8_TYPE: &str = "std_msgs/Int8";
pub const INT16_ARRAY_TYPE: &str = "std_msgs/Int16MultiArray";

/// ROS topic names the node is wired to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosTopics {
    pub scan: String,
    pub tuning: String,
    pub collision: String,
}

impl Default for RosTopics {
    fn default() -> Self {
        Self {
            scan: "/scan".to_string(),
            tuning: "/sliding_window/set".to_string(),
            collision: "/collision".to_string(),
        }
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Scan(ScanFrame),
    Tuning(WindowTuning),
}

pub fn subscribe_frame(topic: &str, msg_type: &str) -> String {
    json!({ "op": "subscribe", "topic": topic, "type": msg_type }).to_string()
}

pub fn advertise_frame(topic: &str, msg_type: &str) -> String {
    json!({ "op": "advertise", "topic": topic, "type": msg_type }).to_string()
}

/// Frames to send right after connecting: two subscriptions and one
/// advertisement.
pub fn handshake_frames(topics: &RosTopics) -> Vec<String> {
    vec![
        subscribe_frame(&topics.scan, LASER_SCAN_TYPE),
        subscribe_frame(&topics.tuning, INT8_TYPE),
        advertise_frame(&topics.collision, INT16_ARRAY_TYPE),
    ]
}

/// `std_msgs/Int16MultiArray` publish frame for one collision vector.
pub fn collision_frame(topic: &str, vector: &CollisionVector) -> String {
    json!({
        "op": "publish",
        "topic": topic,
        "msg": {
            "layout": { "dim": [], "data_offset": 0 },
            "data": vector.as_i16_array()
        }
    })
    .to_string()
}

/// Decode one inbound rosbridge frame.
///
/// Returns `Ok(None)` for frames that are not a publish on the scan or
/// tuning topic.
///
/// # Errors
///
/// * [`ScanError::Parsing`] – the text is not JSON, or the message body is
///   missing or mistyped.
/// * [`ScanError::ScanLength`] – a scan with the wrong number of ranges.
pub fn parse_inbound(text: &str, topics: &RosTopics) -> Result<Option<Inbound>, ScanError> {
    let json: Value = serde_json::from_str(text).map_err(|e| ScanError::Parsing(format!("invalid rosbridge frame: {e}")))?;

    if json.get("op").and_then(Value::as_str) != Some("publish") {
        return Ok(None);
    }
    let topic = json.get("topic").and_then(Value::as_str).unwrap_or("");
    let msg = json.get("msg");

    if topic == topics.scan {
        let ranges = msg
            .and_then(|m| m.get("ranges"))
            .and_then(Value::as_array)
            .ok_or_else(|| ScanError::Parsing(format!("{topic}: missing msg.ranges array")))?;
        let range_max = msg
            .and_then(|m| m.get("range_max"))
            .and_then(Value::as_f64)
            .unwrap_or(ScanFrame::DEFAULT_MAX_RANGE);
        let ranges = ranges
            .iter()
            .map(|r| match r {
                Value::Null => Ok(f64::INFINITY),
                other => other
                    .as_f64()
                    .ok_or_else(|| ScanError::Parsing(format!("{topic}: non-numeric range {other}"))),
            })
            .collect::<Result<Vec<f64>, ScanError>>()?;
        return ScanFrame::with_max_range(ranges, range_max).map(|frame| Some(Inbound::Scan(frame)));
    }

    if topic == topics.tuning {
        let data = msg
            .and_then(|m| m.get("data"))
            .and_then(Value::as_i64)
            .ok_or_else(|| ScanError::Parsing(format!("{topic}: missing integer msg.data")))?;
        let delta = i8::try_from(data).map_err(|_| ScanError::Parsing(format!("{topic}: {data} does not fit in Int8")))?;
        return Ok(Some(Inbound::Tuning(WindowTuning(delta))));
    }

    Ok(None)
}
