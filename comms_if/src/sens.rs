//! # Sensor message module
//!
//! A single enumeration covering every input the flight control loop reacts to, so that sensor
//! streams can be recorded and replayed from scripts.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json::{self, Value};
use thiserror::Error;

// Internal
use crate::eqpt::{
    nav::{GoalStamped, PoseStamped, TwistStamped},
    per::{PointCloud, ValueGrid},
};

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static KNOWN_TYPES: [&str; 7] = [
    "POSE",
    "TWIST",
    "GLOBAL_GOAL",
    "LOCAL_GOAL",
    "DEPTH_POINTS",
    "SCAN",
    "VALUE_GRID",
];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A message from one of the loop's input streams.
///
/// Serialised as `{"type": "POSE", "payload": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorMsg {
    Pose(PoseStamped),
    Twist(TwistStamped),
    GlobalGoal(GoalStamped),
    LocalGoal(GoalStamped),

    /// Points from the depth camera, in the depth optical frame
    DepthPoints(PointCloud),

    /// Points from the laser scanner, in the laser frame
    Scan(PointCloud),

    ValueGrid(ValueGrid),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum SensorMsgParseError {
    #[error("Message contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Message has an invalid type ({0})")]
    InvalidType(String),

    #[error("Message of type {0} is expected to have a payload but it doesn't")]
    MissingPayload(String),

    #[error("Payload of {0} message is malformed: {1}")]
    InvalidPayload(String, serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SensorMsg {
    /// Parse a message from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, SensorMsgParseError> {
        let val: Value = serde_json::from_str(json_str).map_err(SensorMsgParseError::InvalidJson)?;

        // Check the type before attempting the full parse so the error is more useful than
        // serde's "unknown variant"
        let msg_type = match val["type"].as_str() {
            Some(s) => s.to_string(),
            None => {
                return Err(SensorMsgParseError::InvalidType(String::from(
                    "Expected \"type\" to be a string",
                )))
            }
        };

        if !KNOWN_TYPES.contains(&msg_type.as_str()) {
            return Err(SensorMsgParseError::InvalidType(format!(
                "{} is not a recognised message type",
                msg_type
            )));
        }

        if val["payload"].is_null() {
            return Err(SensorMsgParseError::MissingPayload(msg_type));
        }

        serde_json::from_value(val).map_err(|e| SensorMsgParseError::InvalidPayload(msg_type, e))
    }

    /// Short name of the message type, used in logging
    pub fn type_name(&self) -> &'static str {
        match self {
            SensorMsg::Pose(_) => "POSE",
            SensorMsg::Twist(_) => "TWIST",
            SensorMsg::GlobalGoal(_) => "GLOBAL_GOAL",
            SensorMsg::LocalGoal(_) => "LOCAL_GOAL",
            SensorMsg::DepthPoints(_) => "DEPTH_POINTS",
            SensorMsg::Scan(_) => "SCAN",
            SensorMsg::ValueGrid(_) => "VALUE_GRID",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_json() {
        let msg = SensorMsg::from_json(
            r#"{"type": "TWIST", "payload": {"linear_ms": [1.0, 2.0, 0.5]}}"#,
        )
        .unwrap();

        match msg {
            SensorMsg::Twist(t) => {
                assert_eq!(t.linear_ms[0], 1.0);
                assert_eq!(t.linear_ms[2], 0.5);
            }
            m => panic!("Expected a twist, got {}", m.type_name()),
        }

        assert!(matches!(
            SensorMsg::from_json(r#"{"type": "WIND", "payload": {}}"#),
            Err(SensorMsgParseError::InvalidType(_))
        ));
        assert!(matches!(
            SensorMsg::from_json(r#"{"type": "POSE"}"#),
            Err(SensorMsgParseError::MissingPayload(_))
        ));
        assert!(matches!(
            SensorMsg::from_json(r#"{"type": "POSE", "payload": {"position_m": 3}}"#),
            Err(SensorMsgParseError::InvalidPayload(_, _))
        ));
    }
}
