//! # Sensor replay script interpreter
//!
//! Replay scripts feed recorded (or hand written) sensor messages into the flight loop at set
//! times, so that the loop can be exercised on the bench without a vehicle. Each entry in a
//! script looks like:
//!
//! ```text
//! 0.5: {"type": "POSE", "payload": {"position_m": [0, 0, 1], "attitude_q": [0, 0, 0, 1]}};
//! ```
//!
//! where the leading number is the time in seconds since the start of the session at which the
//! message is due.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use crate::session::get_elapsed_seconds;
use comms_if::sens::{SensorMsg, SensorMsgParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A message which is scripted to be delivered at a specific time.
struct ScriptedMsg {
    /// The time the message is due
    due_time_s: f64,

    msg: SensorMsg,
}

/// A script interpreter.
///
/// After initialising with the path to the script use `.get_pending_msgs` to acquire the
/// messages that are due.
pub struct ScriptInterpreter {
    script_path: Option<PathBuf>,
    msgs: VecDeque<ScriptedMsg>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error("Script contains an invalid timestamp: {0}. Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script timestamps must not decrease, found {1} s after {0} s")]
    OutOfOrder(f64, f64),

    #[error("Script contains an invalid message at {0} s: {1}")]
    InvalidMsg(f64, SensorMsgParseError),

    #[error("Could not build the script regex: {0}")]
    RegexError(regex::Error),
}

pub enum PendingMsgs {
    None,
    Some(Vec<SensorMsg>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        let mut si = Self::from_str(&script)?;
        si.script_path = Some(path);
        Ok(si)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_str(script: &str) -> Result<Self, ScriptError> {
        let mut queue: VecDeque<ScriptedMsg> = VecDeque::new();

        let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(ScriptError::RegexError)?;

        let mut last_time_s = 0.0;

        for cap in re.captures_iter(script) {
            let (time_str, payload) = match (cap.get(1), cap.get(3)) {
                (Some(t), Some(p)) => (t.as_str(), p.as_str()),
                _ => continue,
            };

            let due_time_s: f64 = time_str
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            if due_time_s < last_time_s {
                return Err(ScriptError::OutOfOrder(last_time_s, due_time_s));
            }
            last_time_s = due_time_s;

            let msg = SensorMsg::from_json(payload)
                .map_err(|e| ScriptError::InvalidMsg(due_time_s, e))?;

            queue.push_back(ScriptedMsg { due_time_s, msg });
        }

        if queue.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        Ok(ScriptInterpreter {
            script_path: None,
            msgs: queue,
        })
    }

    /// Return the messages due at the current session time.
    pub fn get_pending_msgs(&mut self) -> PendingMsgs {
        self.get_pending_msgs_at(get_elapsed_seconds())
    }

    /// Return the messages due at or before `current_time_s`.
    pub fn get_pending_msgs_at(&mut self, current_time_s: f64) -> PendingMsgs {
        if self.msgs.is_empty() {
            return PendingMsgs::EndOfScript;
        }

        let mut msgs = vec![];

        while let Some(front) = self.msgs.front() {
            if front.due_time_s > current_time_s {
                break;
            }
            if let Some(m) = self.msgs.pop_front() {
                msgs.push(m.msg);
            }
        }

        if msgs.is_empty() {
            PendingMsgs::None
        } else {
            PendingMsgs::Some(msgs)
        }
    }

    /// Get the number of messages left in the script
    pub fn get_num_msgs(&self) -> usize {
        self.msgs.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.msgs.back() {
            Some(m) => m.due_time_s,
            None => 0f64,
        }
    }

    /// Path the script was loaded from, if it came from a file
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = r#"
        0.0: {"type": "TWIST", "payload": {"linear_ms": [0, 0, 0]}};
        0.5: {"type": "GLOBAL_GOAL", "payload": {"position_m": [10, 0, 0]}};
        0.5: {"type": "TWIST", "payload": {"linear_ms": [1, 0, 0]}};
        2: {"type": "TWIST", "payload": {"linear_ms": [2, 0, 0]}};
    "#;

    #[test]
    fn test_pending_msgs() {
        let mut si = ScriptInterpreter::from_str(SCRIPT).unwrap();
        assert_eq!(si.get_num_msgs(), 4);
        assert_eq!(si.get_duration(), 2.0);

        match si.get_pending_msgs_at(0.1) {
            PendingMsgs::Some(m) => assert_eq!(m.len(), 1),
            _ => panic!("Expected one message"),
        }
        assert!(matches!(si.get_pending_msgs_at(0.2), PendingMsgs::None));
        match si.get_pending_msgs_at(0.5) {
            PendingMsgs::Some(m) => {
                assert_eq!(m[0].type_name(), "GLOBAL_GOAL");
                assert_eq!(m[1].type_name(), "TWIST");
            }
            _ => panic!("Expected two messages"),
        }
        assert!(matches!(si.get_pending_msgs_at(5.0), PendingMsgs::Some(_)));
        assert!(matches!(
            si.get_pending_msgs_at(6.0),
            PendingMsgs::EndOfScript
        ));
    }

    #[test]
    fn test_bad_scripts() {
        assert!(matches!(
            ScriptInterpreter::from_str("nothing here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::from_str(r#"1.0: {"type": "NOPE", "payload": {}};"#),
            Err(ScriptError::InvalidMsg(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::from_str(
                "2.0: {\"type\": \"TWIST\", \"payload\": {\"linear_ms\": [0, 0, 0]}};\n\
                 1.0: {\"type\": \"TWIST\", \"payload\": {\"linear_ms\": [0, 0, 0]}};"
            ),
            Err(ScriptError::OutOfOrder(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::new("/does/not/exist.txt"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
