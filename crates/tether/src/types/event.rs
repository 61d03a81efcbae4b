/*! Events published by the backend while it runs. */

use super::{ProcessId, Signal};
use crate::bridge::BridgeMessage;
use serde::Serialize;
use std::fmt;
use ts_rs::TS;

/// How a backend process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[ts(export)]
pub struct BackendExit {
  /// Exit code. None when the process was killed by a signal or the status
  /// could not be read.
  pub code: Option<i32>,
  /// Terminating signal number (Unix only).
  pub signal: Option<i32>,
}

impl BackendExit {
  /// Exit with a plain status code.
  pub const fn code(code: i32) -> Self {
    Self {
      code: Some(code),
      signal: None,
    }
  }

  /// Exit caused by a signal.
  pub const fn signaled(signal: i32) -> Self {
    Self {
      code: None,
      signal: Some(signal),
    }
  }

  /// Whether the process reported success.
  pub const fn success(&self) -> bool {
    matches!(self.code, Some(0))
  }
}

impl fmt::Display for BackendExit {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.code, self.signal) {
      (Some(code), _) => write!(f, "code {code}"),
      (None, Some(signal)) => write!(f, "signal {signal}"),
      (None, None) => f.write_str("unknown status"),
    }
  }
}

/// Events emitted over the lifetime of a backend process.
///
/// For a given pid, `Exited` is always the last event.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export)]
pub enum BackendEvent {
  #[serde(rename = "backend:started")]
  Started { pid: ProcessId },

  #[serde(rename = "backend:spawn_failed")]
  SpawnFailed { program: String, reason: String },

  #[serde(rename = "backend:stdout")]
  Stdout { pid: ProcessId, line: String },

  #[serde(rename = "backend:stderr")]
  Stderr { pid: ProcessId, line: String },

  #[serde(rename = "backend:terminating")]
  Terminating { pid: ProcessId, signal: Signal },

  #[serde(rename = "backend:exited")]
  Exited { pid: ProcessId, exit: BackendExit },
}

impl BackendEvent {
  /// Process the event belongs to. None for spawn failures.
  pub const fn pid(&self) -> Option<ProcessId> {
    match self {
      Self::Started { pid }
      | Self::Stdout { pid, .. }
      | Self::Stderr { pid, .. }
      | Self::Terminating { pid, .. }
      | Self::Exited { pid, .. } => Some(*pid),
      Self::SpawnFailed { .. } => None,
    }
  }

  /// Inbound bridge message carried by a stdout line.
  pub fn bridge_message(&self) -> Option<BridgeMessage> {
    match self {
      Self::Stdout { pid, line } => BridgeMessage::from_line(*pid, line),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn exit_display() {
    assert_eq!(BackendExit::code(3).to_string(), "code 3");
    assert_eq!(BackendExit::signaled(15).to_string(), "signal 15");
    assert_eq!(BackendExit::default().to_string(), "unknown status");
  }

  #[test]
  fn exit_success_only_for_zero() {
    assert!(BackendExit::code(0).success());
    assert!(!BackendExit::code(1).success());
    assert!(!BackendExit::signaled(9).success());
  }

  #[test]
  fn events_serialize_with_namespaced_tag() {
    let event = BackendEvent::Exited {
      pid: ProcessId(10),
      exit: BackendExit::code(0),
    };
    assert_eq!(
      serde_json::to_value(&event).unwrap(),
      json!({ "event": "backend:exited", "data": { "pid": 10, "exit": { "code": 0, "signal": null } } })
    );
  }

  #[test]
  fn only_stdout_carries_bridge_messages() {
    let stdout = BackendEvent::Stdout {
      pid: ProcessId(1),
      line: r#"{"temp":21.5}"#.to_string(),
    };
    let message = stdout.bridge_message().unwrap();
    assert_eq!(message.data, json!({ "temp": 21.5 }));

    let stderr = BackendEvent::Stderr {
      pid: ProcessId(1),
      line: "warning".to_string(),
    };
    assert!(stderr.bridge_message().is_none());
  }

  #[test]
  fn spawn_failure_has_no_pid() {
    let event = BackendEvent::SpawnFailed {
      program: "server".to_string(),
      reason: "not found".to_string(),
    };
    assert_eq!(event.pid(), None);
  }
}
