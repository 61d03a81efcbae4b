/*! Backend lifecycle state. */

use super::ProcessId;
use serde::Serialize;
use std::fmt;
use ts_rs::TS;

/// Where the backend is in its lifecycle.
///
/// `Idle -> Starting -> Running -> Stopping -> Idle`. A failed spawn goes
/// straight from `Starting` back to `Idle`, and so does a backend that exits
/// on its own while `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[serde(tag = "state", content = "pid", rename_all = "snake_case")]
#[ts(export)]
pub enum BackendState {
  /// No process. `start()` is allowed.
  #[default]
  Idle,
  /// Spawn in flight.
  Starting,
  /// Process is live.
  Running(ProcessId),
  /// Termination requested; waiting for the tree to exit.
  Stopping(ProcessId),
}

impl BackendState {
  /// Process id of the live backend, if any.
  pub const fn pid(&self) -> Option<ProcessId> {
    match self {
      Self::Running(pid) | Self::Stopping(pid) => Some(*pid),
      Self::Idle | Self::Starting => None,
    }
  }

  /// Whether `start()` may be called.
  pub const fn is_idle(&self) -> bool {
    matches!(self, Self::Idle)
  }
}

impl fmt::Display for BackendState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Idle => f.write_str("idle"),
      Self::Starting => f.write_str("starting"),
      Self::Running(pid) => write!(f, "running (pid {pid})"),
      Self::Stopping(pid) => write!(f, "stopping (pid {pid})"),
    }
  }
}
