/*! Termination requests sent to the process host. */

use super::ProcessId;
use serde::Serialize;
use ts_rs::TS;

/// How hard to ask a process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Signal {
  /// Cooperative shutdown request (`SIGTERM`, `taskkill` without `/F`).
  Graceful,
  /// Non-ignorable kill (`SIGKILL`, `taskkill /F`).
  Forceful,
}

/// Which processes a termination request reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationScope {
  /// Only the process itself.
  Process,
  /// The process and every descendant it spawned.
  Tree,
}

/// A single termination request against a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationRequest {
  pub pid: ProcessId,
  pub scope: TerminationScope,
  pub signal: Signal,
}

impl TerminationRequest {
  /// Request scoped to the whole tree rooted at `pid`.
  pub const fn tree(pid: ProcessId, signal: Signal) -> Self {
    Self {
      pid,
      scope: TerminationScope::Tree,
      signal,
    }
  }
}
