/*!
Process host abstraction.

The backend manager only talks to the OS through these traits. The real
implementation lives in `os.rs`; tests substitute scripted hosts that record
every spawn and termination request.
*/

use std::io::{self, Read, Write};

use crate::config::BackendConfig;
use crate::types::{BackendExit, ProcessId, TerminationRequest};

/// Spawns backend processes and delivers termination requests.
pub trait ProcessHost: Send + Sync + 'static {
  /// Handle to a spawned process.
  type Child: ChildProcess;

  /// Launch the configured executable. Must not block on the child.
  fn spawn(&self, config: &BackendConfig) -> io::Result<Self::Child>;

  /// Deliver a termination request. Returns immediately.
  ///
  /// A target that no longer exists is success, not an error.
  fn terminate(&self, request: TerminationRequest) -> io::Result<()>;

  /// Whether any process of the tree rooted at `pid` is still running.
  ///
  /// Asked after the root itself has exited, so members can outlive it.
  fn tree_alive(&self, pid: ProcessId) -> io::Result<bool>;
}

/// A spawned process, owned by the manager's exit watcher.
pub trait ChildProcess: Send + 'static {
  /// OS process id.
  fn id(&self) -> ProcessId;

  /// Take the stdin pipe, if one was opened.
  fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>>;

  /// Take the stdout pipe, if one was opened.
  fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;

  /// Take the stderr pipe, if one was opened.
  fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>>;

  /// Non-blocking exit check.
  fn try_wait(&mut self) -> io::Result<Option<BackendExit>>;
}
