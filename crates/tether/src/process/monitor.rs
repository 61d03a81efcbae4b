/*!
Observers attached to a running backend.

Each backend gets one reader thread per output stream and one exit watcher.
All of them belong to that process: readers stop at end of stream, the
watcher stops once the exit is recorded. They only log and publish events.
The watcher also performs the forceful escalation when a graceful
termination outlives the grace period. The root exiting does not end a stop:
while other members of its tree remain, the watcher keeps escalating. `Exited`
is published once the tree is gone and the readers have drained, waiting at
most one grace period for each.
*/

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::host::{ChildProcess, ProcessHost};
use super::Inner;
use crate::types::{BackendEvent, BackendExit, ProcessId, Signal};

/// Which output stream a reader follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputStream {
  Stdout,
  Stderr,
}

impl OutputStream {
  const fn name(self) -> &'static str {
    match self {
      Self::Stdout => "stdout",
      Self::Stderr => "stderr",
    }
  }
}

/// Follow one output stream line by line until it closes.
pub(crate) fn watch_output<P: ProcessHost>(
  inner: &Arc<Inner<P>>,
  pid: ProcessId,
  stream: Option<Box<dyn Read + Send>>,
  kind: OutputStream,
) -> Option<JoinHandle<()>> {
  let stream = stream?;
  let inner = Arc::clone(inner);

  let spawned = thread::Builder::new()
    .name(format!("backend-{}-{pid}", kind.name()))
    .spawn(move || {
      let mut reader = BufReader::new(stream);
      let mut buf = Vec::new();
      loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
          Ok(0) => break,
          Ok(_) => {
            let line = String::from_utf8_lossy(&buf)
              .trim_end_matches(['\r', '\n'])
              .to_string();
            inner.emit(output_event(kind, pid, line));
          }
          Err(e) if e.kind() == ErrorKind::Interrupted => {}
          Err(e) => {
            log::debug!("Backend {pid} {} closed: {e}", kind.name());
            break;
          }
        }
      }
    });

  spawned
    .inspect_err(|e| log::error!("Failed to watch backend {pid} {}: {e}", kind.name()))
    .ok()
}

fn output_event(kind: OutputStream, pid: ProcessId, line: String) -> BackendEvent {
  match kind {
    OutputStream::Stdout => {
      log::info!("stdout: {line}");
      BackendEvent::Stdout { pid, line }
    }
    OutputStream::Stderr => {
      log::warn!("stderr: {line}");
      BackendEvent::Stderr { pid, line }
    }
  }
}

/// Poll the child until it exits, escalating a stalled termination.
pub(crate) fn watch_exit<P: ProcessHost>(
  inner: &Arc<Inner<P>>,
  mut child: P::Child,
  readers: Vec<JoinHandle<()>>,
) {
  let pid = child.id();
  let inner = Arc::clone(inner);

  let spawned = thread::Builder::new()
    .name(format!("backend-exit-{pid}"))
    .spawn(move || {
      let exit = loop {
        match child.try_wait() {
          Ok(Some(exit)) => break exit,
          Ok(None) => {}
          Err(e) => {
            log::error!("Failed to poll backend process {pid}: {e}");
            break BackendExit::default();
          }
        }

        if inner.escalation_due(pid) {
          inner.request_termination(pid, Signal::Forceful);
        }

        thread::sleep(inner.config.interval());
      };

      if inner.stopping(pid) {
        await_tree(&inner, pid);
      }

      let drain_deadline = Instant::now() + inner.config.grace();
      while readers.iter().any(|r| !r.is_finished()) && Instant::now() < drain_deadline {
        thread::sleep(inner.config.interval());
      }

      inner.finish(pid, exit);
    });

  if let Err(e) = spawned {
    log::error!("Failed to watch backend process {pid} for exit: {e}");
  }
}

/// Wait for the rest of a stopping tree after its root exited.
///
/// Members still present at the stop deadline get the forceful request.
/// After that the wait is bounded by one more grace period, since unreaped
/// zombies keep a group visible.
fn await_tree<P: ProcessHost>(inner: &Arc<Inner<P>>, pid: ProcessId) {
  let mut give_up = None;
  while inner.tree_alive(pid) {
    if inner.escalation_due(pid) {
      inner.request_termination(pid, Signal::Forceful);
    }
    if inner.escalated() {
      let deadline = *give_up.get_or_insert_with(|| Instant::now() + inner.config.grace());
      if Instant::now() >= deadline {
        log::warn!("Backend tree {pid} still visible after forceful termination");
        return;
      }
    }
    thread::sleep(inner.config.interval());
  }
}
