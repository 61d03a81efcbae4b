/*!
Backend process lifecycle.

[`Backend`] owns the single backend process: it starts it, publishes what it
prints, and terminates its whole process tree on request.

- `host.rs` - `ProcessHost` / `ChildProcess` seam to the OS
- `os.rs` - `std::process` implementation with tree-scoped signals
- `monitor.rs` - output readers and the exit watcher (with escalation)
- `relay.rs` - stdin writer for the bridge relay

# Example

```ignore
let backend = Backend::new(BackendConfig::bundled(&install_dir));
let mut events = backend.subscribe();

backend.start()?;
backend.send(&json!({ "cmd": "ping" }))?;

while let Ok(event) = events.recv().await {
    // handle event
}

backend.terminate(); // no-op if nothing is running
```
*/

mod host;
mod monitor;
mod os;
mod relay;

pub use host::{ChildProcess, ProcessHost};
pub use os::{OsChild, OsProcessHost};

use async_broadcast::{InactiveReceiver, Receiver, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::bridge;
use crate::config::BackendConfig;
use crate::types::{
  BackendEvent, BackendExit, BackendState, ProcessId, Signal, TerminationRequest, TetherError,
  TetherResult,
};
use monitor::OutputStream;
use relay::Relay;

const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Manager for the one backend process of an application.
///
/// Clone is cheap (Arc bump). All clones manage the same process.
pub struct Backend<P: ProcessHost = OsProcessHost> {
  inner: Arc<Inner<P>>,
}

impl<P: ProcessHost> Clone for Backend<P> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<P: ProcessHost> std::fmt::Debug for Backend<P> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Backend")
      .field("program", &self.inner.config.program())
      .field("state", &self.state())
      .finish_non_exhaustive()
  }
}

pub(crate) struct Inner<P> {
  host: P,
  pub(crate) config: BackendConfig,
  slot: Mutex<Slot>,
  events_tx: Sender<BackendEvent>,
  events_keepalive: InactiveReceiver<BackendEvent>,
}

/// Mutable lifecycle state. Never held across an OS call.
#[derive(Debug, Default)]
struct Slot {
  state: BackendState,
  /// Termination arrived while the spawn was in flight.
  stop_on_start: bool,
  /// When a graceful termination turns into a forceful one.
  stop_deadline: Option<Instant>,
  escalated: bool,
  relay: Option<Relay>,
  last_exit: Option<BackendExit>,
}

impl Backend<OsProcessHost> {
  /// Manager for real OS processes.
  pub fn new(config: BackendConfig) -> Self {
    Self::with_host(OsProcessHost, config)
  }
}

impl<P: ProcessHost> Backend<P> {
  /// Manager using a custom process host.
  pub fn with_host(host: P, config: BackendConfig) -> Self {
    let (mut tx, rx) = async_broadcast::broadcast(EVENT_CHANNEL_CAPACITY);
    tx.set_overflow(true); // Drop oldest messages when full

    Self {
      inner: Arc::new(Inner {
        host,
        config,
        slot: Mutex::new(Slot::default()),
        events_tx: tx,
        events_keepalive: rx.deactivate(),
      }),
    }
  }

  /// Launch the backend.
  ///
  /// Only allowed while idle; a second call while a backend is starting,
  /// running or stopping is rejected and leaves that process alone.
  /// Spawn failures are logged and published as `SpawnFailed`, never retried.
  pub fn start(&self) -> TetherResult<ProcessId> {
    self.inner.slot_mut(|slot| {
      if !slot.state.is_idle() {
        return Err(TetherError::AlreadyStarted(slot.state));
      }
      slot.state = BackendState::Starting;
      slot.stop_on_start = false;
      Ok(())
    })?;

    let config = &self.inner.config;
    let program = config.program().display().to_string();
    log::info!("Starting backend: {program}");

    let mut child = match self.inner.host.spawn(config) {
      Ok(child) => child,
      Err(source) => {
        log::error!("Failed to start backend {program}: {source}");
        self.inner.slot_mut(|slot| slot.state = BackendState::Idle);
        self.inner.emit(BackendEvent::SpawnFailed {
          program: program.clone(),
          reason: source.to_string(),
        });
        return Err(TetherError::Spawn { program, source });
      }
    };

    let pid = child.id();
    log::info!("Backend started (pid {pid})");
    self.inner.emit(BackendEvent::Started { pid });

    let relay = if config.relay_enabled() {
      child.take_stdin().map(|stdin| Relay::spawn(pid, stdin))
    } else {
      None
    };
    let readers = [
      monitor::watch_output(&self.inner, pid, child.take_stdout(), OutputStream::Stdout),
      monitor::watch_output(&self.inner, pid, child.take_stderr(), OutputStream::Stderr),
    ]
    .into_iter()
    .flatten()
    .collect();

    let stop_now = self.inner.slot_mut(|slot| {
      slot.state = BackendState::Running(pid);
      slot.relay = relay;
      slot.stop_deadline = None;
      slot.escalated = false;
      std::mem::take(&mut slot.stop_on_start)
    });

    monitor::watch_exit(&self.inner, child, readers);

    if stop_now {
      log::info!("Termination was requested while backend {pid} was starting");
      self.terminate();
    }

    Ok(pid)
  }

  /// Ask the backend's whole process tree to shut down.
  ///
  /// Returns immediately. Returns `true` if a request was issued, `false` if
  /// there was nothing to terminate (idle, or already stopping). If the tree
  /// is still alive after the grace period it is killed forcefully.
  pub fn terminate(&self) -> bool {
    let (pid, relay) = self.inner.slot_mut(|slot| match slot.state {
      BackendState::Running(pid) => {
        slot.state = BackendState::Stopping(pid);
        slot.stop_deadline = Some(Instant::now() + self.inner.config.grace());
        slot.escalated = false;
        (Some(pid), slot.relay.take())
      }
      BackendState::Starting => {
        slot.stop_on_start = true;
        (None, None)
      }
      BackendState::Idle | BackendState::Stopping(_) => (None, None),
    });
    // Closes the backend's stdin outside the lock.
    drop(relay);

    let Some(pid) = pid else {
      log::debug!("Backend termination requested with no running process; nothing to do");
      return false;
    };

    log::info!("Terminating backend process tree (pid {pid})");
    self.inner.request_termination(pid, Signal::Graceful);
    true
  }

  /// Send a payload to the backend over the bridge relay.
  pub fn send(&self, payload: &Value) -> TetherResult<()> {
    if !self.inner.config.relay_enabled() {
      return Err(TetherError::RelayDisabled);
    }
    let line = bridge::encode_line(payload)?;
    self.inner.slot_mut(|slot| match &slot.relay {
      Some(relay) => relay.send(line),
      None => Err(TetherError::NotRunning),
    })
  }

  /// Block until the backend is idle or `timeout` passes. Returns whether it is idle.
  ///
  /// Only meant for the final exit hook, where the host process is about to end.
  pub fn wait_for_exit(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
      if self.state().is_idle() {
        return true;
      }
      let now = Instant::now();
      if now >= deadline {
        return false;
      }
      thread::sleep(self.inner.config.interval().min(deadline - now));
    }
  }

  /// Subscribe to backend events.
  pub fn subscribe(&self) -> Receiver<BackendEvent> {
    self.inner.events_keepalive.activate_cloned()
  }

  /// Current lifecycle state.
  pub fn state(&self) -> BackendState {
    self.inner.slot.lock().state
  }

  /// Process id of the live backend, if any.
  pub fn pid(&self) -> Option<ProcessId> {
    self.state().pid()
  }

  /// Whether a backend process exists (running or stopping).
  pub fn is_live(&self) -> bool {
    self.pid().is_some()
  }

  /// How the most recent backend process ended.
  pub fn last_exit(&self) -> Option<BackendExit> {
    self.inner.slot.lock().last_exit
  }

  /// Launch configuration.
  pub fn config(&self) -> &BackendConfig {
    &self.inner.config
  }
}

impl<P: ProcessHost> Inner<P> {
  /// Mutate state. Never call host functions inside the closure.
  #[inline]
  fn slot_mut<R>(&self, f: impl FnOnce(&mut Slot) -> R) -> R {
    f(&mut self.slot.lock())
  }

  pub(crate) fn emit(&self, event: BackendEvent) {
    drop(self.events_tx.try_broadcast(event));
  }

  /// Issue one tree-scoped request. Failures are logged, never raised.
  pub(crate) fn request_termination(&self, pid: ProcessId, signal: Signal) {
    self.emit(BackendEvent::Terminating { pid, signal });
    if let Err(e) = self.host.terminate(TerminationRequest::tree(pid, signal)) {
      log::warn!("{signal:?} termination of backend tree {pid} failed: {e}");
    }
  }

  /// Whether the watcher should escalate now. True at most once per stop.
  pub(crate) fn escalation_due(&self, pid: ProcessId) -> bool {
    self.slot_mut(|slot| {
      let due = slot.state == BackendState::Stopping(pid)
        && !slot.escalated
        && slot.stop_deadline.is_some_and(|d| Instant::now() >= d);
      if due {
        slot.escalated = true;
        log::warn!(
          "Backend {pid} still running {:?} after termination request; killing process tree",
          self.config.grace()
        );
      }
      due
    })
  }

  /// Whether a stop for `pid` is in progress.
  pub(crate) fn stopping(&self, pid: ProcessId) -> bool {
    self.slot.lock().state == BackendState::Stopping(pid)
  }

  /// Whether the forceful request for the current stop went out.
  pub(crate) fn escalated(&self) -> bool {
    self.slot.lock().escalated
  }

  /// Whether members of the tree rooted at `pid` remain. Errors count as gone.
  pub(crate) fn tree_alive(&self, pid: ProcessId) -> bool {
    self.host.tree_alive(pid).unwrap_or_else(|e| {
      log::warn!("Failed to check backend tree {pid}: {e}");
      false
    })
  }

  /// Record an observed exit and clear the handle.
  pub(crate) fn finish(&self, pid: ProcessId, exit: BackendExit) {
    let relay = self.slot_mut(|slot| {
      if slot.state.pid() == Some(pid) {
        slot.state = BackendState::Idle;
      }
      slot.last_exit = Some(exit);
      slot.stop_deadline = None;
      slot.escalated = false;
      slot.relay.take()
    });
    drop(relay);

    log::info!("Backend process {pid} exited with {exit}");
    self.emit(BackendEvent::Exited { pid, exit });
  }
}
