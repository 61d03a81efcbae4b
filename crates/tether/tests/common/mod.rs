//! Scripted process and window hosts that record every call.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tether::{
  Backend, BackendConfig, BackendExit, ChildProcess, ProcessHost, ProcessId, Shell, ShellConfig,
  Signal, TerminationRequest, TetherError, TetherResult, WindowHost, WindowId, WindowSpec,
};

/// Everything the stubs observed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
  Spawn(PathBuf),
  Terminate(TerminationRequest),
  CreateWindow(WindowId),
  LoadContent(WindowId, PathBuf),
  Quit,
}

#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Call>>>);

impl Recorder {
  pub fn push(&self, call: Call) {
    self.0.lock().push(call);
  }

  pub fn calls(&self) -> Vec<Call> {
    self.0.lock().clone()
  }

  pub fn spawns(&self) -> usize {
    self.count(|c| matches!(c, Call::Spawn(_)))
  }

  pub fn windows_created(&self) -> usize {
    self.count(|c| matches!(c, Call::CreateWindow(_)))
  }

  pub fn terminations(&self) -> Vec<TerminationRequest> {
    self
      .0
      .lock()
      .iter()
      .filter_map(|c| match c {
        Call::Terminate(request) => Some(*request),
        _ => None,
      })
      .collect()
  }

  pub fn terminations_with(&self, signal: Signal) -> usize {
    self
      .terminations()
      .iter()
      .filter(|r| r.signal == signal)
      .count()
  }

  fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
    self.0.lock().iter().filter(|c| f(c)).count()
  }
}

/// Shared pipe end that tests can inspect.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock()).into_owned()
  }
}

impl Write for SharedBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

/// Process host whose children exit when told to.
#[derive(Debug, Clone)]
pub struct FakeProcesses {
  recorder: Recorder,
  next_pid: Arc<AtomicU32>,
  exited: Arc<Mutex<HashSet<u32>>>,
  /// Roots whose descendants are still running.
  descendants: Arc<Mutex<HashSet<u32>>>,
  pub fail_spawn: bool,
  /// Children ignore graceful requests and only die when killed.
  pub ignore_graceful: bool,
  /// Each child leaves a descendant that ignores graceful requests.
  pub lingering_descendant: bool,
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
  pub stdin: SharedBuffer,
}

impl FakeProcesses {
  pub fn new(recorder: &Recorder) -> Self {
    Self {
      recorder: recorder.clone(),
      next_pid: Arc::new(AtomicU32::new(100)),
      exited: Arc::default(),
      descendants: Arc::default(),
      fail_spawn: false,
      ignore_graceful: false,
      lingering_descendant: false,
      stdout: Vec::new(),
      stderr: Vec::new(),
      stdin: SharedBuffer::default(),
    }
  }

  /// Make a child exit on its own.
  pub fn exit(&self, pid: ProcessId) {
    self.exited.lock().insert(pid.0);
  }
}

impl ProcessHost for FakeProcesses {
  type Child = FakeChild;

  fn spawn(&self, config: &BackendConfig) -> io::Result<FakeChild> {
    self.recorder.push(Call::Spawn(config.program().to_path_buf()));
    if self.fail_spawn {
      return Err(io::Error::new(io::ErrorKind::NotFound, "no such file"));
    }
    let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
    if self.lingering_descendant {
      self.descendants.lock().insert(pid);
    }
    Ok(FakeChild {
      pid: ProcessId(pid),
      exited: Arc::clone(&self.exited),
      stdin: Some(self.stdin.clone()),
      stdout: Some(self.stdout.clone()),
      stderr: Some(self.stderr.clone()),
    })
  }

  fn terminate(&self, request: TerminationRequest) -> io::Result<()> {
    self.recorder.push(Call::Terminate(request));
    if request.signal == Signal::Forceful || !self.ignore_graceful {
      self.exited.lock().insert(request.pid.0);
    }
    if request.signal == Signal::Forceful {
      self.descendants.lock().remove(&request.pid.0);
    }
    Ok(())
  }

  fn tree_alive(&self, pid: ProcessId) -> io::Result<bool> {
    Ok(!self.exited.lock().contains(&pid.0) || self.descendants.lock().contains(&pid.0))
  }
}

#[derive(Debug)]
pub struct FakeChild {
  pid: ProcessId,
  exited: Arc<Mutex<HashSet<u32>>>,
  stdin: Option<SharedBuffer>,
  stdout: Option<Vec<u8>>,
  stderr: Option<Vec<u8>>,
}

impl ChildProcess for FakeChild {
  fn id(&self) -> ProcessId {
    self.pid
  }

  fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>> {
    self
      .stdin
      .take()
      .map(|s| Box::new(s) as Box<dyn Write + Send>)
  }

  fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
    self
      .stdout
      .take()
      .map(|b| Box::new(Cursor::new(b)) as Box<dyn Read + Send>)
  }

  fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
    self
      .stderr
      .take()
      .map(|b| Box::new(Cursor::new(b)) as Box<dyn Read + Send>)
  }

  fn try_wait(&mut self) -> io::Result<Option<BackendExit>> {
    if self.exited.lock().contains(&self.pid.0) {
      Ok(Some(BackendExit::code(0)))
    } else {
      Ok(None)
    }
  }
}

/// Window host that tracks open windows in memory.
#[derive(Debug, Clone)]
pub struct FakeWindows {
  recorder: Recorder,
  next_id: Arc<AtomicU32>,
  open: Arc<AtomicUsize>,
  pub fail_load: bool,
}

impl FakeWindows {
  pub fn new(recorder: &Recorder) -> Self {
    Self {
      recorder: recorder.clone(),
      next_id: Arc::new(AtomicU32::new(1)),
      open: Arc::default(),
      fail_load: false,
    }
  }

  pub fn open_windows_count(&self) -> usize {
    self.open.load(Ordering::SeqCst)
  }

  /// Simulate the user closing a window.
  pub fn close(&self) {
    self.open.fetch_sub(1, Ordering::SeqCst);
  }
}

impl WindowHost for FakeWindows {
  fn create_window(&self, _spec: &WindowSpec) -> TetherResult<WindowId> {
    let id = WindowId(self.next_id.fetch_add(1, Ordering::SeqCst));
    self.open.fetch_add(1, Ordering::SeqCst);
    self.recorder.push(Call::CreateWindow(id));
    Ok(id)
  }

  fn load_content(&self, window: WindowId, content: &Path) -> TetherResult<()> {
    self
      .recorder
      .push(Call::LoadContent(window, content.to_path_buf()));
    if self.fail_load {
      return Err(TetherError::ContentLoad {
        path: content.display().to_string(),
        reason: "not bundled".to_string(),
      });
    }
    Ok(())
  }

  fn open_windows(&self) -> usize {
    self.open.load(Ordering::SeqCst)
  }

  fn quit(&self) {
    self.recorder.push(Call::Quit);
  }
}

/// Fast timings so watcher threads settle quickly.
pub fn fast_config() -> BackendConfig {
  BackendConfig::new("server")
    .poll_interval(Duration::from_millis(2))
    .grace_period(Duration::from_millis(40))
}

pub fn backend(processes: FakeProcesses) -> Backend<FakeProcesses> {
  Backend::with_host(processes, fast_config())
}

pub fn shell(
  windows: FakeWindows,
  processes: FakeProcesses,
) -> Shell<FakeWindows, FakeProcesses> {
  let config = ShellConfig::default()
    .keep_resident(false)
    .shutdown_timeout(Duration::from_secs(2));
  Shell::new(windows, backend(processes), config)
}

pub const SETTLE: Duration = Duration::from_secs(2);
