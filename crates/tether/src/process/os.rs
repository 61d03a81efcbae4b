/*!
Process host backed by `std::process`.

On Unix the backend is started as the leader of a new process group, so a
tree-scoped request signals the whole group (`kill(-pgid, ..)`). Descendants
that move themselves into another group or session are out of reach.
On Windows tree requests go through `taskkill /T`, which runs on a helper
thread. Windows cannot find the tree once its root has exited, so
`tree_alive` only reports on Unix.
*/

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};

use super::host::{ChildProcess, ProcessHost};
use crate::config::BackendConfig;
use crate::types::{BackendExit, ProcessId, TerminationRequest};

/// Process host for real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessHost;

impl ProcessHost for OsProcessHost {
  type Child = OsChild;

  fn spawn(&self, config: &BackendConfig) -> io::Result<OsChild> {
    let mut command = Command::new(config.program());
    command
      .args(config.arguments())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .stdin(if config.relay_enabled() {
        Stdio::piped()
      } else {
        Stdio::null()
      });

    if let Some(dir) = config.working_directory() {
      command.current_dir(dir);
    }

    #[cfg(unix)]
    {
      use std::os::unix::process::CommandExt;
      command.process_group(0);
    }

    command.spawn().map(OsChild)
  }

  fn terminate(&self, request: TerminationRequest) -> io::Result<()> {
    send_termination(request)
  }

  fn tree_alive(&self, pid: ProcessId) -> io::Result<bool> {
    group_alive(pid)
  }
}

/// A child spawned by [`OsProcessHost`].
#[derive(Debug)]
pub struct OsChild(Child);

impl ChildProcess for OsChild {
  fn id(&self) -> ProcessId {
    ProcessId(self.0.id())
  }

  fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>> {
    self
      .0
      .stdin
      .take()
      .map(|s| Box::new(s) as Box<dyn Write + Send>)
  }

  fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
    self
      .0
      .stdout
      .take()
      .map(|s| Box::new(s) as Box<dyn Read + Send>)
  }

  fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
    self
      .0
      .stderr
      .take()
      .map(|s| Box::new(s) as Box<dyn Read + Send>)
  }

  fn try_wait(&mut self) -> io::Result<Option<BackendExit>> {
    Ok(self.0.try_wait()?.map(exit_of))
  }
}

fn exit_of(status: ExitStatus) -> BackendExit {
  #[cfg(unix)]
  let signal = {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
  };
  #[cfg(not(unix))]
  let signal = None;

  BackendExit {
    code: status.code(),
    signal,
  }
}

/// Positive `pid_t` for `pid`. Zero and out-of-range ids would address other groups.
#[cfg(unix)]
fn signal_target(pid: ProcessId) -> io::Result<libc::pid_t> {
  libc::pid_t::try_from(pid.0)
    .ok()
    .filter(|pid| *pid > 0)
    .ok_or_else(|| {
      io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("refusing to signal process id {pid}"),
      )
    })
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn send_termination(request: TerminationRequest) -> io::Result<()> {
  use crate::types::{Signal, TerminationScope};

  let pid = signal_target(request.pid)?;

  let target = match request.scope {
    TerminationScope::Process => pid,
    TerminationScope::Tree => -pid,
  };
  let signal = match request.signal {
    Signal::Graceful => libc::SIGTERM,
    Signal::Forceful => libc::SIGKILL,
  };

  // SAFETY: kill(2) takes plain integers and touches no memory we own.
  if unsafe { libc::kill(target, signal) } == 0 {
    return Ok(());
  }

  let err = io::Error::last_os_error();
  if err.raw_os_error() == Some(libc::ESRCH) {
    log::debug!("Process {} already gone", request.pid);
    return Ok(());
  }
  Err(err)
}

/// Whether any member of the process group led by `pid` remains.
///
/// Zombies still count until they are reaped.
#[cfg(unix)]
#[allow(unsafe_code)]
fn group_alive(pid: ProcessId) -> io::Result<bool> {
  let pgid = signal_target(pid)?;

  // SAFETY: signal 0 only checks for existence and permission.
  if unsafe { libc::kill(-pgid, 0) } == 0 {
    return Ok(true);
  }

  let err = io::Error::last_os_error();
  match err.raw_os_error() {
    Some(libc::ESRCH) => Ok(false),
    // Exists, but owned by someone else.
    Some(libc::EPERM) => Ok(true),
    _ => Err(err),
  }
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn group_alive(_pid: ProcessId) -> io::Result<bool> {
  Ok(false)
}

/// `taskkill` exit code when the target process does not exist.
#[cfg(windows)]
const TASKKILL_NOT_FOUND: i32 = 128;

/// Starts `taskkill` and returns without waiting for it.
#[cfg(windows)]
fn send_termination(request: TerminationRequest) -> io::Result<()> {
  use crate::types::{Signal, TerminationScope};

  let pid = request.pid.to_string();
  let mut command = Command::new("taskkill");
  command
    .args(["/PID", &pid])
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::piped());
  if request.scope == TerminationScope::Tree {
    command.arg("/T");
  }
  if request.signal == Signal::Forceful {
    command.arg("/F");
  }

  let child = command.spawn()?;
  std::thread::Builder::new()
    .name(format!("taskkill-{pid}"))
    .spawn(move || {
      if let Err(e) = taskkill_result(child.wait_with_output()) {
        log::warn!(
          "{:?} termination of backend tree {} failed: {e}",
          request.signal,
          request.pid
        );
      }
    })?;
  Ok(())
}

#[cfg(windows)]
fn taskkill_result(output: io::Result<std::process::Output>) -> io::Result<()> {
  let output = output?;
  if output.status.success() || output.status.code() == Some(TASKKILL_NOT_FOUND) {
    return Ok(());
  }
  Err(io::Error::other(
    String::from_utf8_lossy(&output.stderr).trim().to_string(),
  ))
}

#[cfg(not(any(unix, windows)))]
fn send_termination(request: TerminationRequest) -> io::Result<()> {
  Err(io::Error::new(
    io::ErrorKind::Unsupported,
    format!("cannot terminate process {} on this platform", request.pid),
  ))
}
