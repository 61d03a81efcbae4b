/*!
Configuration for the backend process and the application shell.

```ignore
let backend = BackendConfig::from_env_or_bundled(&install_dir)
  .grace_period(Duration::from_secs(2));

let shell = ShellConfig::default().window(WindowSpec::default().title("Sensor Dashboard"));
```
*/

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the backend executable path.
pub const BACKEND_ENV_VAR: &str = "TETHER_BACKEND";

/// File stem of the bundled backend executable.
pub const BACKEND_EXECUTABLE: &str = "server";

/// Document loaded into every window, relative to the bundled content root.
pub const CONTENT_DOCUMENT: &str = "index.html";

const DEFAULT_GRACE_PERIOD_MS: u64 = 3000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// How to launch and stop the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct BackendConfig {
  program: PathBuf,
  args: Vec<OsString>,
  working_dir: Option<PathBuf>,
  grace_period: Duration,
  poll_interval: Duration,
  relay: bool,
}

impl BackendConfig {
  /// Launch `program` with no arguments.
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      working_dir: None,
      grace_period: Duration::from_millis(DEFAULT_GRACE_PERIOD_MS),
      poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
      relay: true,
    }
  }

  /// The backend executable shipped next to the application's files.
  pub fn bundled(install_dir: &Path) -> Self {
    let file_name = format!("{BACKEND_EXECUTABLE}{}", std::env::consts::EXE_SUFFIX);
    Self::new(install_dir.join(file_name)).working_dir(install_dir)
  }

  /// Like [`BackendConfig::bundled`], unless `TETHER_BACKEND` names another executable.
  pub fn from_env_or_bundled(install_dir: &Path) -> Self {
    match std::env::var_os(BACKEND_ENV_VAR) {
      Some(program) if !program.is_empty() => {
        log::info!(
          "Using backend from {BACKEND_ENV_VAR}: {}",
          Path::new(&program).display()
        );
        Self::new(program)
      }
      _ => Self::bundled(install_dir),
    }
  }

  /// Append a command-line argument.
  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  /// Append several command-line arguments.
  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Run the backend from `dir`.
  pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.working_dir = Some(dir.into());
    self
  }

  /// How long a graceful termination may take before the tree is killed. Default: 3s.
  pub const fn grace_period(mut self, grace: Duration) -> Self {
    self.grace_period = grace;
    self
  }

  /// How often the exit watcher checks the process. Default: 50ms.
  pub const fn poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval;
    self
  }

  /// Pipe stdin/stdout through the bridge relay. Default: true.
  ///
  /// When disabled, stdin is not connected and `send` fails with `RelayDisabled`.
  pub const fn relay(mut self, enabled: bool) -> Self {
    self.relay = enabled;
    self
  }

  /// Executable to launch.
  pub fn program(&self) -> &Path {
    &self.program
  }

  /// Command-line arguments.
  pub fn arguments(&self) -> &[OsString] {
    &self.args
  }

  /// Directory the backend runs in.
  pub fn working_directory(&self) -> Option<&Path> {
    self.working_dir.as_deref()
  }

  /// Graceful termination window.
  pub const fn grace(&self) -> Duration {
    self.grace_period
  }

  /// Exit watcher poll interval.
  pub const fn interval(&self) -> Duration {
    self.poll_interval
  }

  /// Whether the bridge relay pipes stdin.
  pub const fn relay_enabled(&self) -> bool {
    self.relay
  }
}

/// Parameters for every window the shell creates.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct WindowSpec {
  /// Window title.
  pub title: String,
  /// Logical width.
  pub width: f64,
  /// Logical height.
  pub height: f64,
  /// Document to load, relative to the bundled content root.
  pub content: PathBuf,
}

impl Default for WindowSpec {
  fn default() -> Self {
    Self {
      title: "Tether".to_string(),
      width: 800.0,
      height: 600.0,
      content: PathBuf::from(CONTENT_DOCUMENT),
    }
  }
}

impl WindowSpec {
  /// Set the window title.
  pub fn title(mut self, title: impl Into<String>) -> Self {
    self.title = title.into();
    self
  }

  /// Set the window's logical size.
  pub const fn size(mut self, width: f64, height: f64) -> Self {
    self.width = width;
    self.height = height;
    self
  }

  /// Set the document loaded into the window.
  pub fn content(mut self, content: impl Into<PathBuf>) -> Self {
    self.content = content.into();
    self
  }
}

/// Shell behavior around windows and exit.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct ShellConfig {
  window: WindowSpec,
  keep_resident: bool,
  shutdown_timeout: Duration,
}

impl Default for ShellConfig {
  fn default() -> Self {
    Self {
      window: WindowSpec::default(),
      keep_resident: platform_keeps_resident(),
      shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
    }
  }
}

impl ShellConfig {
  /// Set the window spec.
  pub fn window(mut self, window: WindowSpec) -> Self {
    self.window = window;
    self
  }

  /// Keep the application running after its last window closes.
  ///
  /// Defaults to the platform convention (true on macOS only).
  pub const fn keep_resident(mut self, keep: bool) -> Self {
    self.keep_resident = keep;
    self
  }

  /// Upper bound on the wait for the backend tree at final exit. Default: 5s.
  pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
    self.shutdown_timeout = timeout;
    self
  }

  /// Spec for windows the shell opens.
  pub const fn window_spec(&self) -> &WindowSpec {
    &self.window
  }

  /// Whether the app outlives its last window.
  pub const fn keeps_resident(&self) -> bool {
    self.keep_resident
  }

  /// Bound on the final backend wait.
  pub const fn shutdown_wait(&self) -> Duration {
    self.shutdown_timeout
  }
}

/// Whether apps on this platform conventionally stay open with no windows.
pub const fn platform_keeps_resident() -> bool {
  cfg!(target_os = "macos")
}
