/*!
Application shell: startup ordering and exit routing.

The shell is driven by the host's event loop. Each host signal maps to one
method:

| Host signal | Method |
|---|---|
| ready | [`Shell::on_ready`] |
| re-activated (dock/taskbar) | [`Shell::on_activate`] |
| a window was closed | [`Shell::on_window_closed`] |
| every window is closed | [`Shell::on_all_windows_closed`] |
| about to quit | [`Shell::on_before_quit`] |
| quitting now | [`Shell::on_will_quit`] |

No single host hook is guaranteed to fire exactly once on exit, so window
close, before-quit and will-quit all request backend termination.
[`Backend::terminate`] is idempotent, so the later requests are no-ops.
*/

use parking_lot::Mutex;
use std::path::Path;

use crate::config::{ShellConfig, WindowSpec};
use crate::process::{Backend, OsProcessHost, ProcessHost};
use crate::types::{TetherResult, WindowId};

/// Windowing capabilities the shell needs from the host toolkit.
pub trait WindowHost: Send + Sync + 'static {
  /// Create and show a window.
  fn create_window(&self, spec: &WindowSpec) -> TetherResult<WindowId>;

  /// Load a bundled document into a window.
  fn load_content(&self, window: WindowId, content: &Path) -> TetherResult<()>;

  /// Number of windows currently open.
  fn open_windows(&self) -> usize;

  /// Ask the host to quit. The host raises before-quit / will-quit in turn.
  fn quit(&self);
}

#[derive(Debug, Default)]
struct ShellState {
  ready: bool,
  window: Option<WindowId>,
}

/// Binds one backend process to the application's window lifetime.
pub struct Shell<W: WindowHost, P: ProcessHost = OsProcessHost> {
  windows: W,
  backend: Backend<P>,
  config: ShellConfig,
  state: Mutex<ShellState>,
}

impl<W: WindowHost, P: ProcessHost> std::fmt::Debug for Shell<W, P> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Shell")
      .field("backend", &self.backend)
      .field("state", &*self.state.lock())
      .finish_non_exhaustive()
  }
}

impl<W: WindowHost, P: ProcessHost> Shell<W, P> {
  /// Shell over a window host and a backend that has not been started.
  pub fn new(windows: W, backend: Backend<P>, config: ShellConfig) -> Self {
    Self {
      windows,
      backend,
      config,
      state: Mutex::new(ShellState::default()),
    }
  }

  /// The managed backend.
  pub const fn backend(&self) -> &Backend<P> {
    &self.backend
  }

  /// The window host.
  pub const fn windows(&self) -> &W {
    &self.windows
  }

  /// Shell configuration.
  pub const fn config(&self) -> &ShellConfig {
    &self.config
  }

  /// The window the shell last opened, while it is open.
  pub fn window(&self) -> Option<WindowId> {
    self.state.lock().window
  }

  /// The host is ready: start the backend, then open the window.
  ///
  /// A backend that fails to start does not stop the window from opening.
  /// Repeated ready signals are ignored.
  pub fn on_ready(&self) {
    let first = {
      let mut state = self.state.lock();
      !std::mem::replace(&mut state.ready, true)
    };
    if !first {
      log::debug!("Ready signaled again; ignoring");
      return;
    }

    log::info!("Application ready");
    if let Err(e) = self.backend.start() {
      log::warn!("Continuing without backend: {e}");
    }
    self.open_window();
  }

  /// The application was re-activated. Opens a window if none is open.
  ///
  /// Never starts another backend.
  pub fn on_activate(&self) {
    if !self.state.lock().ready {
      log::debug!("Activation before ready; ignoring");
      return;
    }
    if self.windows.open_windows() == 0 {
      log::info!("Re-activated with no open window");
      self.open_window();
    }
  }

  /// A window was closed by the user.
  pub fn on_window_closed(&self, window: WindowId) {
    log::info!("Window closed");
    {
      let mut state = self.state.lock();
      if state.window == Some(window) {
        state.window = None;
      }
    }
    self.backend.terminate();
  }

  /// Every window is closed. Quits unless the platform keeps apps resident.
  ///
  /// Returns whether a quit was requested.
  pub fn on_all_windows_closed(&self) -> bool {
    if self.config.keeps_resident() {
      log::debug!("All windows closed; staying resident");
      return false;
    }
    log::info!("All windows closed; quitting");
    self.windows.quit();
    true
  }

  /// The application is about to quit.
  pub fn on_before_quit(&self) {
    log::info!("App is about to quit");
    self.backend.terminate();
  }

  /// The application is quitting now.
  ///
  /// Waits (bounded) for the backend tree so escalation can finish before the
  /// host process ends.
  pub fn on_will_quit(&self) {
    log::info!("App will quit");
    self.backend.terminate();
    let timeout = self.config.shutdown_wait();
    if !self.backend.wait_for_exit(timeout) {
      log::warn!("Backend still running {timeout:?} after shutdown began");
    }
  }

  fn open_window(&self) {
    let spec = self.config.window_spec();
    let window = match self.windows.create_window(spec) {
      Ok(window) => window,
      Err(e) => {
        log::error!("Failed to create window: {e}");
        return;
      }
    };
    self.state.lock().window = Some(window);

    if let Err(e) = self.windows.load_content(window, &spec.content) {
      log::error!("Failed to load {}: {e}", spec.content.display());
    }
  }
}
