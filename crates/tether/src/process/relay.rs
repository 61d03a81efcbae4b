/*! Outbound half of the bridge: a writer thread feeding the backend's stdin. */

use std::io::Write;
use std::thread;

use tokio::sync::mpsc;

use crate::types::{ProcessId, TetherError, TetherResult};

/// Queue of encoded lines for one backend's stdin.
///
/// Dropping the relay closes the queue; the writer thread then drops the pipe,
/// which the backend sees as end of input.
#[derive(Debug)]
pub(crate) struct Relay {
  tx: mpsc::UnboundedSender<String>,
}

impl Relay {
  pub(crate) fn spawn(pid: ProcessId, mut stdin: Box<dyn Write + Send>) -> Self {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let spawned = thread::Builder::new()
      .name(format!("backend-stdin-{pid}"))
      .spawn(move || {
        while let Some(line) = rx.blocking_recv() {
          if let Err(e) = stdin.write_all(line.as_bytes()).and_then(|()| stdin.flush()) {
            log::warn!("Failed to write to backend {pid} stdin: {e}");
            break;
          }
        }
        log::debug!("Stdin relay for backend {pid} closed");
      });

    if let Err(e) = spawned {
      log::error!("Failed to start stdin relay for backend {pid}: {e}");
    }

    Self { tx }
  }

  pub(crate) fn send(&self, line: String) -> TetherResult<()> {
    self
      .tx
      .send(line)
      .map_err(|_| TetherError::Relay("backend stdin is closed".to_string()))
  }
}
