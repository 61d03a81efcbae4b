//! Capability bridge between window content and the backend.

use async_broadcast::RecvError;
use serde_json::Value;
use tauri::{AppHandle, Emitter, State};
use tether::bridge::RECEIVE_EVENT;
use tether::Backend;

use crate::AppShell;

/// `sendToPython(data)`: relay a payload to the backend's stdin.
#[tauri::command]
#[allow(clippy::needless_pass_by_value)]
pub fn send_to_python(shell: State<'_, AppShell>, data: Value) -> Result<(), String> {
    shell.backend().send(&data).map_err(|e| {
        log::warn!("Dropped message for backend: {e}");
        e.to_string()
    })
}

/// Emit every backend stdout line to the content as `receive-from-python`.
pub fn forward_backend_output(app: &AppHandle, backend: &Backend) {
    let app = app.clone();
    let mut events = backend.subscribe();

    tauri::async_runtime::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Some(message) = event.bridge_message() else {
                        continue;
                    };
                    if let Err(e) = app.emit(RECEIVE_EVENT, message) {
                        log::warn!("Failed to deliver backend message: {e}");
                    }
                }
                Err(RecvError::Overflowed(skipped)) => {
                    log::warn!("Bridge lagging; skipped {skipped} backend events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
