//! Window host backed by Tauri webview windows.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindowBuilder};
use tether::{TetherError, TetherResult, WindowHost, WindowId, WindowSpec};

const LABEL_PREFIX: &str = "main-";
const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

#[cfg(windows)]
const CONTENT_ORIGIN: &str = "http://tauri.localhost/";
#[cfg(not(windows))]
const CONTENT_ORIGIN: &str = "tauri://localhost/";

#[derive(Debug)]
pub struct TauriWindows {
    app: AppHandle,
    next_id: AtomicU32,
}

impl TauriWindows {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            next_id: AtomicU32::new(1),
        }
    }
}

/// Window id encoded in a window label, for windows this host created.
pub fn window_id(label: &str) -> Option<WindowId> {
    label.strip_prefix(LABEL_PREFIX)?.parse().ok().map(WindowId)
}

fn label(id: WindowId) -> String {
    format!("{LABEL_PREFIX}{id}")
}

impl WindowHost for TauriWindows {
    fn create_window(&self, spec: &WindowSpec) -> TetherResult<WindowId> {
        let id = WindowId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let blank = "about:blank"
            .parse()
            .map_err(|e| TetherError::Window(format!("{e}")))?;

        WebviewWindowBuilder::new(&self.app, label(id), WebviewUrl::External(blank))
            .title(&spec.title)
            .inner_size(spec.width, spec.height)
            .initialization_script(BRIDGE_SCRIPT)
            .build()
            .map_err(|e| TetherError::Window(e.to_string()))?;

        log::info!("Created window {id}");
        Ok(id)
    }

    fn load_content(&self, window: WindowId, content: &Path) -> TetherResult<()> {
        let path = content.to_string_lossy().replace('\\', "/");
        let load_error = |reason: String| TetherError::ContentLoad {
            path: path.clone(),
            reason,
        };

        if self.app.asset_resolver().get(path.clone()).is_none() {
            return Err(load_error("not found in bundled content".to_string()));
        }
        let webview = self
            .app
            .get_webview_window(&label(window))
            .ok_or_else(|| load_error(format!("window {window} is gone")))?;
        let url = format!("{CONTENT_ORIGIN}{path}")
            .parse()
            .map_err(|e| load_error(format!("{e}")))?;

        webview.navigate(url).map_err(|e| load_error(e.to_string()))
    }

    fn open_windows(&self) -> usize {
        self.app.webview_windows().len()
    }

    fn quit(&self) {
        self.app.exit(0);
    }
}
