// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use tauri::{Manager, RunEvent, WindowEvent};
use tether::{Backend, BackendConfig, Shell, ShellConfig, WindowSpec};

mod bridge;
mod windows;

use windows::TauriWindows;

type AppShell = Shell<TauriWindows>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = tauri::Builder::default()
        .setup(|app| {
            let install_dir = app.path().resource_dir()?;
            let backend = Backend::new(BackendConfig::from_env_or_bundled(&install_dir));
            bridge::forward_backend_output(app.handle(), &backend);

            let config =
                ShellConfig::default().window(WindowSpec::default().title(app.package_info().name.clone()));
            app.manage(AppShell::new(TauriWindows::new(app.handle().clone()), backend, config));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![bridge::send_to_python])
        .on_window_event(|window, event| {
            if let WindowEvent::Destroyed = event {
                let Some(id) = windows::window_id(window.label()) else {
                    return;
                };
                if let Some(shell) = window.app_handle().try_state::<AppShell>() {
                    shell.on_window_closed(id);
                }
            }
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app, event| {
        let Some(shell) = app.try_state::<AppShell>() else {
            return;
        };
        match event {
            RunEvent::Ready => shell.on_ready(),
            #[cfg(target_os = "macos")]
            RunEvent::Reopen { .. } => shell.on_activate(),
            // No exit code: the last window closed and the runtime wants to exit.
            RunEvent::ExitRequested { code: None, api, .. } => {
                api.prevent_exit();
                shell.on_all_windows_closed();
            }
            RunEvent::ExitRequested { .. } => shell.on_before_quit(),
            RunEvent::Exit => shell.on_will_quit(),
            _ => {}
        }
    });
}
