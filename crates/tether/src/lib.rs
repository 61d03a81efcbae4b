/*!
Tether - ties a backend child process to a desktop window's lifetime.

```ignore
use tether::{Backend, BackendConfig, Shell, ShellConfig};

let backend = Backend::new(BackendConfig::from_env_or_bundled(&install_dir));
let shell = Shell::new(my_window_host, backend, ShellConfig::default());

// Drive it from the host's event loop
shell.on_ready();           // spawn backend, then open the window
shell.on_activate();        // reopen a window if none is open
shell.on_window_closed(id); // terminate the backend tree
shell.on_before_quit();     // terminate again (no-op if already stopping)
shell.on_will_quit();       // terminate, wait for the tree to exit
```

Backend output and lifecycle changes are published as events:

```ignore
let mut events = shell.backend().subscribe();
while let Ok(event) = events.recv().await {
    if let Some(message) = event.bridge_message() {
        // forward to the content
    }
}
```
*/

pub mod bridge;
mod config;
mod process;
mod shell;

mod types;
pub use types::*;

pub use crate::config::{
  platform_keeps_resident, BackendConfig, ShellConfig, WindowSpec, BACKEND_ENV_VAR,
  BACKEND_EXECUTABLE, CONTENT_DOCUMENT,
};
pub use crate::process::{Backend, ChildProcess, OsChild, OsProcessHost, ProcessHost};
pub use crate::shell::{Shell, WindowHost};
