/*! Core types shared by the backend manager, the shell and the bridge.

TypeScript definitions are exported to `bindings/` when the tests run.
*/

#![allow(missing_docs)]

mod error;
mod event;
mod ids;
mod state;
mod termination;

pub use error::{TetherError, TetherResult};
pub use event::{BackendEvent, BackendExit};
pub use ids::{ProcessId, WindowId};
pub use state::BackendState;
pub use termination::{Signal, TerminationRequest, TerminationScope};
