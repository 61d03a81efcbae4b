/*!
Wire format for the content-to-backend bridge.

The content side sees two capabilities: `sendToPython(data)` and
`receiveFromPython(callback)`. The main process relays them over the
backend's standard streams as newline-delimited UTF-8:

- outbound: each payload is written to stdin as one line of compact JSON
- inbound: each non-blank stdout line becomes one [`BridgeMessage`]. Lines
  that parse as JSON are delivered as that value, anything else as a JSON
  string holding the raw line.

There is no framing beyond the newline and no acknowledgement.
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::types::{ProcessId, TetherResult};

/// Command the content invokes to send a payload toward the backend.
pub const SEND_COMMAND: &str = "send_to_python";

/// Event the content listens on for messages from the backend.
pub const RECEIVE_EVENT: &str = "receive-from-python";

/// One inbound message from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BridgeMessage {
  /// Backend process that produced the line.
  pub pid: ProcessId,
  /// Decoded payload.
  #[ts(type = "unknown")]
  pub data: Value,
}

impl BridgeMessage {
  /// Decode one stdout line. Blank lines carry no message.
  pub fn from_line(pid: ProcessId, line: &str) -> Option<Self> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
      return None;
    }
    let data = serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(line.to_owned()));
    Some(Self { pid, data })
  }
}

/// Encode an outbound payload as a single newline-terminated line.
pub fn encode_line(payload: &Value) -> TetherResult<String> {
  let mut line = serde_json::to_string(payload)?;
  line.push('\n');
  Ok(line)
}
