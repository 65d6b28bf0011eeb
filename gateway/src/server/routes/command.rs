use crate::server::{self, downlink, Shared};
use axum::{extract::State, Json};
use common::comm::{Command, CommandRequest};
use serde::{Deserialize, Serialize};

/// Response to a relayed operator command.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OperatorCommandResponse {
  /// The command as interpreted, after defaulting to toggle.
  pub command: Command,

  /// The opcode pushed to the node.
  pub opcode: u8,
}

/// Route handler to dispatch a single manual operator command to node1.
///
/// Unlike the WebSocket path, a publish failure is reported to the caller as
/// `502 Bad Gateway`. It is still never retried.
pub async fn dispatch_operator_command(
  State(shared): State<Shared>,
  Json(request): Json<CommandRequest>,
) -> server::Result<Json<OperatorCommandResponse>> {
  let command = request.command();
  let (opcode, result) = downlink::relay_command(&shared, command).await;

  result?;

  Ok(Json(OperatorCommandResponse { command, opcode }))
}
