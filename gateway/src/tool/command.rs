use crate::server::routes::OperatorCommandResponse;
use common::comm::command;
use jeflog::{fail, pass, warn};
use serde_json::json;

/// Tool function used to send a single operator command to node1 through a
/// running gateway.
pub fn command(server: &str, cmd: &str) -> anyhow::Result<()> {
  let client = reqwest::blocking::Client::new();
  let response = client
    .post(format!("{}/operator/command", server.trim_end_matches('/')))
    .json(&json!({ "cmd": cmd }))
    .send()?;

  let status = response.status();

  if status.is_success() {
    let relayed = response.json::<OperatorCommandResponse>()?;
    pass!(
      "Gateway relayed \x1b[1m{}\x1b[0m as opcode {:#04x}.",
      relayed.command,
      relayed.opcode
    );

    let expected = command::encode(cmd);
    if relayed.opcode != expected {
      warn!(
        "Gateway and tool disagree on the opcode of {cmd:?}: {:#04x} here.",
        expected
      );
    }
  } else {
    fail!("Gateway refused the command ({status}): {}", response.text()?);
  }

  Ok(())
}
