use super::{ClassifiedPacket, Command, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named realtime channel from the gateway to dashboard clients.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Channel {
  /// Packets classified as `Role::Node1`.
  #[serde(rename = "node1Data")]
  Node1Data,

  /// Packets classified as `Role::Node2`.
  #[serde(rename = "node2Data")]
  Node2Data,

  /// Legacy combined channel, kept for older dashboards.
  #[serde(rename = "sensorData")]
  SensorData,

  /// Diagnostic channel for packets that could not be classified.
  #[serde(rename = "unknownNode")]
  UnknownNode,
}

impl Channel {
  /// The channel dedicated to packets of the given role.
  pub fn for_role(role: Role) -> Self {
    match role {
      Role::Node1 => Self::Node1Data,
      Role::Node2 => Self::Node2Data,
      Role::Unknown => Self::UnknownNode,
    }
  }
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}",
      match self {
        Self::Node1Data => "node1Data",
        Self::Node2Data => "node2Data",
        Self::SensorData => "sensorData",
        Self::UnknownNode => "unknownNode",
      }
    )
  }
}

/// A single frame sent to a dashboard client, serialized as
/// `{"event": <channel>, "data": <packet>}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelMessage {
  /// The channel the packet is published on.
  pub event: Channel,

  /// The packet itself.
  pub data: ClassifiedPacket,
}

/// Body of an operator command, either inside a `buzzerCommand` frame or
/// posted to the HTTP command route.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CommandRequest {
  /// Symbolic command such as `on`, `off`, or `toggle`.
  #[serde(default)]
  pub cmd: Option<String>,
}

impl CommandRequest {
  /// The command requested. A missing or unrecognized command toggles.
  pub fn command(&self) -> Command {
    Command::parse(self.cmd.as_deref().unwrap_or_default())
  }
}

/// A frame sent from a dashboard client to the gateway.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
  /// Operator command for the buzzer on node1.
  #[serde(rename = "buzzerCommand")]
  BuzzerCommand(CommandRequest),
}
