use serde::{Deserialize, Serialize};
use std::fmt;

/// An operator command for the buzzer on node1.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
  /// Turn the buzzer on.
  On,

  /// Turn the buzzer off.
  Off,

  /// Flip the buzzer's current state.
  Toggle,
}

impl Command {
  /// Parses a symbolic command. Anything other than `on` or `off`, including
  /// unrecognized input, is a toggle.
  pub fn parse(raw: &str) -> Self {
    match raw {
      "on" => Self::On,
      "off" => Self::Off,
      _ => Self::Toggle,
    }
  }

  /// The single-byte opcode understood by the node firmware.
  pub fn opcode(self) -> u8 {
    match self {
      Self::Off => 0x00,
      Self::On => 0x01,
      Self::Toggle => 0x02,
    }
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}",
      match self {
        Self::On => "on",
        Self::Off => "off",
        Self::Toggle => "toggle",
      }
    )
  }
}

/// Maps a symbolic command directly to its opcode.
pub fn encode(raw: &str) -> u8 {
  Command::parse(raw).opcode()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encodes_opcodes() {
    assert_eq!(encode("on"), 0x01);
    assert_eq!(encode("off"), 0x00);
    assert_eq!(encode("toggle"), 0x02);
    assert_eq!(encode("anything-else"), 0x02);
    assert_eq!(encode(""), 0x02);
  }

  #[test]
  fn parsing_is_case_sensitive() {
    assert_eq!(Command::parse("ON"), Command::Toggle);
    assert_eq!(Command::parse(" off"), Command::Toggle);
  }
}
