use crate::ToPrettyString;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The logical identity assigned to an incoming packet.
#[derive(
  Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Role {
  /// The soil / climate node, which also carries the buzzer.
  #[serde(rename = "node1")]
  Node1,

  /// The nutrient node, reporting dissolved solids.
  #[serde(rename = "node2")]
  Node2,

  /// A packet that could not be attributed to either node.
  #[serde(rename = "unknown")]
  Unknown,
}

impl Role {
  /// Every role that is cached and hydrated, in hydration order.
  pub const KNOWN: [Role; 2] = [Role::Node1, Role::Node2];

  /// Whether packets of this role are kept in the snapshot cache.
  pub fn is_known(self) -> bool {
    self != Role::Unknown
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}",
      match self {
        Self::Node1 => "node1",
        Self::Node2 => "node2",
        Self::Unknown => "unknown",
      }
    )
  }
}

impl ToPrettyString for Role {
  /// Converts the role into a colored string ready to be logged.
  fn to_pretty_string(&self) -> String {
    match self {
      Self::Node1 => "\x1b[32mnode1\x1b[0m",
      Self::Node2 => "\x1b[34mnode2\x1b[0m",
      Self::Unknown => "\x1b[38;5;248munknown\x1b[0m",
    }
    .to_owned()
  }
}

impl FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "node1" => Ok(Self::Node1),
      "node2" => Ok(Self::Node2),
      "unknown" => Ok(Self::Unknown),
      other => Err(format!("unrecognized role '{other}'")),
    }
  }
}
