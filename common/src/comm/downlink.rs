use serde::{Deserialize, Serialize};

/// The document published on
/// `v3/{app}@{tenant}/devices/{device}/down/push` to queue downlinks.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DownlinkPush {
  /// Downlinks to append to the device's queue.
  pub downlinks: Vec<Downlink>,
}

/// A single queued downlink.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Downlink {
  /// LoRaWAN FPort the payload is delivered on.
  pub f_port: u8,

  /// Base64 encoded application payload.
  pub frm_payload: String,

  /// Whether the device must acknowledge the downlink.
  pub confirmed: bool,

  /// Scheduling priority on the network server.
  pub priority: Priority,
}

/// Downlink scheduling priority.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
  Lowest,
  Low,
  BelowNormal,
  Normal,
  AboveNormal,
  High,
  Highest,
}

impl DownlinkPush {
  /// Wraps a single opcode as one unconfirmed, normal priority downlink.
  pub fn opcode(opcode: u8, f_port: u8) -> Self {
    DownlinkPush {
      downlinks: vec![Downlink {
        f_port,
        frm_payload: base64::encode([opcode]),
        confirmed: false,
        priority: Priority::Normal,
      }],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn wraps_opcode_as_unconfirmed_downlink() {
    let push = DownlinkPush::opcode(0x01, 2);

    assert_eq!(
      serde_json::to_value(&push).unwrap(),
      json!({
        "downlinks": [{
          "f_port": 2,
          "frm_payload": "AQ==",
          "confirmed": false,
          "priority": "NORMAL"
        }]
      })
    );
  }

  #[test]
  fn payload_is_a_single_byte() -> anyhow::Result<()> {
    for opcode in [0x00, 0x01, 0x02] {
      let push = DownlinkPush::opcode(opcode, 2);
      assert_eq!(base64::decode(&push.downlinks[0].frm_payload)?, vec![opcode]);
    }

    Ok(())
  }
}
