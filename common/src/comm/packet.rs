use super::{radio::RadioMetadata, uplink::Payload, Role};
use serde::{ser::SerializeMap, Serialize, Serializer};

/// How the role of a packet was decided.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchBasis {
  /// The device identifier equals the configured identifier of the role.
  Identity,

  /// The role was inferred from which fields the payload carries.
  Shape,

  /// Nothing matched and the packet fell through to `Role::Unknown`.
  Fallback,
}

/// An uplink after classification and enrichment, as forwarded to dashboard
/// clients and kept in the snapshot cache.
///
/// The role is decided once at ingest and never changes afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedPacket {
  /// The identifier of the device that sent the uplink.
  pub device_id: String,

  /// The role the packet was classified as.
  pub role: Role,

  /// How `role` was decided. Not forwarded to clients.
  pub basis: MatchBasis,

  /// The decoded sensor fields.
  pub payload: Payload,

  /// Link quality of the uplink.
  pub radio: RadioMetadata,

  /// Capture time as unix milliseconds, assigned at ingest.
  pub ts: u64,
}

impl ClassifiedPacket {
  /// Keys written by the gateway itself. A payload field with one of these
  /// names is shadowed by the gateway's value.
  pub const RESERVED_KEYS: [&'static str; 6] =
    ["devId", "rssi", "snr", "dataRate", "role", "ts"];
}

// flattened into a single object: {devId, ...payload, rssi, snr, dataRate, role, ts}
impl Serialize for ClassifiedPacket {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(None)?;

    map.serialize_entry("devId", &self.device_id)?;

    for (key, value) in &self.payload {
      if !Self::RESERVED_KEYS.contains(&key.as_str()) {
        map.serialize_entry(key, value)?;
      }
    }

    map.serialize_entry("rssi", &self.radio.rssi)?;
    map.serialize_entry("snr", &self.radio.snr)?;
    map.serialize_entry("dataRate", &self.radio.data_rate)?;
    map.serialize_entry("role", &self.role)?;
    map.serialize_entry("ts", &self.ts)?;
    map.end()
  }
}
