use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The decoded application payload of an uplink, mapping a sensor field name
/// (such as `soil_pct` or `tds_ppm`) to its numeric or boolean value.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// The uplink document published by The Things Stack v3 on
/// `v3/{app}@{tenant}/devices/{device}/up`.
///
/// Only the parts the gateway reads are modeled. Every level is optional so
/// that a well-formed document with missing fields still deserializes, and the
/// ingest loop can tell "bad JSON" apart from "incomplete uplink".
///
/// Radio metadata never rejects a document. A null, mistyped, or out of range
/// value there only clears the affected field.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct UplinkEnvelope {
  /// Identifiers of the device that sent the uplink.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_device_ids: Option<EndDeviceIds>,

  /// The uplink itself, including the decoded payload and radio metadata.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uplink_message: Option<UplinkMessage>,
}

/// Identifiers of an end device.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct EndDeviceIds {
  /// The application-scoped device identifier, such as `node1`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub device_id: Option<String>,
}

/// The `uplink_message` section of an uplink document.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct UplinkMessage {
  /// Output of the application's payload formatter.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub decoded_payload: Option<Payload>,

  /// One record per gateway that heard the uplink.
  #[serde(
    default,
    deserialize_with = "lenient_list",
    skip_serializing_if = "Vec::is_empty"
  )]
  pub rx_metadata: Vec<RxMetadata>,

  /// Transmission settings used by the device.
  #[serde(
    default,
    deserialize_with = "lenient",
    skip_serializing_if = "Option::is_none"
  )]
  pub settings: Option<TxSettings>,
}

/// Reception metadata reported by a single gateway.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RxMetadata {
  /// Received signal strength, in dBm.
  #[serde(
    default,
    deserialize_with = "lenient_number",
    skip_serializing_if = "Option::is_none"
  )]
  pub rssi: Option<f64>,

  /// Signal-to-noise ratio, in dB.
  #[serde(
    default,
    deserialize_with = "lenient_number",
    skip_serializing_if = "Option::is_none"
  )]
  pub snr: Option<f64>,
}

/// Transmission settings of an uplink.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct TxSettings {
  /// The data rate the uplink was sent at.
  #[serde(
    default,
    deserialize_with = "lenient",
    skip_serializing_if = "Option::is_none"
  )]
  pub data_rate: Option<DataRate>,
}

/// Data rate of an uplink. Only LoRa modulation is modeled.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DataRate {
  /// LoRa modulation parameters.
  #[serde(
    default,
    deserialize_with = "lenient",
    skip_serializing_if = "Option::is_none"
  )]
  pub lora: Option<LoraDataRate>,
}

/// LoRa physical-layer parameters.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct LoraDataRate {
  /// Spreading factor, 7 through 12.
  #[serde(
    default,
    deserialize_with = "lenient_whole",
    skip_serializing_if = "Option::is_none"
  )]
  pub spreading_factor: Option<u32>,

  /// Channel bandwidth, in Hz.
  #[serde(
    default,
    deserialize_with = "lenient_whole",
    skip_serializing_if = "Option::is_none"
  )]
  pub bandwidth: Option<u32>,
}

/// Deserializes a section of radio metadata, yielding `None` instead of an
/// error when the section does not have the expected shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  let value = Value::deserialize(deserializer)?;
  Ok(serde_json::from_value(value).ok())
}

/// Deserializes a list of records. Anything other than an array is empty, and
/// a malformed record keeps its place with every field absent, so that the
/// first record is still the first reception.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned + Default,
{
  let Value::Array(records) = Value::deserialize(deserializer)? else {
    return Ok(Vec::new());
  };

  Ok(
    records
      .into_iter()
      .map(|record| serde_json::from_value(record).unwrap_or_default())
      .collect(),
  )
}

/// Deserializes a number that may also arrive as a numeric string.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(number(&Value::deserialize(deserializer)?))
}

/// Deserializes a non-negative whole number, accepting `125000.0` as well as
/// `125000` or `"125000"`.
fn lenient_whole<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
  D: Deserializer<'de>,
{
  let whole = number(&Value::deserialize(deserializer)?)
    .filter(|number| number.fract() == 0.0)
    .filter(|number| (0.0..=u32::MAX as f64).contains(number))
    .map(|number| number as u32);

  Ok(whole)
}

fn number(value: &Value) -> Option<f64> {
  match value {
    Value::String(raw) => raw.trim().parse::<f64>().ok(),
    other => other.as_f64(),
  }
  .filter(|number| number.is_finite())
}

impl UplinkEnvelope {
  /// Parses an uplink document from the raw bytes of an MQTT publish.
  pub fn from_slice(raw: &[u8]) -> serde_json::Result<Self> {
    serde_json::from_slice(raw)
  }

  /// The sending device's identifier, if present and non-empty.
  pub fn device_id(&self) -> Option<&str> {
    self
      .end_device_ids
      .as_ref()
      .and_then(|ids| ids.device_id.as_deref())
      .filter(|id| !id.is_empty())
  }

  /// The decoded payload, if the application's formatter produced one.
  pub fn decoded_payload(&self) -> Option<&Payload> {
    self
      .uplink_message
      .as_ref()
      .and_then(|uplink| uplink.decoded_payload.as_ref())
  }

  /// The first gateway reception record. Multiple receptions are not
  /// aggregated.
  pub fn first_reception(&self) -> Option<&RxMetadata> {
    self
      .uplink_message
      .as_ref()
      .and_then(|uplink| uplink.rx_metadata.first())
  }

  /// The LoRa data rate the uplink was sent at.
  pub fn lora_data_rate(&self) -> Option<&LoraDataRate> {
    self
      .uplink_message
      .as_ref()
      .and_then(|uplink| uplink.settings.as_ref())
      .and_then(|settings| settings.data_rate.as_ref())
      .and_then(|data_rate| data_rate.lora.as_ref())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn parses_full_uplink() {
    let raw = json!({
      "end_device_ids": { "device_id": "node1", "application_ids": { "application_id": "hydro" } },
      "received_at": "2024-05-01T12:00:00Z",
      "uplink_message": {
        "f_port": 1,
        "decoded_payload": { "soil_pct": 41, "temp_c": 22.5, "buzzer": false },
        "rx_metadata": [
          { "gateway_ids": { "gateway_id": "gw-a" }, "rssi": -87, "snr": 9.25 },
          { "gateway_ids": { "gateway_id": "gw-b" }, "rssi": -110, "snr": -3.0 }
        ],
        "settings": {
          "data_rate": { "lora": { "bandwidth": 125000, "spreading_factor": 7, "coding_rate": "4/5" } },
          "frequency": "868100000"
        }
      }
    })
    .to_string();

    let envelope = UplinkEnvelope::from_slice(raw.as_bytes()).unwrap();

    assert_eq!(envelope.device_id(), Some("node1"));
    assert_eq!(envelope.decoded_payload().unwrap().len(), 3);
    assert_eq!(envelope.first_reception().unwrap().rssi, Some(-87.0));

    let lora = envelope.lora_data_rate().unwrap();
    assert_eq!(lora.spreading_factor, Some(7));
    assert_eq!(lora.bandwidth, Some(125_000));
  }

  #[test]
  fn missing_sections_still_parse() {
    let envelope =
      UplinkEnvelope::from_slice(br#"{"end_device_ids":{"device_id":""}}"#)
        .unwrap();

    assert_eq!(envelope.device_id(), None);
    assert!(envelope.decoded_payload().is_none());
    assert!(envelope.first_reception().is_none());
    assert!(envelope.lora_data_rate().is_none());
  }

  #[test]
  fn odd_radio_sections_clear_only_their_fields() {
    let envelope = UplinkEnvelope::from_slice(
      json!({
        "end_device_ids": { "device_id": "node1" },
        "uplink_message": {
          "decoded_payload": { "soil_pct": 3 },
          "rx_metadata": null,
          "settings": { "data_rate": { "lora": { "spreading_factor": "7", "bandwidth": 125000.0 } } }
        }
      })
      .to_string()
      .as_bytes(),
    )
    .unwrap();

    assert!(envelope.first_reception().is_none());
    let lora = envelope.lora_data_rate().unwrap();
    assert_eq!(lora.spreading_factor, Some(7));
    assert_eq!(lora.bandwidth, Some(125_000));

    let envelope = UplinkEnvelope::from_slice(
      json!({
        "uplink_message": {
          "decoded_payload": {},
          "rx_metadata": [7, { "rssi": "loud", "snr": 4.5 }],
          "settings": { "data_rate": { "lora": { "spreading_factor": 7.5, "bandwidth": -125000 } } }
        }
      })
      .to_string()
      .as_bytes(),
    )
    .unwrap();

    assert_eq!(envelope.first_reception(), Some(&RxMetadata::default()));
    let second = &envelope.uplink_message.as_ref().unwrap().rx_metadata[1];
    assert_eq!((second.rssi, second.snr), (None, Some(4.5)));

    let lora = envelope.lora_data_rate().unwrap();
    assert_eq!((lora.spreading_factor, lora.bandwidth), (None, None));

    let envelope =
      UplinkEnvelope::from_slice(br#"{"uplink_message": {"rx_metadata": {}, "settings": 5}}"#)
        .unwrap();
    assert!(envelope.first_reception().is_none());
    assert!(envelope.lora_data_rate().is_none());
  }

  #[test]
  fn rejects_invalid_json() {
    assert!(UplinkEnvelope::from_slice(b"{not json").is_err());
    assert!(UplinkEnvelope::from_slice(br#"{"uplink_message": 4}"#).is_err());
  }
}
