use super::uplink::UplinkEnvelope;
use serde::{Deserialize, Serialize};

/// Radio link quality of a single uplink, as forwarded to dashboard clients.
///
/// Each field is independently optional. An absent field is serialized as
/// `null` so clients can render a placeholder.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioMetadata {
  /// Received signal strength of the first reception, in dBm.
  pub rssi: Option<i32>,

  /// Signal-to-noise ratio of the first reception, in dB.
  pub snr: Option<f64>,

  /// Human-readable data rate such as `SF7BW125`.
  pub data_rate: Option<String>,
}

impl RadioMetadata {
  /// Derives the link-quality fields of an uplink.
  ///
  /// RSSI and SNR are copied from the first reception record only.
  pub fn from_uplink(envelope: &UplinkEnvelope) -> Self {
    let reception = envelope.first_reception();
    let lora = envelope.lora_data_rate();

    RadioMetadata {
      rssi: reception.and_then(|rx| rx.rssi).map(|rssi| rssi.round() as i32),
      snr: reception.and_then(|rx| rx.snr),
      data_rate: data_rate_label(
        lora.and_then(|lora| lora.spreading_factor),
        lora.and_then(|lora| lora.bandwidth),
      ),
    }
  }
}

/// Formats a LoRa data rate as `SF<n>BW<k>`, with the bandwidth converted from
/// Hz to kHz. Returns `None` unless both parameters are known.
pub fn data_rate_label(
  spreading_factor: Option<u32>,
  bandwidth_hz: Option<u32>,
) -> Option<String> {
  let (spreading_factor, bandwidth_hz) = spreading_factor.zip(bandwidth_hz)?;

  // LoRaWAN bandwidths are whole kHz, so truncation loses nothing
  Some(format!("SF{spreading_factor}BW{}", bandwidth_hz / 1000))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn envelope(value: serde_json::Value) -> UplinkEnvelope {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn label_requires_both_parameters() {
    assert_eq!(data_rate_label(Some(7), Some(125_000)).as_deref(), Some("SF7BW125"));
    assert_eq!(data_rate_label(Some(12), Some(500_000)).as_deref(), Some("SF12BW500"));
    assert_eq!(data_rate_label(Some(9), None), None);
    assert_eq!(data_rate_label(None, Some(125_000)), None);
    assert_eq!(data_rate_label(None, None), None);
  }

  #[test]
  fn uses_first_reception_only() {
    let radio = RadioMetadata::from_uplink(&envelope(json!({
      "uplink_message": {
        "rx_metadata": [{ "rssi": -72, "snr": 7.5 }, { "rssi": -40, "snr": 12.0 }],
        "settings": { "data_rate": { "lora": { "spreading_factor": 9, "bandwidth": 125000 } } }
      }
    })));

    assert_eq!(
      radio,
      RadioMetadata {
        rssi: Some(-72),
        snr: Some(7.5),
        data_rate: Some("SF9BW125".to_owned()),
      }
    );
  }

  #[test]
  fn fields_are_independently_absent() {
    let radio = RadioMetadata::from_uplink(&envelope(json!({
      "uplink_message": {
        "rx_metadata": [{ "snr": -2.25 }],
        "settings": { "data_rate": { "lora": { "spreading_factor": 7 } } }
      }
    })));

    assert_eq!(radio.rssi, None);
    assert_eq!(radio.snr, Some(-2.25));
    assert_eq!(radio.data_rate, None);

    assert_eq!(
      RadioMetadata::from_uplink(&UplinkEnvelope::default()),
      RadioMetadata::default()
    );
  }

  #[test]
  fn serializes_absent_fields_as_null() {
    let json = serde_json::to_value(RadioMetadata::default()).unwrap();
    assert_eq!(json, json!({ "rssi": null, "snr": null, "dataRate": null }));
  }
}
