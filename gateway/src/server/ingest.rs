use super::{Classifier, Shared, Statistics};
use common::{
  comm::{ClassifiedPacket, RadioMetadata, UplinkEnvelope},
  ToPrettyString,
};
use jeflog::{pass, warn};
use std::{
  error::Error,
  fmt,
  time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::mpsc;

/// Number of raw uplinks that may wait for the ingest loop before the broker
/// transport is back-pressured.
pub const UPLINK_QUEUE: usize = 256;

/// Why a raw uplink was dropped.
#[derive(Debug)]
pub enum IngestError {
  /// The message was not a valid uplink document.
  Malformed(serde_json::Error),

  /// The document had no device identifier or no decoded payload.
  Incomplete,
}

impl fmt::Display for IngestError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Malformed(error) => write!(f, "malformed uplink: {error}"),
      Self::Incomplete => write!(f, "uplink without device id or decoded payload"),
    }
  }
}

impl Error for IngestError {}

/// Turns raw uplinks into classified packets, caches them, and hands them to
/// the dispatcher.
#[derive(Clone, Debug)]
pub struct Ingestor {
  classifier: Classifier,
  shared: Shared,
}

impl Ingestor {
  /// Constructs an ingestor writing into the cache and dispatcher of `shared`.
  pub fn new(classifier: Classifier, shared: Shared) -> Self {
    Ingestor { classifier, shared }
  }

  /// Processes a single raw uplink.
  ///
  /// Known-role packets replace the cached packet of their role. Unknown
  /// packets are only broadcast. Dropped uplinks touch neither the cache nor
  /// any client.
  pub async fn ingest(&self, raw: &[u8]) -> Result<ClassifiedPacket, IngestError> {
    let statistics = &self.shared.statistics;

    let envelope = UplinkEnvelope::from_slice(raw).map_err(|error| {
      Statistics::count(&statistics.malformed);
      IngestError::Malformed(error)
    })?;

    let (Some(device_id), Some(payload)) =
      (envelope.device_id(), envelope.decoded_payload())
    else {
      Statistics::count(&statistics.incomplete);
      return Err(IngestError::Incomplete);
    };

    let classification = self.classifier.classify(device_id, payload);

    let packet = ClassifiedPacket {
      device_id: device_id.to_owned(),
      role: classification.role,
      basis: classification.basis,
      payload: payload.clone(),
      radio: RadioMetadata::from_uplink(&envelope),
      ts: timestamp_ms(),
    };

    if !packet.role.is_known() {
      Statistics::count(&statistics.unknown);
    }

    self.shared.dispatcher.publish(&packet).await;
    Statistics::count(&statistics.ingested);

    Ok(packet)
  }

  /// Consumes raw uplinks until every sender is dropped. Uplinks are handled
  /// strictly one at a time, so packets are broadcast in arrival order.
  pub async fn run(self, mut uplinks: mpsc::Receiver<Vec<u8>>) {
    while let Some(raw) = uplinks.recv().await {
      match self.ingest(&raw).await {
        Ok(packet) => {
          if self.shared.verbose {
            pass!(
              "Routed \x1b[1m{}\x1b[0m → {} ({}).",
              packet.device_id,
              packet.role.to_pretty_string(),
              packet.radio.data_rate.as_deref().unwrap_or("no data rate"),
            );
          }
        }
        Err(IngestError::Malformed(error)) => {
          warn!("Dropped malformed uplink: {error}");
        }
        // well-formed but useless, dropped without noise
        Err(IngestError::Incomplete) => {}
      }
    }
  }
}

fn timestamp_ms() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|elapsed| elapsed.as_millis() as u64)
    .unwrap_or_default()
}
