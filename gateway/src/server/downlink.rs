use super::{Shared, Statistics};
use common::comm::{Command, DownlinkPush};
use jeflog::{pass, warn};
use rumqttc::{AsyncClient, ClientError, QoS};
use std::{error::Error, fmt};

/// Why a downlink never reached the broker client.
#[derive(Debug)]
pub enum DownlinkError {
  /// The downlink document could not be serialized.
  Serialize(serde_json::Error),

  /// The broker client refused the publish, usually because its event loop
  /// has stopped.
  Transport(ClientError),
}

impl fmt::Display for DownlinkError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Serialize(error) => write!(f, "failed to serialize downlink: {error}"),
      Self::Transport(error) => write!(f, "failed to publish downlink: {error}"),
    }
  }
}

impl Error for DownlinkError {}

impl From<serde_json::Error> for DownlinkError {
  fn from(error: serde_json::Error) -> Self {
    DownlinkError::Serialize(error)
  }
}

impl From<ClientError> for DownlinkError {
  fn from(error: ClientError) -> Self {
    DownlinkError::Transport(error)
  }
}

/// Publishes operator commands to a single, fixed device.
///
/// Delivery is best-effort: QoS 0, unconfirmed, no retry. A successful
/// `publish` only means the message was handed to the broker client.
#[derive(Clone, Debug)]
pub struct DownlinkPublisher {
  client: AsyncClient,
  topic: String,
  f_port: u8,
}

impl DownlinkPublisher {
  /// Constructs a publisher pushing to `topic` on the given FPort.
  pub fn new(client: AsyncClient, topic: String, f_port: u8) -> Self {
    DownlinkPublisher {
      client,
      topic,
      f_port,
    }
  }

  /// The topic downlinks are pushed to.
  pub fn topic(&self) -> &str {
    &self.topic
  }

  /// The FPort configured for commands.
  pub fn f_port(&self) -> u8 {
    self.f_port
  }

  /// Wraps a single opcode into a downlink document and hands it to the
  /// broker client at the lowest delivery tier.
  pub async fn publish(&self, opcode: u8, f_port: u8) -> Result<(), DownlinkError> {
    let push = DownlinkPush::opcode(opcode, f_port);
    let body = serde_json::to_vec(&push)?;

    self
      .client
      .publish(self.topic.as_str(), QoS::AtMostOnce, false, body)
      .await?;

    Ok(())
  }
}

/// Encodes an operator command and publishes it on the configured FPort,
/// logging the outcome. Returns the opcode alongside the publish result so
/// callers can decide whether to surface a failure.
pub async fn relay_command(
  shared: &Shared,
  command: Command,
) -> (u8, Result<(), DownlinkError>) {
  let opcode = command.opcode();
  let f_port = shared.downlink.f_port();
  let result = shared.downlink.publish(opcode, f_port).await;

  match &result {
    Ok(()) => {
      Statistics::count(&shared.statistics.downlinks_sent);
      pass!(
        "Downlink \x1b[1m{command}\x1b[0m (0x{opcode:02x}) queued on {} FPort {f_port}.",
        shared.downlink.topic()
      );
    }
    Err(error) => {
      Statistics::count(&shared.statistics.downlinks_failed);
      warn!("Downlink \x1b[1m{command}\x1b[0m dropped: {error}");
    }
  }

  (opcode, result)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rumqttc::MqttOptions;

  fn client() -> (AsyncClient, rumqttc::EventLoop) {
    AsyncClient::new(MqttOptions::new("downlink-test", "localhost", 1883), 10)
  }

  #[tokio::test]
  async fn publish_hands_off_without_a_broker() {
    // the event loop is never polled, so nothing is sent on the wire
    let (client, _eventloop) = client();
    let publisher = DownlinkPublisher::new(
      client,
      "v3/hydro@ttn/devices/node1/down/push".to_owned(),
      2,
    );

    assert_eq!(publisher.topic(), "v3/hydro@ttn/devices/node1/down/push");
    assert!(publisher.publish(0x01, 2).await.is_ok());
  }

  #[tokio::test]
  async fn publish_fails_once_the_event_loop_is_gone() {
    let (client, eventloop) = client();
    drop(eventloop);

    let publisher = DownlinkPublisher::new(client, "down".to_owned(), 2);
    let error = publisher.publish(0x00, 2).await.unwrap_err();

    assert!(matches!(error, DownlinkError::Transport(_)));
  }

  #[tokio::test]
  async fn relay_counts_outcomes() {
    let (client, eventloop) = client();
    let shared = Shared::new(DownlinkPublisher::new(client, "down".to_owned(), 2), false);

    let (opcode, result) = relay_command(&shared, Command::parse("on")).await;
    assert_eq!(opcode, 0x01);
    assert!(result.is_ok());

    drop(eventloop);

    let (opcode, result) = relay_command(&shared, Command::parse("blink")).await;
    assert_eq!(opcode, 0x02);
    assert!(result.is_err());

    assert_eq!(Statistics::read(&shared.statistics.downlinks_sent), 1);
    assert_eq!(Statistics::read(&shared.statistics.downlinks_failed), 1);
  }
}
