use crate::config::GatewayConfig;
use jeflog::{pass, warn};
use rumqttc::{
  AsyncClient,
  Event,
  EventLoop,
  MqttOptions,
  Packet,
  QoS,
  SubscribeReasonCode,
  Transport,
};
use std::{future::Future, time::Duration};
use tokio::sync::mpsc;

/// Capacity of the request channel between the broker client and its event
/// loop.
pub const REQUEST_CAPACITY: usize = 16;

/// Builds the MQTT options for The Things Stack from the configuration.
pub fn options(config: &GatewayConfig, client_id: &str) -> MqttOptions {
  let mut options =
    MqttOptions::new(client_id, config.broker_host.as_str(), config.broker_port);

  options.set_credentials(config.username(), config.api_key.as_str());
  options.set_keep_alive(config.keep_alive);
  options.set_clean_session(true);

  if config.tls {
    options.set_transport(Transport::tls_with_default_config());
  }

  options
}

/// Creates the broker client and its not-yet-polled event loop. Nothing
/// touches the network until the event loop is driven.
pub fn connect(config: &GatewayConfig, client_id: &str) -> (AsyncClient, EventLoop) {
  AsyncClient::new(options(config, client_id), REQUEST_CAPACITY)
}

/// Drives the broker connection and forwards the payload of every uplink on
/// `topic` into the ingest queue.
///
/// The subscription is (re)issued on every connection acknowledgement.
/// Connection errors are never fatal: the event loop reconnects on the next
/// poll, which is delayed by `reconnect_period`. Messages published while
/// disconnected are not replayed. Returns once the ingest queue is closed.
pub fn forward_uplinks(
  client: AsyncClient,
  mut eventloop: EventLoop,
  topic: String,
  reconnect_period: Duration,
  uplinks: mpsc::Sender<Vec<u8>>,
) -> impl Future<Output = ()> {
  async move {
    loop {
      match eventloop.poll().await {
        Ok(Event::Incoming(Packet::ConnAck(_))) => {
          pass!(
            "Connected to broker \x1b[1m{}\x1b[0m.",
            eventloop.mqtt_options.broker_address().0
          );

          // try_subscribe, since awaiting here would block the very event loop
          // that drains the request channel
          if let Err(error) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
            warn!("Failed to request subscription to {topic}: {error}");
          }
        }
        Ok(Event::Incoming(Packet::SubAck(ack))) => {
          if ack
            .return_codes
            .iter()
            .all(|code| matches!(code, SubscribeReasonCode::Success(_)))
          {
            pass!("Subscribed to \x1b[1m{topic}\x1b[0m.");
          } else {
            warn!("Broker refused subscription to \x1b[1m{topic}\x1b[0m.");
          }
        }
        Ok(Event::Incoming(Packet::Publish(publish))) => {
          if uplinks.send(publish.payload.to_vec()).await.is_err() {
            // the ingest loop is gone, so there is nobody left to feed
            break;
          }
        }
        Ok(_) => {}
        Err(error) => {
          warn!(
            "Broker connection lost: {error}. Reconnecting in {}s.",
            reconnect_period.as_secs_f64()
          );
          tokio::time::sleep(reconnect_period).await;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{KEEP_ALIVE, RECONNECT_PERIOD};

  fn config(tls: bool) -> GatewayConfig {
    GatewayConfig {
      app_id: "hydro".to_owned(),
      api_key: "NNSXS.KEY".to_owned(),
      tenant: "ttn".to_owned(),
      region: "eu1".to_owned(),
      broker_host: "eu1.cloud.thethings.network".to_owned(),
      broker_port: 8883,
      tls,
      node1_id: "node1".to_owned(),
      node2_id: "node2".to_owned(),
      http_port: 8080,
      downlink_port: 2,
      reconnect_period: RECONNECT_PERIOD,
      keep_alive: KEEP_ALIVE,
      verbose: false,
    }
  }

  #[test]
  fn options_carry_credentials() {
    let options = options(&config(false), "gateway-test");

    assert_eq!(
      options.broker_address(),
      ("eu1.cloud.thethings.network".to_owned(), 8883)
    );
    assert_eq!(
      options.credentials(),
      Some(("hydro@ttn".to_owned(), "NNSXS.KEY".to_owned()))
    );
    assert_eq!(options.keep_alive(), Duration::from_secs(60));
    assert!(matches!(options.transport(), Transport::Tcp));
  }

  #[test]
  fn tls_is_enabled_by_default() {
    let options = options(&config(true), "gateway-test");

    assert!(matches!(options.transport(), Transport::Tls(_)));
  }
}
