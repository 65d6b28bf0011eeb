use crate::{
  config::GatewayConfig,
  server::{
    broker,
    ingest::{self, Ingestor},
    Classifier,
    DownlinkPublisher,
    Server,
  },
};
use jeflog::{pass, task};
use std::io;
use tokio::sync::mpsc;

/// Resolves once the process receives Ctrl-C, signaling the server to
/// shut down.
async fn wait_for_interrupt() -> io::Result<()> {
  tokio::signal::ctrl_c().await
}

/// Starts the gateway.
///
/// This function connects to the broker, spawns the uplink forwarding and
/// ingest tasks, and serves dashboard clients until interrupted.
pub fn serve(config: &GatewayConfig) -> anyhow::Result<()> {
  let client_id = format!("hydro-gateway-{:04x}", rand::random::<u16>());
  let (client, eventloop) = broker::connect(config, &client_id);

  let downlink = DownlinkPublisher::new(
    client.clone(),
    config.downlink_topic(),
    config.downlink_port,
  );
  let server = Server::new(downlink, config.verbose);
  let ingestor = Ingestor::new(
    Classifier::new(&config.node1_id, &config.node2_id),
    server.shared.clone(),
  );

  task!(
    "Connecting to \x1b[1m{}:{}\x1b[0m as \x1b[1m{}\x1b[0m.",
    config.broker_host,
    config.broker_port,
    config.username()
  );

  tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()?
    .block_on(async {
      let (uplink_tx, uplink_rx) = mpsc::channel(ingest::UPLINK_QUEUE);

      tokio::spawn(broker::forward_uplinks(
        client,
        eventloop,
        config.uplink_topic(),
        config.reconnect_period,
        uplink_tx,
      ));
      tokio::spawn(ingestor.run(uplink_rx));

      // once Ctrl-C resolves, the server stops accepting connections
      let shutdown_task = tokio::spawn(wait_for_interrupt());
      server.serve(config.http_port, shutdown_task).await
    })?;

  pass!("Shut down. {}.", server.shared.statistics.summary());
  Ok(())
}
