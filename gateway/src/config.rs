use anyhow::anyhow;
use clap::{Arg, ArgAction, ArgMatches};
use std::time::Duration;

/// Delay between broker reconnection attempts.
pub const RECONNECT_PERIOD: Duration = Duration::from_secs(3);

/// MQTT keep-alive interval.
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Everything the gateway needs to reach The Things Stack and its clients.
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayConfig {
  /// The Things Stack application identifier.
  pub app_id: String,

  /// API key with rights to read uplinks and write downlinks.
  pub api_key: String,

  /// Tenant the application lives in, `ttn` on the community network.
  pub tenant: String,

  /// Cluster region, such as `eu1`.
  pub region: String,

  /// Hostname of the MQTT broker.
  pub broker_host: String,

  /// Port of the MQTT broker.
  pub broker_port: u16,

  /// Whether to connect to the broker over TLS.
  pub tls: bool,

  /// Device identifier of the soil / climate node.
  pub node1_id: String,

  /// Device identifier of the nutrient node.
  pub node2_id: String,

  /// Port the HTTP and WebSocket server listens on.
  pub http_port: u16,

  /// FPort downlink commands are sent on.
  pub downlink_port: u8,

  /// Delay between broker reconnection attempts.
  pub reconnect_period: Duration,

  /// MQTT keep-alive interval.
  pub keep_alive: Duration,

  /// Whether to log every routed packet.
  pub verbose: bool,
}

/// Arguments describing the broker connection, shared by every subcommand that
/// talks to The Things Stack. Each one falls back to an environment variable.
pub fn broker_args() -> Vec<Arg> {
  vec![
    Arg::new("app_id").long("app-id").env("TTN_APP_ID"),
    Arg::new("api_key")
      .long("api-key")
      .env("TTN_API_KEY")
      .hide_env_values(true),
    Arg::new("region")
      .long("region")
      .env("TTN_REGION")
      .default_value("eu1"),
    Arg::new("tenant")
      .long("tenant")
      .env("TTN_TENANT")
      .default_value("ttn"),
    Arg::new("broker_host").long("broker-host").env("MQTT_HOST"),
    Arg::new("broker_port")
      .long("broker-port")
      .env("MQTT_PORT")
      .default_value("8883")
      .value_parser(clap::value_parser!(u16)),
    Arg::new("plain")
      .long("plain")
      .help("Connects to the broker without TLS.")
      .action(ArgAction::SetTrue),
    Arg::new("node1_id")
      .long("node1")
      .env("NODE1_ID")
      .default_value("node1"),
    Arg::new("node2_id")
      .long("node2")
      .env("NODE2_ID")
      .default_value("node2"),
  ]
}

/// Arguments only used by the server itself.
pub fn serve_args() -> Vec<Arg> {
  vec![
    Arg::new("port")
      .long("port")
      .short('p')
      .env("PORT")
      .default_value("8080")
      .value_parser(clap::value_parser!(u16)),
    Arg::new("fport")
      .long("fport")
      .default_value("2")
      .value_parser(clap::value_parser!(u8)),
    Arg::new("verbose")
      .long("verbose")
      .short('v')
      .action(ArgAction::SetTrue),
  ]
}

impl GatewayConfig {
  /// Builds the configuration from parsed arguments.
  ///
  /// Fails if the application identifier or API key is missing, which is
  /// fatal for every subcommand that uses the broker.
  pub fn from_matches(args: &ArgMatches) -> anyhow::Result<Self> {
    let app_id = required(args, "app_id", "TTN_APP_ID")?;
    let api_key = required(args, "api_key", "TTN_API_KEY")?;

    let region = string(args, "region").unwrap_or_else(|| "eu1".to_owned());

    let broker_host = string(args, "broker_host")
      .unwrap_or_else(|| format!("{region}.cloud.thethings.network"));

    Ok(GatewayConfig {
      app_id,
      api_key,
      tenant: string(args, "tenant").unwrap_or_else(|| "ttn".to_owned()),
      region,
      broker_host,
      broker_port: args.get_one::<u16>("broker_port").copied().unwrap_or(8883),
      tls: !flag(args, "plain"),
      node1_id: string(args, "node1_id").unwrap_or_else(|| "node1".to_owned()),
      node2_id: string(args, "node2_id").unwrap_or_else(|| "node2".to_owned()),
      http_port: lookup::<u16>(args, "port").unwrap_or(8080),
      downlink_port: lookup::<u8>(args, "fport").unwrap_or(2),
      reconnect_period: RECONNECT_PERIOD,
      keep_alive: KEEP_ALIVE,
      verbose: flag(args, "verbose"),
    })
  }

  /// The MQTT username, `{app}@{tenant}`.
  pub fn username(&self) -> String {
    format!("{}@{}", self.app_id, self.tenant)
  }

  /// Wildcard topic covering the uplinks of every device in the application.
  pub fn uplink_topic(&self) -> String {
    self.device_uplink_topic("+")
  }

  /// Topic a single device's uplinks are published on.
  pub fn device_uplink_topic(&self, device_id: &str) -> String {
    format!("v3/{}/devices/{device_id}/up", self.username())
  }

  /// Topic that queues downlinks for node1, which carries the buzzer.
  pub fn downlink_topic(&self) -> String {
    format!("v3/{}/devices/{}/down/push", self.username(), self.node1_id)
  }
}

fn required(args: &ArgMatches, id: &str, env: &str) -> anyhow::Result<String> {
  string(args, id).ok_or(anyhow!("missing {env}; set it or pass --{}", id.replace('_', "-")))
}

// args registered by only some subcommands must be looked up with try_get_one,
// since get_one panics on an id the command never declared
fn lookup<T: Clone + Send + Sync + 'static>(
  args: &ArgMatches,
  id: &str,
) -> Option<T> {
  args.try_get_one::<T>(id).ok().flatten().cloned()
}

fn string(args: &ArgMatches, id: &str) -> Option<String> {
  lookup::<String>(args, id).filter(|value| !value.is_empty())
}

fn flag(args: &ArgMatches, id: &str) -> bool {
  lookup::<bool>(args, id).unwrap_or(false)
}
