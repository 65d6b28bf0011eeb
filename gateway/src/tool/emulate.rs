use crate::{config::GatewayConfig, server::broker};
use anyhow::{anyhow, bail};
use common::comm::uplink::{
  DataRate,
  EndDeviceIds,
  LoraDataRate,
  Payload,
  RxMetadata,
  TxSettings,
  UplinkEnvelope,
  UplinkMessage,
};
use jeflog::{pass, task, warn};
use rand::{seq::SliceRandom, Rng};
use rumqttc::{Client, QoS};
use serde_json::json;
use std::{
  thread,
  time::{Duration, Instant},
};

/// Device identifier of the emulated probe that carries no identity match.
const PROBE_ID: &str = "probe-07";

/// Device identifier of the emulated device that matches no rule at all.
const STRAY_ID: &str = "stray-01";

fn soil_climate(rng: &mut impl Rng) -> Payload {
  let payload = json!({
    "soil_pct": rng.gen_range(15..=85),
    "temp_c": (rng.gen_range(18.0..32.0_f64) * 10.0).round() / 10.0,
    "lux": rng.gen_range(0..=20_000),
    "gas_pct": rng.gen_range(0..=40),
    "pressure_hpa": (rng.gen_range(990.0..1030.0_f64) * 10.0).round() / 10.0,
    "altitude_m": rng.gen_range(40..=60),
    "buzzer": rng.gen_bool(0.1),
  });

  serde_json::from_value(payload).unwrap_or_default()
}

fn dissolved_solids(rng: &mut impl Rng) -> Payload {
  serde_json::from_value(json!({ "tds_ppm": rng.gen_range(200..=900) }))
    .unwrap_or_default()
}

fn battery(rng: &mut impl Rng) -> Payload {
  let volts = (rng.gen_range(3.3..4.2_f64) * 100.0).round() / 100.0;
  serde_json::from_value(json!({ "battery_v": volts })).unwrap_or_default()
}

/// Delay between two uplinks at the given rate, in Hz.
fn period(frequency: f64) -> anyhow::Result<Duration> {
  if !(frequency > 0.0) {
    bail!("frequency must be positive, got {frequency}");
  }

  Duration::try_from_secs_f64(1.0 / frequency)
    .map_err(|error| anyhow!("invalid frequency {frequency}: {error}"))
}

/// When to stop publishing, if ever.
fn deadline(duration: Option<f64>) -> anyhow::Result<Option<Instant>> {
  duration
    .map(|seconds| {
      Duration::try_from_secs_f64(seconds)
        .map(|duration| Instant::now() + duration)
        .map_err(|error| anyhow!("invalid duration {seconds}: {error}"))
    })
    .transpose()
}

/// Wraps a decoded payload in an uplink document with plausible radio
/// metadata, the way The Things Stack would deliver it.
fn envelope(device_id: &str, payload: Payload, rng: &mut impl Rng) -> UplinkEnvelope {
  UplinkEnvelope {
    end_device_ids: Some(EndDeviceIds {
      device_id: Some(device_id.to_owned()),
    }),
    uplink_message: Some(UplinkMessage {
      decoded_payload: Some(payload),
      rx_metadata: vec![RxMetadata {
        rssi: Some(rng.gen_range(-120..=-40) as f64),
        snr: Some((rng.gen_range(-15.0..12.0_f64) * 10.0).round() / 10.0),
      }],
      settings: Some(TxSettings {
        data_rate: Some(DataRate {
          lora: Some(LoraDataRate {
            spreading_factor: Some(rng.gen_range(7..=12)),
            bandwidth: Some(125_000),
          }),
        }),
      }),
    }),
  }
}

/// Tool function which publishes synthetic uplinks onto the broker, covering
/// every classification path: both identity matches, a shape-only match, and
/// an unknown device.
///
/// The Things Stack refuses application clients publishing on uplink topics,
/// so this is meant to be pointed at a local broker.
pub fn emulate(
  config: &GatewayConfig,
  frequency: f64,
  duration: Option<f64>,
) -> anyhow::Result<()> {
  let period = period(frequency)?;
  let deadline = deadline(duration)?;

  let client_id = format!("hydro-emulator-{:04x}", rand::random::<u16>());
  let (client, mut connection) =
    Client::new(broker::options(config, &client_id), broker::REQUEST_CAPACITY);

  // the connection must be driven for any publish to leave the process
  let reconnect_period = config.reconnect_period;
  thread::spawn(move || {
    for notification in connection.iter() {
      if let Err(error) = notification {
        warn!("Emulator lost the broker: {error}");
        thread::sleep(reconnect_period);
      }
    }
  });

  let devices = [
    config.node1_id.clone(),
    config.node2_id.clone(),
    PROBE_ID.to_owned(),
    STRAY_ID.to_owned(),
  ];

  let mut rng = rand::thread_rng();
  let mut published = 0_usize;

  task!(
    "Emulating uplinks on \x1b[1m{}:{}\x1b[0m at {frequency} Hz.",
    config.broker_host,
    config.broker_port
  );

  while deadline.map_or(true, |deadline| Instant::now() < deadline) {
    let Some(device_id) = devices.choose(&mut rng) else {
      break;
    };

    let payload = if *device_id == config.node1_id {
      soil_climate(&mut rng)
    } else if *device_id == STRAY_ID {
      battery(&mut rng)
    } else {
      dissolved_solids(&mut rng)
    };

    let uplink = envelope(device_id, payload, &mut rng);
    let raw = serde_json::to_vec(&uplink)?;

    client.publish(
      config.device_uplink_topic(device_id),
      QoS::AtMostOnce,
      false,
      raw,
    )?;

    published += 1;
    thread::sleep(period);
  }

  pass!("Published \x1b[1m{published}\x1b[0m synthetic uplinks.");
  Ok(())
}
