use clap::{Arg, Command};
use gateway::{
  config::{self, GatewayConfig},
  tool,
};
use jeflog::fail;
use std::process;

/// Builds the configuration for a subcommand, exiting if the broker
/// credentials are missing.
fn configure(args: &clap::ArgMatches) -> GatewayConfig {
  match GatewayConfig::from_matches(args) {
    Ok(config) => config,
    Err(error) => {
      fail!("{error}");
      process::exit(1);
    }
  }
}

fn main() -> anyhow::Result<()> {
  let matches = Command::new("gateway")
    .about("Hydroponics telemetry gateway command line tool")
    .subcommand_required(true)
    .subcommand(
      Command::new("serve")
        .about("Bridges TTN uplinks to dashboard clients and relays operator commands.")
        .args(config::broker_args())
        .args(config::serve_args()),
    )
    .subcommand(
      Command::new("emulate")
        .about("Publishes synthetic uplinks for both nodes onto a broker.")
        .args(config::broker_args())
        .arg(
          Arg::new("frequency")
            .required(false)
            .default_value("1.0")
            .short('f')
            .value_parser(clap::value_parser!(f64)),
        )
        .arg(
          Arg::new("duration")
            .required(false)
            .short('t')
            .value_parser(clap::value_parser!(f64)),
        ),
    )
    .subcommand(
      Command::new("command")
        .about("Sends a buzzer command to node1 through a running gateway.")
        .arg(Arg::new("cmd").required(true))
        .arg(
          Arg::new("server")
            .long("server")
            .short('s')
            .default_value("http://localhost:8080"),
        ),
    )
    .get_matches();

  match matches.subcommand() {
    Some(("serve", args)) => tool::serve(&configure(args))?,
    Some(("emulate", args)) => tool::emulate(
      &configure(args),
      args.get_one::<f64>("frequency").copied().unwrap_or(1.0),
      args.get_one::<f64>("duration").copied(),
    )?,
    Some(("command", args)) => {
      let (Some(cmd), Some(server)) = (
        args.get_one::<String>("cmd"),
        args.get_one::<String>("server"),
      ) else {
        fail!("Missing command. Try \x1b[1mgateway command on\x1b[0m.");
        process::exit(1);
      };

      tool::command(server, cmd)?
    }
    _ => {
      fail!("Invalid command. Please check the command you entered.");
      process::exit(1);
    }
  };

  Ok(())
}
