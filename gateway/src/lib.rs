#![warn(missing_docs)]
#![warn(clippy::correctness)]

//! The gateway bridges a LoRaWAN application on The Things Stack to realtime
//! dashboard clients, and relays operator commands back down to the field.

/// Broker and server configuration, read from arguments and the environment.
pub mod config;

/// Components related to the server, including ingest, classification,
/// forwarding, downlinks, and route functions.
pub mod server;

/// Everything related to the gateway command line tool.
pub mod tool;
