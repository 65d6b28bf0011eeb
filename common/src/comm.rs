/// Documents published by The Things Stack for every uplink.
pub mod uplink;

/// Link-quality fields derived from an uplink.
pub mod radio;

/// Operator commands and their binary opcodes.
pub mod command;

/// Downlink documents pushed back to The Things Stack.
pub mod downlink;

mod gui;
mod packet;
mod role;

pub use command::Command;
pub use downlink::{Downlink, DownlinkPush, Priority};
pub use gui::*;
pub use packet::*;
pub use radio::RadioMetadata;
pub use role::*;
pub use uplink::{Payload, UplinkEnvelope};
