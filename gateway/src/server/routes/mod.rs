/// Route functions related to operator commands.
pub mod command;

/// Route functions for forwarding and inspecting node data.
pub mod data;

pub use command::*;
pub use data::*;
