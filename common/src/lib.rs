#![warn(missing_docs)]

//! Common consists of the shared types passed between the parts of the
//! hydroponics telemetry stack. More specifically, the documents received from
//! The Things Stack, the packets forwarded to dashboard clients, and the
//! commands sent back down to the field nodes are all stored here.

/// All structs and definitions related to communication between the broker,
/// the gateway, and dashboard clients.
pub mod comm;

/// Trait providing a method to create a pretty, terminal-friendly
/// representation of the underlying.
pub trait ToPrettyString {
  /// Provides a representation of the underlying which is preferable when
  /// displaying to the console but not as a raw string.
  ///
  /// ANSI codes such as color codes, for example, can be used in a "pretty
  /// string" but would be atypical in a `fmt::Display` implementation.
  fn to_pretty_string(&self) -> String;
}
