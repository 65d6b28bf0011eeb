mod command;
mod emulate;
mod serve;

pub use command::command;
pub use emulate::emulate;
pub use serve::serve;
