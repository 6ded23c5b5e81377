mod command;
mod engine;

pub use command::*;
pub use engine::*;
