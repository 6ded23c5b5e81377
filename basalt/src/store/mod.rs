//! Store connection contract and the in-memory reference store.

mod command_result;
mod connection;
pub mod memory;

pub use command_result::*;
pub use connection::*;
