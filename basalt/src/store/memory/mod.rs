mod catalog;
mod matcher;
mod query;
mod reply;
mod store;
mod updater;

pub use store::*;
