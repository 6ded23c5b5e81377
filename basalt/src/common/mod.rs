mod constants;
mod util;
mod value;

pub use constants::*;
pub use util::*;
pub use value::*;
