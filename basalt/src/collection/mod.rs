//! Documents, identifiers, index descriptions and the collection handle.

mod collection;
mod document;
mod index;
mod object_id;
mod options;

pub use collection::*;
pub use document::*;
pub use index::*;
pub use object_id::*;
pub use options::*;
