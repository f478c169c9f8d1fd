//! Identifier registries.
//!
//! Rule keys never carry raw CIDRs or URI strings; they carry the compact
//! ids handed out here.

mod address;
mod path;

pub use address::AddressRegistry;
pub use path::{PathMatch, PathMatcher, PathRegistry};
