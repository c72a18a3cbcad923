//! Tag vocabulary, tag sets and resolved tag handles

pub mod handles;
pub mod set;
pub mod vocabulary;

pub use handles::TagHandles;
pub use set::{TagChange, TagChangeKind, TagId, TagSet};
pub use vocabulary::TagName;
