//! Data models for memo collections.
//!
//! Field names serialize in camelCase to match the stored document layout.

mod changes;
mod collection;
mod memo;

pub use changes::*;
pub use collection::*;
pub use memo::*;
