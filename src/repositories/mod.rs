//! Repositories over the gateways and the document store.

mod git;
mod local_collections;
mod memos;
mod stored_collections;

pub use git::*;
pub use local_collections::*;
pub use memos::*;
pub use stored_collections::*;
