//! The sync pipeline: change detection, id extraction, memo reconciliation and
//! the orchestrator that applies the result to the document store.

mod differ;
mod extract;
mod integrity;
mod orchestrator;
mod reconcile;

pub use differ::*;
pub use extract::*;
pub use integrity::*;
pub use orchestrator::*;
