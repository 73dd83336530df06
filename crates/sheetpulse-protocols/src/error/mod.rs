//! Error types shared across SheetPulse crates.

mod executor;
mod queue;
mod store;

pub use executor::*;
pub use queue::*;
pub use store::*;
