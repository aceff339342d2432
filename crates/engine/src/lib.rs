//! Flight deal engine.
//!
//! This crate contains the price history store, the deal classifier and the
//! scheduler loop that ties searching, classification and dispatch together.

pub mod classifier;
pub mod clock;
pub mod db;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use classifier::*;
pub use clock::*;
pub use db::SqliteStorage;
pub use scheduler::*;
pub use storage::{JsonFileStorage, MemoryStorage};
pub use store::*;
