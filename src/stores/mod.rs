//! Store implementations

pub mod memory;

pub use memory::{MemoryStore, WriteRecord};
