//! State store implementations
//!
//! This module provides concrete implementations of the StateStore trait.

pub mod conf;
pub mod memory;

pub use conf::ConfStateStore;
pub use memory::MemoryStateStore;
