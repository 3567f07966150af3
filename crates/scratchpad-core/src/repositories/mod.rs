//! Repository traits (ports)

pub mod scratchpad_repository;

pub use scratchpad_repository::{InMemoryScratchpadRepository, ScratchpadRepository};
