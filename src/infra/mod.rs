//! Infrastructure adapters backing the scheduler's in-memory state.

pub mod queue;

pub use queue::InMemoryQueue;
