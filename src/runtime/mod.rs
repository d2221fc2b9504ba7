//! Runtime adapters that execute task callbacks.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
