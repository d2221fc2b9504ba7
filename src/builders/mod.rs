//! Builders to construct scheduler components from configuration.

pub mod manager_builder;

pub use manager_builder::build_manager;
