//! Build a `ResourceManager` from `SchedulerConfig`.

use crate::config::SchedulerConfig;
use crate::core::{ResourceManager, SchedulerError, Spawn};

/// Validate `cfg` and build a manager whose declared pools already exist.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidConfig` if `cfg` does not validate.
pub fn build_manager<S: Spawn>(
    cfg: &SchedulerConfig,
    spawner: S,
) -> Result<ResourceManager<S>, SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;
    Ok(ResourceManager::from_parts(cfg, spawner))
}
