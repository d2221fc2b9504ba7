//! Scheduler configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::task::ResourceType;

/// Prefix of the environment variables read by `SchedulerConfig::from_env`.
pub const ENV_PREFIX: &str = "TASK_SCHEDULER_";

const DEFAULT_HISTORY_LIMIT: usize = 100;
const DEFAULT_CAPACITY: f64 = 1.0;

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tasks running at once.
    pub max_concurrent_tasks: usize,
    /// Number of terminal task snapshots kept in history.
    pub history_limit: usize,
    /// Capacity given to pools created implicitly by a task requirement.
    pub default_capacity: f64,
    /// Reject tasks whose minimum requirement exceeds pool capacity instead of queueing them.
    pub reject_infeasible: bool,
    /// Pools to create up front, keyed by resource with their capacity.
    pub resources: HashMap<ResourceType, f64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: num_cpus::get().max(1),
            history_limit: DEFAULT_HISTORY_LIMIT,
            default_capacity: DEFAULT_CAPACITY,
            reject_infeasible: true,
            resources: HashMap::new(),
        }
    }
}

impl SchedulerConfig {
    /// Defaults: one slot per CPU, 100 history entries, unit default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency cap.
    #[must_use]
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// Set the history bound.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Set the capacity of implicitly created pools.
    #[must_use]
    pub fn with_default_capacity(mut self, capacity: f64) -> Self {
        self.default_capacity = capacity;
        self
    }

    /// Toggle fail-fast rejection of infeasible requirements.
    #[must_use]
    pub fn with_reject_infeasible(mut self, reject: bool) -> Self {
        self.reject_infeasible = reject;
        self
    }

    /// Declare a pool up front.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<ResourceType>, capacity: f64) -> Self {
        self.resources.insert(resource.into(), capacity);
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_tasks == 0 {
            return Err("max_concurrent_tasks must be greater than 0".into());
        }
        if self.history_limit == 0 {
            return Err("history_limit must be greater than 0".into());
        }
        if !self.default_capacity.is_finite() || self.default_capacity <= 0.0 {
            return Err(format!(
                "default_capacity must be a positive number, got {}",
                self.default_capacity
            ));
        }
        for (resource, capacity) in &self.resources {
            if !capacity.is_finite() || *capacity < 0.0 {
                return Err(format!(
                    "resource `{resource}` capacity must be a non-negative number, got {capacity}"
                ));
            }
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, loading `.env` first.
    ///
    /// Recognized variables (all optional, prefixed with `TASK_SCHEDULER_`):
    /// `MAX_CONCURRENT_TASKS`, `HISTORY_LIMIT`, `DEFAULT_CAPACITY`,
    /// `REJECT_INFEASIBLE`, and `RESOURCES` as `cpu=1.0,memory=0.5`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse or validate.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is fine; only explicit variables matter.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// `lookup` receives full variable names including `ENV_PREFIX`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse or validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(raw) = var("MAX_CONCURRENT_TASKS") {
            cfg.max_concurrent_tasks = parse_var("MAX_CONCURRENT_TASKS", &raw)?;
        }
        if let Some(raw) = var("HISTORY_LIMIT") {
            cfg.history_limit = parse_var("HISTORY_LIMIT", &raw)?;
        }
        if let Some(raw) = var("DEFAULT_CAPACITY") {
            cfg.default_capacity = parse_var("DEFAULT_CAPACITY", &raw)?;
        }
        if let Some(raw) = var("REJECT_INFEASIBLE") {
            cfg.reject_infeasible = parse_var("REJECT_INFEASIBLE", &raw)?;
        }
        if let Some(raw) = var("RESOURCES") {
            cfg.resources = parse_resources(&raw)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}: cannot parse `{raw}`: {e}"))
}

fn parse_resources(raw: &str) -> Result<HashMap<ResourceType, f64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, capacity) = entry
                .split_once('=')
                .ok_or_else(|| format!("{ENV_PREFIX}RESOURCES: expected name=capacity, got `{entry}`"))?;
            let capacity = parse_var::<f64>("RESOURCES", capacity)?;
            Ok((ResourceType::from(name.trim()), capacity))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("TASK_SCHEDULER_MAX_CONCURRENT_TASKS", "3"),
            ("TASK_SCHEDULER_REJECT_INFEASIBLE", "false"),
            ("TASK_SCHEDULER_RESOURCES", "cpu=1.0, memory=0.5,llm_slots=4"),
        ]
        .into_iter()
        .collect();

        let cfg = SchedulerConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(cfg.max_concurrent_tasks, 3);
        assert!(!cfg.reject_infeasible);
        assert_eq!(cfg.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(cfg.resources.len(), 3);
        assert_eq!(cfg.resources.get(&ResourceType::Memory), Some(&0.5));
        assert_eq!(
            cfg.resources.get(&ResourceType::Custom("llm_slots".into())),
            Some(&4.0)
        );
    }

    #[test]
    fn test_lookup_reports_bad_values() {
        let err = SchedulerConfig::from_lookup(|k| {
            (k == "TASK_SCHEDULER_HISTORY_LIMIT").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.contains("HISTORY_LIMIT"));

        let err = SchedulerConfig::from_lookup(|k| {
            (k == "TASK_SCHEDULER_RESOURCES").then(|| "cpu".to_string())
        })
        .unwrap_err();
        assert!(err.contains("name=capacity"));
    }

    #[test]
    fn test_lookup_validates_result() {
        let err = SchedulerConfig::from_lookup(|k| {
            (k == "TASK_SCHEDULER_MAX_CONCURRENT_TASKS").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(err.contains("max_concurrent_tasks"));
    }
}
