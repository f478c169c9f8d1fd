//! Engine options.

use serde::Deserialize;

use crate::error::{PolicyError, Result};

/// Default LRU cache size for request-path match results
pub const DEFAULT_MATCH_CACHE_SIZE: usize = 1024;

/// Default initial capacity of registries and rule tables
pub const DEFAULT_CAPACITY: usize = 65536;

/// Policy engine options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOptions {
    /// Compile URI patterns case-insensitively
    pub case_insensitive_paths: bool,
    /// LRU cache size for path match results (0 disables the cache)
    pub match_cache_size: usize,
    /// Initial capacity of the address registry
    pub address_capacity: usize,
    /// Initial capacity of the path registry
    pub path_capacity: usize,
    /// Initial capacity of each rule table
    pub rule_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            case_insensitive_paths: true,
            match_cache_size: DEFAULT_MATCH_CACHE_SIZE,
            address_capacity: DEFAULT_CAPACITY,
            path_capacity: DEFAULT_CAPACITY,
            rule_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl EngineOptions {
    /// Create new engine options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PolicyError::ConfigError(format!("invalid engine options: {}", e)))
    }

    /// Set case sensitivity of URI patterns.
    pub fn with_case_insensitive_paths(mut self, enabled: bool) -> Self {
        self.case_insensitive_paths = enabled;
        self
    }

    /// Set match cache size.
    pub fn with_match_cache_size(mut self, size: usize) -> Self {
        self.match_cache_size = size;
        self
    }

    /// Set initial capacity for registries and rule tables.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.address_capacity = capacity;
        self.path_capacity = capacity;
        self.rule_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = EngineOptions::new();
        assert!(opts.case_insensitive_paths);
        assert_eq!(opts.match_cache_size, DEFAULT_MATCH_CACHE_SIZE);
        assert_eq!(opts.rule_capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_from_json_partial() {
        let opts = EngineOptions::from_json(r#"{"match_cache_size": 0}"#).unwrap();
        assert_eq!(opts.match_cache_size, 0);
        assert!(opts.case_insensitive_paths);
    }

    #[test]
    fn test_from_json_rejects_unknown_field() {
        let err = EngineOptions::from_json(r#"{"cache": 3}"#).unwrap_err();
        assert!(matches!(err, PolicyError::ConfigError(_)));
    }

    #[test]
    fn test_builder() {
        let opts = EngineOptions::new()
            .with_case_insensitive_paths(false)
            .with_capacity(16);
        assert!(!opts.case_insensitive_paths);
        assert_eq!(opts.address_capacity, 16);
        assert_eq!(opts.path_capacity, 16);
    }
}
