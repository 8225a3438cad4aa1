//! Runtime Configuration
//!
//! Settings shared by a hierarchy and every invocation run against it.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Hierarchy`](crate::Hierarchy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Name of the universal root type every linearization ends in.
    pub root_name: String,

    /// Maximum number of nested method bodies in one invocation.
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root_name: "object".to_string(),
            max_call_depth: 256,
        }
    }
}

impl RuntimeConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Returns this configuration with a different root name.
    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    /// Returns this configuration with a different call depth limit.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::new();
        assert_eq!(config.root_name, "object");
        assert_eq!(config.max_call_depth, 256);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RuntimeConfig::from_toml_str("max_call_depth = 8").unwrap();
        assert_eq!(config.root_name, "object");
        assert_eq!(config.max_call_depth, 8);
    }

    #[test]
    fn test_builders() {
        let config = RuntimeConfig::new().with_root_name("Any").with_max_call_depth(3);
        assert_eq!(config.root_name, "Any");
        assert_eq!(config.max_call_depth, 3);
    }
}
