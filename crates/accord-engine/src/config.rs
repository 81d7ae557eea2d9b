//! Engine configuration.

use serde::{Deserialize, Serialize};

/// What a bulk pass does after the first per-identifier failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Keep reconciling remaining identifiers; report aggregate failure.
    #[default]
    ContinueOnError,
    /// Stop immediately and report partial progress.
    ExitOnFirstError,
}

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Error policy for bulk passes.
    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Whether reconciliation scope includes reference relations.
    #[serde(default = "default_include_references")]
    pub include_references: bool,

    /// Bound on concurrent per-identifier reconciliations in a bulk pass.
    /// The deletion phase is always sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_include_references() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            include_references: default_include_references(),
            concurrency: default_concurrency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.error_policy, ErrorPolicy::ContinueOnError);
        assert!(config.include_references);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "error_policy": "exit_on_first_error" }"#).unwrap();
        assert_eq!(config.error_policy, ErrorPolicy::ExitOnFirstError);
        assert!(config.include_references);
    }
}
