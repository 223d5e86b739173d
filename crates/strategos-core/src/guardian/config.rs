//! Guardian configuration section

use serde::{Deserialize, Serialize};
use strategos_rpc::IssueSeverity;

/// Issue-count thresholds that turn a validation pass into a block.
///
/// A severity whose tally exceeds its threshold produces a blocking
/// reason. Zero means a single issue of that severity already blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockingThresholds {
    /// Allowed critical issues
    pub critical: usize,
    /// Allowed error issues
    pub error: usize,
    /// Allowed warning issues
    pub warning: usize,
    /// Allowed info issues
    pub info: usize,
}

impl Default for BlockingThresholds {
    fn default() -> Self {
        Self {
            critical: 0,
            error: 5,
            warning: 20,
            info: 50,
        }
    }
}

impl BlockingThresholds {
    /// Threshold for one severity.
    #[must_use]
    pub fn for_severity(&self, severity: IssueSeverity) -> usize {
        match severity {
            IssueSeverity::Critical => self.critical,
            IssueSeverity::Error => self.error,
            IssueSeverity::Warning => self.warning,
            IssueSeverity::Info => self.info,
        }
    }
}

/// Configuration for the continuous validation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// Watch the file system and validate changes continuously
    pub realtime: bool,
    /// Dispatch auto-fixable issues to the fix endpoint
    pub auto_fix: bool,
    /// Seconds between validation batch ticks
    pub validation_interval_secs: u64,
    /// Maximum files validated per tick
    pub batch_size: usize,
    /// Paths must match at least one of these globs to be validated
    pub include: Vec<String>,
    /// Paths matching any of these globs are never validated
    pub exclude: Vec<String>,
    /// Emit engine events for validation findings
    pub notifications: bool,
    /// Blocking thresholds per severity
    pub thresholds: BlockingThresholds,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            realtime: true,
            auto_fix: false,
            validation_interval_secs: 5,
            batch_size: 10,
            include: default_include(),
            exclude: default_exclude(),
            notifications: true,
            thresholds: BlockingThresholds::default(),
        }
    }
}

fn default_include() -> Vec<String> {
    ["**/*.rs", "**/*.ts", "**/*.js", "**/*.py", "**/*.go"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_exclude() -> Vec<String> {
    ["**/target/**", "**/node_modules/**", "**/.git/**", "**/dist/**"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_lookup() {
        let thresholds = BlockingThresholds::default();
        assert_eq!(thresholds.for_severity(IssueSeverity::Critical), 0);
        assert_eq!(thresholds.for_severity(IssueSeverity::Error), 5);
        assert_eq!(thresholds.for_severity(IssueSeverity::Warning), 20);
        assert_eq!(thresholds.for_severity(IssueSeverity::Info), 50);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: GuardianConfig = serde_json::from_str(r#"{"auto_fix": true}"#).unwrap();
        assert!(config.auto_fix);
        assert!(config.realtime);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.thresholds, BlockingThresholds::default());
    }

    #[test]
    fn test_default_globs_cover_source_trees() {
        let config = GuardianConfig::default();
        assert!(config.include.iter().any(|g| g.ends_with("*.rs")));
        assert!(config.exclude.iter().any(|g| g.contains("target")));
    }
}
