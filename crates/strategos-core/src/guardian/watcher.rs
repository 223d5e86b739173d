//! File-system watching and path eligibility

use crate::error::{Error, Result};
use crate::guardian::config::GuardianConfig;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::warn;

/// Decides which paths the guardian validates.
///
/// A path is eligible only when it matches at least one include glob and
/// no exclude glob.
#[derive(Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    /// Compile the include/exclude globs from the configuration.
    pub fn new(config: &GuardianConfig) -> Result<Self> {
        Ok(Self {
            include: build_globset(&config.include, "guardian.include")?,
            exclude: build_globset(&config.exclude, "guardian.exclude")?,
        })
    }

    /// Whether the guardian should validate this path.
    #[must_use]
    pub fn is_eligible(&self, path: &Path) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }

    /// Whether a directory can be skipped entirely during scanning.
    ///
    /// Tested by probing a synthetic child, since exclude globs like
    /// `**/target/**` match only paths below the directory.
    #[must_use]
    pub fn prunes_dir(&self, dir: &Path) -> bool {
        self.exclude.is_match(dir.join("_"))
    }
}

fn build_globset(patterns: &[String], field: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::InvalidConfig {
            field: field.to_string(),
            message: format!("invalid glob \"{pattern}\": {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::InvalidConfig {
        field: field.to_string(),
        message: e.to_string(),
    })
}

/// Streams created/modified paths under a watched root.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<PathBuf>,
}

impl ChangeWatcher {
    /// Start watching a directory tree recursively.
    pub fn new(root: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                            for path in event.paths {
                                let _ = tx.send(path);
                            }
                        }
                    }
                    Err(e) => warn!("file watch error: {e}"),
                }
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Next changed path, or `None` once the watcher has shut down.
    pub async fn next_change(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_requires_include_match() {
        let filter = FileFilter::new(&GuardianConfig::default()).unwrap();
        assert!(filter.is_eligible(Path::new("src/main.rs")));
        assert!(filter.is_eligible(Path::new("web/app.ts")));
        assert!(!filter.is_eligible(Path::new("README.md")));
        assert!(!filter.is_eligible(Path::new("Cargo.toml")));
    }

    #[test]
    fn test_excluded_paths_are_never_eligible() {
        let filter = FileFilter::new(&GuardianConfig::default()).unwrap();
        assert!(!filter.is_eligible(Path::new("target/debug/build.rs")));
        assert!(!filter.is_eligible(Path::new("web/node_modules/pkg/index.js")));
        assert!(!filter.is_eligible(Path::new("app/dist/bundle.js")));
    }

    #[test]
    fn test_empty_include_list_matches_nothing() {
        let config = GuardianConfig {
            include: Vec::new(),
            ..GuardianConfig::default()
        };
        let filter = FileFilter::new(&config).unwrap();
        assert!(!filter.is_eligible(Path::new("src/main.rs")));
    }

    #[test]
    fn test_invalid_glob_is_a_config_error() {
        let config = GuardianConfig {
            include: vec!["src/[".to_string()],
            ..GuardianConfig::default()
        };
        let err = FileFilter::new(&config).unwrap_err();
        assert!(err.to_string().contains("guardian.include"));
    }

    #[test]
    fn test_directory_pruning() {
        let filter = FileFilter::new(&GuardianConfig::default()).unwrap();
        assert!(filter.prunes_dir(Path::new("project/target")));
        assert!(filter.prunes_dir(Path::new("web/node_modules")));
        assert!(!filter.prunes_dir(Path::new("project/src")));
    }

    #[tokio::test]
    async fn test_watcher_reports_created_files() {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        let mut watcher = match ChangeWatcher::new(dir.path()) {
            Ok(watcher) => watcher,
            // Platform without a usable watch backend
            Err(_) => return,
        };

        let file = dir.path().join("change.rs");
        std::fs::write(&file, "fn main() {}").unwrap();

        let changed =
            tokio::time::timeout(std::time::Duration::from_secs(5), watcher.next_change())
                .await
                .expect("watcher did not report the change in time")
                .expect("watcher channel closed");
        assert!(changed.ends_with("change.rs"));
    }
}
