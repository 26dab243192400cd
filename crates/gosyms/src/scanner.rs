//! Package directory discovery under a root.
//!
//! The walk is recursive and sorted by name, so discovery order is stable
//! across runs. Directories named in the ignore set, or starting with `.` or
//! `_`, are not entered. The root itself is a candidate package.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, PackageError, Result};
use crate::locator::SearchRoot;
use crate::resolver::{Package, PackageResolver};

/// Directory names skipped unless configured otherwise.
pub const DEFAULT_IGNORE: &[&str] = &["testdata", "vendor", "node_modules"];

/// A directory that may hold a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDir {
    /// Absolute directory path
    pub dir: PathBuf,
    /// Import path the directory is resolved under
    pub import_path: String,
}

/// Result of walking the root.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Candidate package directories, in walk order
    pub packages: Vec<PackageDir>,
    /// Directories that could not be read, with the reason
    pub directories_skipped: Vec<(PathBuf, String)>,
}

/// Result of resolving every discovered directory.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Directories holding a non-empty package, in discovery order
    pub local: Vec<PathBuf>,
    /// The packages of `local`, in the same order
    pub packages: Vec<Arc<Package>>,
    /// Directories resolved successfully (including empty ones)
    pub processed: usize,
    /// Directories whose resolution failed
    pub errors: Vec<PackageError>,
}

/// Walks a root directory for packages.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    root: SearchRoot,
    ignore: BTreeSet<String>,
}

impl DirectoryScanner {
    /// Scanner over `root`, skipping directories named in `ignore`.
    #[must_use]
    pub fn new(root: SearchRoot, ignore: impl IntoIterator<Item = String>) -> Self {
        Self {
            root,
            ignore: ignore.into_iter().collect(),
        }
    }

    /// Root being scanned.
    #[must_use]
    pub fn root(&self) -> &SearchRoot {
        &self.root
    }

    /// Enumerate candidate package directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the root itself cannot be read. Unreadable
    /// subdirectories are recorded in the result and skipped.
    pub fn discover(&self) -> Result<Discovery> {
        let root = &self.root.dir;
        // Fail fast on the root; everything below is best effort.
        std::fs::read_dir(root).map_err(|e| Error::io(root, e))?;

        let mut discovery = Discovery::default();
        self.walk_dir(root, &mut discovery);
        debug!(
            root = %root.display(),
            packages = discovery.packages.len(),
            skipped = discovery.directories_skipped.len(),
            "Discovered package directories"
        );
        Ok(discovery)
    }

    fn walk_dir(&self, dir: &Path, discovery: &mut Discovery) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    directory = %dir.display(),
                    error = %e,
                    "Cannot read directory, skipping"
                );
                discovery
                    .directories_skipped
                    .push((dir.to_path_buf(), e.to_string()));
                return;
            }
        };

        if let Some(import_path) = self.root.import_path_of(dir) {
            discovery.packages.push(PackageDir {
                dir: dir.to_path_buf(),
                import_path,
            });
        }

        let mut subdirs = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(
                        directory = %dir.display(),
                        error = %e,
                        "Failed to read directory entry, skipping"
                    );
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.is_excluded_dir(name) {
                continue;
            }
            subdirs.push(path);
        }
        subdirs.sort();

        for subdir in subdirs {
            self.walk_dir(&subdir, discovery);
        }
    }

    /// Check if a directory should not be entered.
    fn is_excluded_dir(&self, name: &str) -> bool {
        name.starts_with('.') || name.starts_with('_') || self.ignore.contains(name)
    }

    /// Resolve every discovered directory, recording which are local.
    ///
    /// Failures are collected per package; the scan always completes.
    pub fn scan(&self, packages: &[PackageDir], resolver: &mut PackageResolver<'_>) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();

        for package_dir in packages {
            match resolver.resolve_dir(&package_dir.import_path, &package_dir.dir) {
                Ok(package) => {
                    outcome.processed += 1;
                    if !package.is_empty() {
                        outcome.local.push(package_dir.dir.clone());
                        outcome.packages.push(package);
                    }
                }
                Err(e) => {
                    warn!(
                        import_path = %package_dir.import_path,
                        dir = %package_dir.dir.display(),
                        error = %e,
                        "Failed to resolve package, skipping"
                    );
                    outcome.errors.push(PackageError::from_error(
                        &package_dir.dir,
                        &package_dir.import_path,
                        &e,
                    ));
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scanner(root: &Path) -> DirectoryScanner {
        DirectoryScanner::new(
            SearchRoot::detect(root),
            DEFAULT_IGNORE.iter().map(|s| (*s).to_string()),
        )
    }

    fn import_paths(discovery: &Discovery) -> Vec<&str> {
        discovery
            .packages
            .iter()
            .map(|p| p.import_path.as_str())
            .collect()
    }

    #[test]
    fn walks_in_sorted_order_and_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["b", "a/inner", ".git", "_old", "vendor/x", "testdata", "c"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }

        let discovery = scanner(dir.path()).discover().unwrap();

        assert_eq!(import_paths(&discovery), vec![".", "a", "a/inner", "b", "c"]);
    }

    #[test]
    fn module_path_prefixes_import_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/app\n").unwrap();
        fs::create_dir_all(dir.path().join("internal/db")).unwrap();

        let discovery = scanner(dir.path()).discover().unwrap();

        assert_eq!(
            import_paths(&discovery),
            vec!["example.com/app", "example.com/app/internal", "example.com/app/internal/db"]
        );
    }

    #[test]
    fn custom_ignore_set_replaces_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::create_dir_all(dir.path().join("gen")).unwrap();

        let scanner = DirectoryScanner::new(SearchRoot::gopath(dir.path()), ["gen".to_string()]);
        let discovery = scanner.discover().unwrap();

        assert_eq!(import_paths(&discovery), vec![".", "vendor"]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let scanner = scanner(Path::new("/nonexistent/gosyms/root"));

        assert!(matches!(scanner.discover(), Err(Error::Io { .. })));
    }
}
