//! Search configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::build::BuildContext;
use crate::locator::SourceLocator;
use crate::scanner::DEFAULT_IGNORE;
use crate::types::Strategy;

/// Everything a [`Finder`](crate::Finder) needs besides its caches.
///
/// Built with [`Config::new`] and the `with_*` methods:
///
/// ```no_run
/// use gosyms::{Config, Strategy};
///
/// let config = Config::new("/path/to/module")
///     .with_strategy(Strategy::Typed)
///     .with_workers(4);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    ignore: BTreeSet<String>,
    strategy: Strategy,
    workers: Option<usize>,
    build: BuildContext,
    locator: SourceLocator,
}

impl Config {
    /// Configuration for scanning `root`.
    ///
    /// The build context and search roots come from the environment
    /// (`GOOS`, `GOARCH`, `CGO_ENABLED`, `GOROOT`, `GOPATH`).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: DEFAULT_IGNORE.iter().map(|s| (*s).to_string()).collect(),
            strategy: Strategy::default(),
            workers: None,
            build: BuildContext::from_env(),
            locator: SourceLocator::from_env(),
        }
    }

    /// Replace the set of directory names the scanner does not enter.
    #[must_use]
    pub fn with_ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = names.into_iter().map(Into::into).collect();
        self
    }

    /// Select the extraction pipeline.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Cap the parallel pipeline's worker pool.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Replace the target platform and tags.
    #[must_use]
    pub fn with_build_context(mut self, build: BuildContext) -> Self {
        self.build = build;
        self
    }

    /// Replace the dependency search roots.
    ///
    /// The scan root is always searched after these.
    #[must_use]
    pub fn with_locator(mut self, locator: SourceLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Directory to scan.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory names the scanner does not enter.
    #[must_use]
    pub fn ignore(&self) -> &BTreeSet<String> {
        &self.ignore
    }

    /// Selected pipeline.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Worker cap, if any.
    #[must_use]
    pub fn workers(&self) -> Option<usize> {
        self.workers
    }

    /// Target platform and tags.
    #[must_use]
    pub fn build(&self) -> &BuildContext {
        &self.build
    }

    /// Dependency search roots.
    #[must_use]
    pub fn locator(&self) -> &SourceLocator {
        &self.locator
    }
}
