//! On-demand package resolution.
//!
//! [`PackageResolver`] turns an import path into a checked [`Package`]:
//! locate the directory, scan it under the [`BuildContext`], parse the
//! selected files through the [`FileCache`], and check them as one unit.
//! Imports are resolved recursively through the same resolver.
//!
//! ## Caching
//!
//! Two levels, both explicit:
//!
//! - The [`Session`] remembers the outcome of every import path requested
//!   through one resolver and detects cycles with its in-progress stack.
//! - The [`PackageCache`] outlives sessions. It remembers each directory's
//!   relevant tags on first sight and keys checked packages by [`TagKey`], so
//!   a later request for the same directory under an equivalent configuration
//!   skips scanning, parsing and checking altogether.
//!
//! Directories without applicable sources resolve to an empty package that is
//! remembered by the session only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::build::BuildContext;
use crate::checker::{self, Declaration, Diagnostic, DiagnosticSink, Importer, Object, Scope};
use crate::error::{Error, Result};
use crate::locator::SourceLocator;
use crate::syntax::{FileCache, SyntaxTree};

/// A resolved package.
///
/// Never mutated after construction; shared as `Arc<Package>`.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Import path the package was first resolved under
    pub import_path: String,
    /// Package clause name
    pub name: String,
    /// Source directory
    pub dir: PathBuf,
    /// Applicable Go files, sorted
    pub go_files: Vec<PathBuf>,
    /// Applicable files importing `"C"`, sorted
    pub cgo_files: Vec<PathBuf>,
    /// Parsed files, Go files first
    pub trees: Vec<Arc<SyntaxTree>>,
    /// Package-level objects
    pub scope: Scope,
    /// Declaration table; `None` when the package was not type-checked
    pub decls: Option<Vec<Declaration>>,
    /// Problems found while checking this package
    pub diagnostics: Vec<Diagnostic>,
}

impl Package {
    /// A package with no source files, defined only by its scope.
    ///
    /// Used for `unsafe`.
    #[must_use]
    pub fn from_scope(import_path: &str, name: &str, scope: Scope) -> Self {
        Self {
            import_path: import_path.to_string(),
            name: name.to_string(),
            scope,
            decls: Some(Vec::new()),
            ..Self::default()
        }
    }

    fn empty(import_path: &str, dir: &Path) -> Self {
        Self {
            import_path: import_path.to_string(),
            dir: dir.to_path_buf(),
            ..Self::default()
        }
    }

    /// Returns `true` if the package has no sources and no predeclared scope.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.go_files.is_empty() && self.cgo_files.is_empty() && self.scope.is_empty()
    }

    /// Package-level object named `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Object> {
        self.scope.lookup(name)
    }
}

/// Cache key for a checked package.
///
/// A directory plus the sorted subset of its relevant tags that the build
/// configuration satisfies. Configurations that agree on every tag the
/// directory mentions share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagKey {
    dir: PathBuf,
    tags: Vec<String>,
}

impl TagKey {
    /// Key for `dir` under `context`, given the directory's relevant tags.
    #[must_use]
    pub fn new(dir: &Path, context: &BuildContext, relevant: &[String]) -> Self {
        let mut tags: Vec<String> = relevant
            .iter()
            .filter(|tag| context.satisfies(tag))
            .cloned()
            .collect();
        tags.sort();
        tags.dedup();
        Self {
            dir: dir.to_path_buf(),
            tags,
        }
    }

    /// Directory part of the key.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Satisfied relevant tags, sorted.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl std::fmt::Display for TagKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir.display())?;
        for tag in &self.tags {
            write!(f, ",{tag}")?;
        }
        Ok(())
    }
}

/// Checked packages shared across sessions, keyed by [`TagKey`].
///
/// Thread-safe. Entries are never invalidated.
#[derive(Debug)]
pub struct PackageCache {
    relevant_tags: Mutex<HashMap<PathBuf, Vec<String>>>,
    packages: Mutex<HashMap<TagKey, Arc<Package>>>,
    unsafe_package: Arc<Package>,
    resolutions: AtomicUsize,
}

impl Default for PackageCache {
    fn default() -> Self {
        Self {
            relevant_tags: Mutex::new(HashMap::new()),
            packages: Mutex::new(HashMap::new()),
            unsafe_package: Arc::new(Package::from_scope(
                "unsafe",
                "unsafe",
                checker::universe::unsafe_scope(),
            )),
            resolutions: AtomicUsize::new(0),
        }
    }
}

impl PackageCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Relevant tags recorded for `dir`, if it has been scanned.
    #[must_use]
    pub fn relevant_tags(&self, dir: &Path) -> Option<Vec<String>> {
        self.relevant_tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dir)
            .cloned()
    }

    /// Record `dir`'s relevant tags unless already known.
    ///
    /// Returns the tags in effect for the directory.
    pub fn record_tags(&self, dir: &Path, tags: &[String]) -> Vec<String> {
        self.relevant_tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(dir.to_path_buf())
            .or_insert_with(|| tags.to_vec())
            .clone()
    }

    /// Acquire the package map, converting poison errors to our error type.
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<TagKey, Arc<Package>>>> {
        self.packages
            .lock()
            .map_err(|e| Error::Internal(format!("mutex poisoned: {e}")))
    }

    /// Cached package for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the cache lock is poisoned.
    pub fn get(&self, key: &TagKey) -> Result<Option<Arc<Package>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    /// Cache `package` under `key`, keeping an existing entry if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the cache lock is poisoned.
    pub fn insert(&self, key: TagKey, package: Arc<Package>) -> Result<Arc<Package>> {
        let mut packages = self.lock()?;
        Ok(Arc::clone(packages.entry(key).or_insert(package)))
    }

    /// The built-in `unsafe` package.
    #[must_use]
    pub fn unsafe_package(&self) -> Arc<Package> {
        Arc::clone(&self.unsafe_package)
    }

    fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of directories resolved from source (tag cache misses).
    #[must_use]
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Number of cached packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no package has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where an import path stands within one session.
#[derive(Debug, Clone, Default)]
pub enum ResolutionState {
    /// Not requested yet
    #[default]
    Unresolved,
    /// Being resolved; a second request means a cycle
    InProgress,
    /// Resolved successfully
    Resolved(Arc<Package>),
    /// Resolution failed; later requests get the same error
    Failed(Error),
}

/// Per-session resolution bookkeeping.
#[derive(Debug, Default)]
pub struct Session {
    states: HashMap<String, ResolutionState>,
    stack: Vec<String>,
    resolved: Vec<Arc<Package>>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `import_path`.
    #[must_use]
    pub fn state(&self, import_path: &str) -> ResolutionState {
        self.states.get(import_path).cloned().unwrap_or_default()
    }

    /// Import paths currently in progress, outermost first.
    #[must_use]
    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    /// Packages resolved in this session, in completion order.
    pub fn resolved(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.resolved.iter()
    }

    /// Returns a cached outcome, or marks `import_path` in progress.
    fn enter(&mut self, import_path: &str) -> Option<Result<Arc<Package>>> {
        match self.states.get(import_path) {
            Some(ResolutionState::InProgress) => {
                let start = self
                    .stack
                    .iter()
                    .position(|p| p == import_path)
                    .unwrap_or(0);
                let mut stack = self.stack[start..].to_vec();
                stack.push(import_path.to_string());
                warn!(import_path, cycle = %stack.join(" -> "), "Import cycle detected");
                Some(Err(Error::Cycle {
                    import_path: import_path.to_string(),
                    stack,
                }))
            }
            Some(ResolutionState::Resolved(package)) => Some(Ok(Arc::clone(package))),
            Some(ResolutionState::Failed(error)) => Some(Err(error.clone())),
            Some(ResolutionState::Unresolved) | None => {
                self.states
                    .insert(import_path.to_string(), ResolutionState::InProgress);
                self.stack.push(import_path.to_string());
                None
            }
        }
    }

    fn finish(&mut self, import_path: &str, result: Result<Arc<Package>>) -> Result<Arc<Package>> {
        if self.stack.last().map(String::as_str) == Some(import_path) {
            self.stack.pop();
        }
        let state = match &result {
            Ok(package) => {
                self.resolved.push(Arc::clone(package));
                ResolutionState::Resolved(Arc::clone(package))
            }
            Err(error) => ResolutionState::Failed(error.clone()),
        };
        self.states.insert(import_path.to_string(), state);
        result
    }
}

/// Resolves import paths to checked packages.
///
/// Borrows the configuration and the shared caches; owns one [`Session`].
pub struct PackageResolver<'a> {
    context: &'a BuildContext,
    locator: &'a SourceLocator,
    files: &'a FileCache,
    packages: &'a PackageCache,
    sink: DiagnosticSink,
    session: Session,
}

impl<'a> PackageResolver<'a> {
    /// Create a resolver with a fresh session.
    #[must_use]
    pub fn new(
        context: &'a BuildContext,
        locator: &'a SourceLocator,
        files: &'a FileCache,
        packages: &'a PackageCache,
        sink: DiagnosticSink,
    ) -> Self {
        Self {
            context,
            locator,
            files,
            packages,
            sink,
            session: Session::new(),
        }
    }

    /// Resolve `import_path`, locating its directory through the search roots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cycle`], [`Error::NotFound`], [`Error::Parse`],
    /// [`Error::MultiplePackages`] or [`Error::Io`].
    pub fn resolve(&mut self, import_path: &str) -> Result<Arc<Package>> {
        if let Some(outcome) = self.session.enter(import_path) {
            return outcome;
        }

        let result = if import_path == "unsafe" {
            Ok(self.packages.unsafe_package())
        } else {
            match self.locator.locate(import_path) {
                Ok(dir) => self.load(import_path, &dir),
                Err(searched) => Err(Error::NotFound {
                    import_path: import_path.to_string(),
                    searched,
                }),
            }
        };
        self.session.finish(import_path, result)
    }

    /// Resolve the package in `dir` under `import_path`.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve), except `NotFound`.
    pub fn resolve_dir(&mut self, import_path: &str, dir: &Path) -> Result<Arc<Package>> {
        if let Some(outcome) = self.session.enter(import_path) {
            return outcome;
        }
        let result = self.load(import_path, dir);
        self.session.finish(import_path, result)
    }

    /// This resolver's session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Consume the resolver, keeping its session.
    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }

    fn load(&mut self, import_path: &str, dir: &Path) -> Result<Arc<Package>> {
        if let Some(tags) = self.packages.relevant_tags(dir) {
            let key = TagKey::new(dir, self.context, &tags);
            if let Some(package) = self.packages.get(&key)? {
                trace!(import_path, tag_key = %key, "Package cache hit");
                return Ok(package);
            }
        }

        self.packages.record_resolution();
        let info = self.context.scan_dir(dir)?;
        if info.is_empty() {
            debug!(import_path, dir = %dir.display(), "No applicable Go files");
            return Ok(Arc::new(Package::empty(import_path, dir)));
        }

        let tags = self.packages.record_tags(dir, &info.all_tags);
        let key = TagKey::new(dir, self.context, &tags);

        let trees = info
            .files()
            .map(|file| self.files.parse(file))
            .collect::<Result<Vec<_>>>()?;

        let sink = self.sink.clone();
        let checked = checker::check(import_path, &trees, self, &sink)?;

        let package = Package {
            import_path: import_path.to_string(),
            name: checked.name,
            dir: dir.to_path_buf(),
            go_files: info.go_files,
            cgo_files: info.cgo_files,
            trees,
            scope: checked.scope,
            decls: Some(checked.decls),
            diagnostics: checked.diagnostics,
        };
        debug!(import_path, tag_key = %key, files = package.trees.len(), "Resolved package");
        self.packages.insert(key, Arc::new(package))
    }
}

impl Importer for PackageResolver<'_> {
    fn import(&mut self, import_path: &str) -> Result<Arc<Package>> {
        self.resolve(import_path)
    }
}
