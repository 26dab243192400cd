//! # gosyms: jump-to-symbol for Go source trees
//!
//! gosyms indexes the declared symbols (types, functions, variables,
//! constants) of every package under a root directory and answers
//! case-insensitive substring queries against them. Each match carries its
//! name, kind, package and source position.
//!
//! ## Pipelines
//!
//! - **Typed** ([`Strategy::Typed`]): packages are resolved on demand,
//!   including their imports, and checked at declaration granularity
//!   (function bodies are skipped). Reports funcs, types, vars and consts,
//!   in discovery order.
//! - **Syntax-only** ([`Strategy::SyntaxOnly`], the default): every package
//!   is parsed in parallel on a bounded worker pool and only top-level funcs
//!   and types are reported. No import resolution, no ordering guarantee.
//!
//! Both honor build constraints: `//go:build` and `// +build` lines,
//! `_GOOS`/`_GOARCH` file name suffixes, and cgo files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gosyms::{Config, Finder, Strategy};
//!
//! let finder = Finder::new(Config::new("/path/to/module").with_strategy(Strategy::Typed))?;
//! let results = finder.search("handler")?;
//! for symbol in &results.symbols {
//!     println!("{} {} {}:{}", symbol.kind, symbol.name, symbol.path.display(), symbol.line + 1);
//! }
//! # Ok::<(), gosyms::Error>(())
//! ```

pub mod build;
pub mod checker;
pub mod config;
pub mod error;
pub mod extract;
pub mod locator;
pub mod parallel;
pub mod resolver;
pub mod results;
pub mod scanner;
pub mod syntax;
pub mod types;

pub use build::BuildContext;
pub use checker::{Declaration, Diagnostic, DiagnosticSink};
pub use config::Config;
pub use error::{Error, PackageError, PackageErrorKind, Result};
pub use extract::{Extractor, SyntaxExtractor, TypedExtractor};
pub use locator::{SearchRoot, SourceLocator};
pub use resolver::{Package, PackageCache, PackageResolver, ResolutionState, Session, TagKey};
pub use syntax::{FileCache, SyntaxTree};
pub use types::{
    Category, Query, ResultOrder, SearchResults, SearchStats, Strategy, Symbol, SymbolKind,
};

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tracing::{debug, info};

use parallel::ConcurrencyController;
use results::ResultAggregator;
use scanner::DirectoryScanner;

/// Symbol finder over one root directory.
///
/// Owns the configuration and shares its caches through `Arc`, so several
/// finders (or repeated searches) can reuse parsed files and checked
/// packages.
#[derive(Debug)]
pub struct Finder {
    config: Config,
    root: SearchRoot,
    locator: SourceLocator,
    files: Arc<FileCache>,
    packages: Arc<PackageCache>,
}

impl Finder {
    /// Create a finder with fresh caches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the root cannot be resolved and
    /// [`Error::Config`] if it is not a directory.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_caches(config, Arc::new(FileCache::new()), Arc::new(PackageCache::new()))
    }

    /// Create a finder using existing caches.
    ///
    /// # Errors
    ///
    /// Same as [`Finder::new`].
    pub fn with_caches(
        config: Config,
        files: Arc<FileCache>,
        packages: Arc<PackageCache>,
    ) -> Result<Self> {
        let root_dir = config
            .root()
            .canonicalize()
            .map_err(|e| Error::io(config.root(), e))?;
        if !root_dir.is_dir() {
            return Err(Error::Config(format!(
                "root is not a directory: {}",
                root_dir.display()
            )));
        }

        let root = SearchRoot::detect(root_dir);
        let mut locator = config.locator().clone();
        locator.push(root.clone());
        debug!(
            root = %root.dir.display(),
            module = root.module.as_deref().unwrap_or("<none>"),
            search_roots = locator.roots().len(),
            "Created finder"
        );

        Ok(Self {
            config,
            root,
            locator,
            files,
            packages,
        })
    }

    /// Find symbols whose name contains `query`, ignoring case.
    ///
    /// An empty query matches nothing: it returns an empty result at once,
    /// without discovering or resolving any package.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the root cannot be read and
    /// [`Error::ThreadPool`] if the worker pool cannot be created.
    /// Per-package failures are reported in [`SearchStats::errors`].
    pub fn search(&self, query: &str) -> Result<SearchResults> {
        let query = Query::new(query);
        let strategy = self.config.strategy();

        if query.is_empty() {
            debug!("Empty query, nothing to search");
            return Ok(SearchResults::empty(match strategy {
                Strategy::Typed => ResultOrder::Discovery,
                Strategy::SyntaxOnly => ResultOrder::Unspecified,
            }));
        }

        match strategy {
            Strategy::Typed => self.search_typed(&query),
            Strategy::SyntaxOnly => self.search_syntax(&query),
        }
    }

    fn scanner(&self) -> DirectoryScanner {
        DirectoryScanner::new(self.root.clone(), self.config.ignore().iter().cloned())
    }

    fn search_typed(&self, query: &Query) -> Result<SearchResults> {
        let start = Instant::now();
        let scanner = self.scanner();
        let discovery = scanner.discover()?;

        let sink = DiagnosticSink::new();
        let mut resolver = PackageResolver::new(
            self.config.build(),
            &self.locator,
            &self.files,
            &self.packages,
            sink.clone(),
        );
        let outcome = scanner.scan(&discovery.packages, &mut resolver);

        let extractor = TypedExtractor::new(outcome.local.iter().cloned());
        let aggregator = ResultAggregator::new(ResultOrder::Discovery);
        let mut swept = HashSet::new();
        for package in &outcome.packages {
            // One directory can be resolved under several import paths.
            if !swept.insert(package.dir.clone()) {
                continue;
            }
            let mut batch = Vec::new();
            extractor.extract(package, query, &mut batch);
            aggregator.extend(batch);
        }

        let stats = SearchStats {
            packages_discovered: discovery.packages.len(),
            packages_processed: outcome.processed,
            packages_skipped: outcome.errors.len(),
            local_packages: outcome.local.len(),
            peak_concurrency: 1,
            duration: start.elapsed(),
            directories_skipped: discovery.directories_skipped,
            errors: outcome.errors,
            diagnostics: sink.drain(),
        };
        info!(
            query = query.as_str(),
            matches = aggregator.len(),
            packages = stats.packages_discovered,
            skipped = stats.packages_skipped,
            diagnostics = stats.diagnostics.len(),
            "Typed search completed"
        );
        Ok(aggregator.into_results(stats))
    }

    fn search_syntax(&self, query: &Query) -> Result<SearchResults> {
        let start = Instant::now();
        let discovery = self.scanner().discover()?;

        let controller = ConcurrencyController::new(self.config.workers());
        let aggregator = ResultAggregator::new(ResultOrder::Unspecified);
        let local = AtomicUsize::new(0);

        let batch = controller.run(&discovery.packages, |unit| {
            if let Some(symbols) = parallel::extract_package(
                unit,
                self.config.build(),
                &self.files,
                &self.packages,
                query,
            )? {
                local.fetch_add(1, Ordering::Relaxed);
                aggregator.extend(symbols);
            }
            Ok(())
        })?;

        let stats = SearchStats {
            packages_discovered: discovery.packages.len(),
            packages_processed: batch.processed,
            packages_skipped: batch.skipped,
            local_packages: local.into_inner(),
            peak_concurrency: batch.peak_concurrency,
            duration: start.elapsed(),
            directories_skipped: discovery.directories_skipped,
            errors: batch.errors,
            diagnostics: Vec::new(),
        };
        info!(
            query = query.as_str(),
            matches = aggregator.len(),
            packages = stats.packages_discovered,
            skipped = stats.packages_skipped,
            workers = controller.workers(),
            "Syntax search completed"
        );
        Ok(aggregator.into_results(stats))
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The scan root, canonicalized, with its module path if any.
    #[must_use]
    pub fn root(&self) -> &SearchRoot {
        &self.root
    }

    /// Shared parse cache.
    #[must_use]
    pub fn file_cache(&self) -> &Arc<FileCache> {
        &self.files
    }

    /// Shared package cache.
    #[must_use]
    pub fn package_cache(&self) -> &Arc<PackageCache> {
        &self.packages
    }
}
