//! Import path to directory lookup.
//!
//! Packages are found by joining the import path onto each search root in
//! order; the first existing directory wins. A root may carry a module path
//! (read from its `go.mod`), in which case only import paths under that
//! module map into it, with the module prefix stripped.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

/// One directory packages are searched in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRoot {
    /// Directory import paths are joined onto
    pub dir: PathBuf,
    /// Module path owning this root, if it is a module root
    pub module: Option<String>,
}

impl SearchRoot {
    /// A GOPATH-style root: the import path is the directory path below it.
    #[must_use]
    pub fn gopath(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            module: None,
        }
    }

    /// A module root serving import paths under `module`.
    #[must_use]
    pub fn module(dir: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            module: Some(module.into()),
        }
    }

    /// A root for `dir`, using its `go.mod` module path when present.
    #[must_use]
    pub fn detect(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match read_module_path(&dir) {
            Some(module) => Self::module(dir, module),
            None => Self::gopath(dir),
        }
    }

    /// Candidate directory for `import_path` in this root.
    #[must_use]
    pub fn candidate(&self, import_path: &str) -> Option<PathBuf> {
        match &self.module {
            Some(module) if import_path == module => Some(self.dir.clone()),
            Some(module) => {
                let rest = import_path.strip_prefix(module.as_str())?.strip_prefix('/')?;
                Some(join_import_path(&self.dir, rest))
            }
            None => Some(join_import_path(&self.dir, import_path)),
        }
    }

    /// Import path of `dir`, if it lies under this root.
    #[must_use]
    pub fn import_path_of(&self, dir: &Path) -> Option<String> {
        let rel = dir.strip_prefix(&self.dir).ok()?;
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        match (&self.module, rel.is_empty()) {
            (Some(module), true) => Some(module.clone()),
            (Some(module), false) => Some(format!("{module}/{}", rel.join("/"))),
            (None, true) => Some(".".to_string()),
            (None, false) => Some(rel.join("/")),
        }
    }
}

fn join_import_path(dir: &Path, import_path: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    for segment in import_path.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

/// Read the `module` directive of `dir/go.mod`.
#[must_use]
pub fn read_module_path(dir: &Path) -> Option<String> {
    let content = std::fs::read_to_string(dir.join("go.mod")).ok()?;
    content.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let module = rest.split("//").next()?.trim().trim_matches('"');
        (!module.is_empty()).then(|| module.to_string())
    })
}

/// Ordered list of search roots.
#[derive(Debug, Clone, Default)]
pub struct SourceLocator {
    roots: Vec<SearchRoot>,
}

impl SourceLocator {
    /// Create a locator over `roots`, searched in order.
    #[must_use]
    pub fn new(roots: Vec<SearchRoot>) -> Self {
        Self { roots }
    }

    /// Roots from `GOROOT` and `GOPATH`.
    ///
    /// `GOROOT/src` comes first, then `src` under each `GOPATH` entry. An unset
    /// `GOPATH` defaults to `$HOME/go`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut roots = Vec::new();

        if let Some(goroot) = std::env::var_os("GOROOT").filter(|v| !v.is_empty()) {
            roots.push(SearchRoot::gopath(PathBuf::from(goroot).join("src")));
        }

        let gopath = std::env::var_os("GOPATH")
            .filter(|v| !v.is_empty())
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join("go").into()));
        if let Some(gopath) = gopath {
            for dir in std::env::split_paths(&gopath) {
                roots.push(SearchRoot::gopath(dir.join("src")));
            }
        }

        debug!(roots = roots.len(), "Search roots from environment");
        Self { roots }
    }

    /// Append a root, searched after the existing ones.
    pub fn push(&mut self, root: SearchRoot) {
        self.roots.push(root);
    }

    /// Configured roots, in search order.
    #[must_use]
    pub fn roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    /// Find the directory for `import_path`.
    ///
    /// Returns the first candidate that exists, or `Err` with every candidate
    /// that was tried.
    ///
    /// # Errors
    ///
    /// Returns the list of searched directories when none exists.
    pub fn locate(&self, import_path: &str) -> Result<PathBuf, Vec<PathBuf>> {
        let mut searched = Vec::new();
        for root in &self.roots {
            let Some(candidate) = root.candidate(import_path) else {
                continue;
            };
            if candidate.is_dir() {
                trace!(import_path, dir = %candidate.display(), "Located package");
                return Ok(candidate);
            }
            searched.push(candidate);
        }
        Err(searched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn gopath_root_joins_import_path() {
        let root = SearchRoot::gopath("/go/src");

        assert_eq!(
            root.candidate("github.com/a/b"),
            Some(PathBuf::from("/go/src/github.com/a/b"))
        );
    }

    #[test]
    fn module_root_strips_module_prefix() {
        let root = SearchRoot::module("/work/app", "example.com/app");

        assert_eq!(root.candidate("example.com/app"), Some(PathBuf::from("/work/app")));
        assert_eq!(
            root.candidate("example.com/app/internal/db"),
            Some(PathBuf::from("/work/app/internal/db"))
        );
        assert_eq!(root.candidate("example.com/application"), None);
        assert_eq!(root.candidate("fmt"), None);
    }

    #[test]
    fn import_path_of_inverts_candidate() {
        let module = SearchRoot::module("/work/app", "example.com/app");
        let gopath = SearchRoot::gopath("/go/src");

        assert_eq!(
            module.import_path_of(Path::new("/work/app/internal/db")),
            Some("example.com/app/internal/db".to_string())
        );
        assert_eq!(
            module.import_path_of(Path::new("/work/app")),
            Some("example.com/app".to_string())
        );
        assert_eq!(
            gopath.import_path_of(Path::new("/go/src/a/b")),
            Some("a/b".to_string())
        );
        assert_eq!(gopath.import_path_of(Path::new("/elsewhere")), None);
    }

    #[test]
    fn reads_module_path_from_go_mod() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("go.mod"),
            "// comment\nmodule example.com/thing // trailing\n\ngo 1.21\n",
        )
        .unwrap();

        assert_eq!(
            read_module_path(dir.path()),
            Some("example.com/thing".to_string())
        );
        assert_eq!(SearchRoot::detect(dir.path()).module.as_deref(), Some("example.com/thing"));
    }

    #[test]
    fn locate_searches_roots_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::create_dir_all(first.path().join("shared")).unwrap();
        fs::create_dir_all(second.path().join("shared")).unwrap();
        fs::create_dir_all(second.path().join("only_second")).unwrap();

        let locator = SourceLocator::new(vec![
            SearchRoot::gopath(first.path()),
            SearchRoot::gopath(second.path()),
        ]);

        assert_eq!(locator.locate("shared"), Ok(first.path().join("shared")));
        assert_eq!(
            locator.locate("only_second"),
            Ok(second.path().join("only_second"))
        );
    }

    #[test]
    fn locate_reports_searched_candidates() {
        let root = tempfile::tempdir().unwrap();
        let locator = SourceLocator::new(vec![SearchRoot::gopath(root.path())]);

        let searched = locator.locate("missing/pkg").unwrap_err();

        assert_eq!(searched, vec![root.path().join("missing").join("pkg")]);
    }
}
