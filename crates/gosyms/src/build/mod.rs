//! Target configuration and file selection.
//!
//! A [`BuildContext`] describes the platform a package is built for: the
//! operating system, architecture, whether cgo is enabled, and any explicit
//! build tags. It decides which `.go` files in a directory belong to the
//! package, and which tags in that directory are *relevant* (mentioned by a
//! file name or constraint) so that resolution results can be cached per
//! distinct relevant-tag set.
//!
//! ## File selection
//!
//! A file is part of the package when all of the following hold:
//!
//! 1. It ends in `.go`, does not start with `_` or `.`, and is not a
//!    `_test.go` file.
//! 2. Its `_GOOS`, `_GOARCH` or `_GOOS_GOARCH` name suffix (if any) matches.
//! 3. Its `//go:build` expression (or, lacking one, its `// +build` lines)
//!    evaluates to true.
//! 4. If it imports `"C"`, cgo is enabled. Such files are reported separately.

pub mod constraint;
pub mod header;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use header::read_header;

/// Operating systems recognized in file name suffixes.
pub const KNOWN_OS: &[&str] = &[
    "aix",
    "android",
    "darwin",
    "dragonfly",
    "freebsd",
    "hurd",
    "illumos",
    "ios",
    "js",
    "linux",
    "nacl",
    "netbsd",
    "openbsd",
    "plan9",
    "solaris",
    "wasip1",
    "windows",
    "zos",
];

/// Architectures recognized in file name suffixes.
pub const KNOWN_ARCH: &[&str] = &[
    "386",
    "amd64",
    "amd64p32",
    "arm",
    "armbe",
    "arm64",
    "arm64be",
    "loong64",
    "mips",
    "mipsle",
    "mips64",
    "mips64le",
    "mips64p32",
    "mips64p32le",
    "ppc",
    "ppc64",
    "ppc64le",
    "riscv",
    "riscv64",
    "s390",
    "s390x",
    "sparc",
    "sparc64",
    "wasm",
];

/// Operating systems satisfying the `unix` tag.
const UNIX_OS: &[&str] = &[
    "aix",
    "android",
    "darwin",
    "dragonfly",
    "freebsd",
    "hurd",
    "illumos",
    "ios",
    "linux",
    "netbsd",
    "openbsd",
    "solaris",
];

/// Newest `go1.N` release tag satisfied by default.
const LATEST_RELEASE_MINOR: u32 = 22;

/// Target platform and tag configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    goos: String,
    goarch: String,
    cgo_enabled: bool,
    build_tags: Vec<String>,
    release_tags: Vec<String>,
}

impl BuildContext {
    /// Create a context for `goos`/`goarch` with cgo enabled, no extra build
    /// tags, and the default release tags.
    #[must_use]
    pub fn new(goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        Self {
            goos: goos.into(),
            goarch: goarch.into(),
            cgo_enabled: true,
            build_tags: Vec::new(),
            release_tags: (1..=LATEST_RELEASE_MINOR).map(|n| format!("go1.{n}")).collect(),
        }
    }

    /// Create a context from `GOOS`, `GOARCH` and `CGO_ENABLED`, falling back
    /// to the host platform.
    #[must_use]
    pub fn from_env() -> Self {
        let goos = std::env::var("GOOS")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| host_goos().to_string());
        let goarch = std::env::var("GOARCH")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| host_goarch().to_string());
        let cgo_enabled = std::env::var("CGO_ENABLED").map_or(true, |v| v != "0");

        debug!(goos, goarch, cgo_enabled, "Build context from environment");
        Self::new(goos, goarch).with_cgo(cgo_enabled)
    }

    /// Enable or disable cgo.
    #[must_use]
    pub fn with_cgo(mut self, enabled: bool) -> Self {
        self.cgo_enabled = enabled;
        self
    }

    /// Replace the explicit build tags.
    #[must_use]
    pub fn with_build_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the release tags (`go1.1`, `go1.2`, ...).
    #[must_use]
    pub fn with_release_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.release_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Target operating system.
    #[must_use]
    pub fn goos(&self) -> &str {
        &self.goos
    }

    /// Target architecture.
    #[must_use]
    pub fn goarch(&self) -> &str {
        &self.goarch
    }

    /// Whether files importing `"C"` are included.
    #[must_use]
    pub fn cgo_enabled(&self) -> bool {
        self.cgo_enabled
    }

    /// Explicit build tags.
    #[must_use]
    pub fn build_tags(&self) -> &[String] {
        &self.build_tags
    }

    /// Returns `true` if this configuration satisfies `tag`.
    #[must_use]
    pub fn satisfies(&self, tag: &str) -> bool {
        if tag == self.goos || tag == self.goarch {
            return true;
        }
        if tag == "cgo" && self.cgo_enabled {
            return true;
        }
        if tag == "unix" && UNIX_OS.contains(&self.goos.as_str()) {
            return true;
        }
        let implied = match self.goos.as_str() {
            "android" => "linux",
            "illumos" => "solaris",
            "ios" => "darwin",
            _ => "",
        };
        if !implied.is_empty() && tag == implied {
            return true;
        }
        self.build_tags.iter().any(|t| t == tag) || self.release_tags.iter().any(|t| t == tag)
    }

    /// Check a file name's `_GOOS`/`_GOARCH` suffix.
    ///
    /// Every OS or architecture named by the suffix is added to `tags`.
    pub fn match_file_name(&self, file_name: &str, tags: &mut BTreeSet<String>) -> bool {
        let Some(stem) = file_name.strip_suffix(".go") else {
            return false;
        };
        let Some(idx) = stem.find('_') else {
            return true;
        };

        let mut parts: Vec<&str> = stem[idx..].split('_').collect();
        if parts.last() == Some(&"test") {
            parts.pop();
        }

        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            let os_ok = self.match_tag(parts[n - 2], tags);
            let arch_ok = self.match_tag(parts[n - 1], tags);
            return os_ok && arch_ok;
        }
        if n >= 1 && (KNOWN_OS.contains(&parts[n - 1]) || KNOWN_ARCH.contains(&parts[n - 1])) {
            return self.match_tag(parts[n - 1], tags);
        }
        true
    }

    fn match_tag(&self, tag: &str, tags: &mut BTreeSet<String>) -> bool {
        tags.insert(tag.to_string());
        self.satisfies(tag)
    }

    /// Scan `dir` and decide which files belong to the package.
    ///
    /// Reads file headers only; nothing is parsed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or a candidate file cannot be
    /// read, and [`Error::MultiplePackages`] if the selected files disagree on
    /// the package name.
    pub fn scan_dir(&self, dir: &Path) -> Result<DirInfo> {
        let mut names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut info = DirInfo {
            dir: dir.to_path_buf(),
            ..DirInfo::default()
        };
        let mut all_tags = BTreeSet::new();
        let mut package: Option<String> = None;

        for name in names {
            if !name.ends_with(".go") || name.starts_with('_') || name.starts_with('.') {
                continue;
            }
            let path = dir.join(&name);

            if !self.match_file_name(&name, &mut all_tags) {
                trace!(file = %path.display(), "Excluded by file name suffix");
                info.ignored_files.push(path);
                continue;
            }
            if name.ends_with("_test.go") {
                continue;
            }

            let bytes = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
            let content = String::from_utf8_lossy(&bytes);
            let header = read_header(&content);

            if !self.match_constraints(&path, &header, &mut all_tags) {
                trace!(file = %path.display(), "Excluded by build constraint");
                info.ignored_files.push(path);
                continue;
            }

            if header.imports_c {
                all_tags.insert("cgo".to_string());
                if !self.cgo_enabled {
                    trace!(file = %path.display(), "Excluded cgo file (cgo disabled)");
                    info.ignored_files.push(path);
                    continue;
                }
            }

            let Some(file_package) = header.package else {
                warn!(file = %path.display(), "No package clause, skipping file");
                info.ignored_files.push(path);
                continue;
            };
            // `package documentation` files exist only for godoc.
            if file_package == "documentation" {
                info.ignored_files.push(path);
                continue;
            }
            match &package {
                None => package = Some(file_package),
                Some(existing) if *existing != file_package => {
                    return Err(Error::MultiplePackages {
                        dir: dir.to_path_buf(),
                        first: existing.clone(),
                        second: file_package,
                    });
                }
                Some(_) => {}
            }

            if header.imports_c {
                info.cgo_files.push(path);
            } else {
                info.go_files.push(path);
            }
        }

        info.name = package;
        info.all_tags = all_tags.into_iter().collect();
        Ok(info)
    }

    fn match_constraints(
        &self,
        path: &Path,
        header: &header::FileHeader,
        all_tags: &mut BTreeSet<String>,
    ) -> bool {
        let parsed = if let Some(line) = &header.go_build {
            constraint::parse_go_build(line).map(Some)
        } else {
            constraint::parse_plus_build_lines(&header.plus_build)
        };

        match parsed {
            Ok(Some(expr)) => {
                all_tags.extend(expr.tags().into_iter().map(str::to_string));
                expr.eval(&|tag| self.satisfies(tag))
            }
            Ok(None) => true,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Malformed build constraint, skipping file");
                false
            }
        }
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(host_goos(), host_goarch())
    }
}

/// Map the host operating system to its `GOOS` name.
#[must_use]
pub fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Map the host architecture to its `GOARCH` name.
#[must_use]
pub fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}

/// Files of one directory that apply under a [`BuildContext`].
#[derive(Debug, Clone, Default)]
pub struct DirInfo {
    /// Scanned directory
    pub dir: PathBuf,
    /// Package clause name shared by the selected files
    pub name: Option<String>,
    /// Selected Go files, sorted by name
    pub go_files: Vec<PathBuf>,
    /// Selected files importing `"C"`, sorted by name
    pub cgo_files: Vec<PathBuf>,
    /// Go files excluded by the configuration
    pub ignored_files: Vec<PathBuf>,
    /// Sorted tags mentioned by any file name or constraint in the directory
    pub all_tags: Vec<String>,
}

impl DirInfo {
    /// Returns `true` if no file applies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.go_files.is_empty() && self.cgo_files.is_empty()
    }

    /// Selected files: Go files first, then cgo files.
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.go_files.iter().chain(self.cgo_files.iter())
    }
}
