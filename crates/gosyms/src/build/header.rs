//! Lightweight reading of a Go file's header.
//!
//! Deciding whether a file belongs to a package under a configuration only
//! needs the leading comments (build constraints), the package clause, and
//! the import block (to spot `import "C"`). Reading those lines is far cheaper
//! than a full parse, so directory scanning never touches the parser.

use super::constraint;

/// What the header of one Go file declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    /// First `//go:build` line followed by a blank line, if any (takes precedence)
    pub go_build: Option<String>,
    /// `// +build` lines that were followed by a blank line
    pub plus_build: Vec<String>,
    /// Package clause name
    pub package: Option<String>,
    /// Whether the file imports the pseudo package `"C"`
    pub imports_c: bool,
}

/// Read the header of a Go source file.
#[must_use]
pub fn read_header(content: &str) -> FileHeader {
    let mut header = FileHeader::default();
    let mut lines = content.lines();
    let mut in_block_comment = false;
    let mut pending_plus: Vec<String> = Vec::new();
    let mut pending_go_build: Option<String> = None;

    // Leading comments, up to the package clause.
    for raw in lines.by_ref() {
        let line = raw.trim();

        if in_block_comment {
            if line.contains("*/") {
                in_block_comment = false;
            }
            continue;
        }

        if line.is_empty() {
            // Constraints only count when a blank line separates them from the
            // package doc comment.
            header.plus_build.append(&mut pending_plus);
            if header.go_build.is_none() {
                header.go_build = pending_go_build.take();
            }
            continue;
        }

        if line.starts_with("//") {
            if constraint::is_go_build(line) {
                if pending_go_build.is_none() {
                    pending_go_build = Some(line.to_string());
                }
            } else if constraint::is_plus_build(line) {
                pending_plus.push(line.to_string());
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("/*") {
            if !rest.contains("*/") {
                in_block_comment = true;
            }
            pending_plus.clear();
            pending_go_build = None;
            continue;
        }

        if let Some(rest) = line.strip_prefix("package") {
            header.package = package_name(rest);
        }
        break;
    }

    if header.package.is_none() {
        return header;
    }

    // Import declarations, up to the first other declaration.
    let mut in_import_block = false;
    for raw in lines {
        let line = strip_line_comment(raw.trim());

        if in_block_comment {
            if line.contains("*/") {
                in_block_comment = false;
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("/*") {
            if !rest.contains("*/") {
                in_block_comment = true;
            }
            continue;
        }

        if in_import_block {
            if line.starts_with(')') {
                in_import_block = false;
            } else if import_spec_is_c(line) {
                header.imports_c = true;
            }
            continue;
        }

        let Some(rest) = line.strip_prefix("import") else {
            break;
        };
        let rest = rest.trim_start();
        if rest.starts_with('(') {
            let inner = rest[1..].trim();
            if let Some(inner) = inner.strip_suffix(')') {
                header.imports_c |= inner.split(';').any(|spec| import_spec_is_c(spec.trim()));
            } else {
                in_import_block = true;
                if import_spec_is_c(inner) {
                    header.imports_c = true;
                }
            }
        } else if import_spec_is_c(rest) {
            header.imports_c = true;
        }
    }

    header
}

fn package_name(rest: &str) -> Option<String> {
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

fn strip_line_comment(line: &str) -> &str {
    // Only used on import lines, where `//` cannot appear inside the quoted
    // import path in practice.
    match line.find("//") {
        Some(idx) => line[..idx].trim_end(),
        None => line,
    }
}

fn import_spec_is_c(spec: &str) -> bool {
    let spec = spec.trim().trim_end_matches(';').trim();
    spec == "\"C\"" || spec == "`C`"
}
