//! The syntax-only pipeline on a bounded worker pool.

use std::fs;
use std::path::Path;

use gosyms::{BuildContext, Config, Finder, SearchResults, SourceLocator, Strategy, SymbolKind};
use rstest::rstest;
use tempfile::TempDir;

const PACKAGES: usize = 100;

fn workspace_with_packages(count: usize) -> TempDir {
    let dir = tempfile::tempdir().expect("should create temp dir");
    for i in 0..count {
        let pkg_dir = dir.path().join(format!("p{i:03}"));
        fs::create_dir_all(&pkg_dir).expect("should create package dir");
        let source = format!(
            "package p{i:03}\n\nconst ValueOf{i} = {i}\n\nvar stateOf{i} int\n\nfunc FuncOf{i}() {{\n\ttype innerOf{i} int\n}}\n\ntype TypeOf{i} struct {{\n\tFieldOf{i} int\n}}\n\nfunc (t TypeOf{i}) MethodOf{i}() {{}}\n"
        );
        fs::write(pkg_dir.join("p.go"), source).expect("should write file");
    }
    dir
}

fn search(root: &Path, workers: usize, query: &str) -> SearchResults {
    let config = Config::new(root)
        .with_strategy(Strategy::SyntaxOnly)
        .with_workers(workers)
        .with_build_context(BuildContext::new("linux", "amd64"))
        .with_locator(SourceLocator::default());
    Finder::new(config)
        .expect("should create finder")
        .search(query)
        .expect("search should succeed")
}

#[test]
fn every_package_is_accounted_for_within_the_worker_bound() {
    let dir = workspace_with_packages(PACKAGES);

    let results = search(dir.path(), 8, "of");

    let stats = &results.stats;
    // The root directory is a candidate too.
    assert_eq!(stats.packages_discovered, PACKAGES + 1);
    assert_eq!(stats.packages_processed + stats.packages_skipped, PACKAGES + 1);
    assert_eq!(stats.packages_skipped, 0);
    assert_eq!(stats.local_packages, PACKAGES);
    assert!(stats.peak_concurrency >= 1);
    assert!(stats.peak_concurrency <= 8, "peak was {}", stats.peak_concurrency);
}

#[test]
fn sorted_results_are_identical_across_runs() {
    let dir = workspace_with_packages(PACKAGES);

    let first = search(dir.path(), 8, "of").sorted_symbols();
    let second = search(dir.path(), 8, "of").sorted_symbols();
    let sequential = search(dir.path(), 1, "of").sorted_symbols();

    assert_eq!(first, second);
    assert_eq!(first, sequential);
}

#[rstest]
#[case::single(1)]
#[case::few(3)]
#[case::many(16)]
fn only_top_level_funcs_methods_and_types_are_reported(#[case] workers: usize) {
    let dir = workspace_with_packages(10);

    let results = search(dir.path(), workers, "of");

    assert_eq!(results.symbols.len(), 30);
    for symbol in &results.symbols {
        match symbol.kind {
            SymbolKind::Func => assert!(
                symbol.name.starts_with("FuncOf") || symbol.name.starts_with("MethodOf"),
                "{symbol:?}"
            ),
            SymbolKind::Type => assert!(symbol.name.starts_with("TypeOf"), "{symbol:?}"),
            SymbolKind::Var | SymbolKind::Const => panic!("unexpected {symbol:?}"),
        }
    }
}

#[test]
fn failures_do_not_stop_the_batch() {
    let dir = workspace_with_packages(20);
    fs::write(dir.path().join("p005").join("p.go"), "package p005\n\nfunc ( {\n").unwrap();
    fs::write(
        dir.path().join("p011").join("q.go"),
        "package other\n\ntype TypeOfOther int\n",
    )
    .unwrap();

    let results = search(dir.path(), 4, "typeof");

    assert_eq!(results.stats.packages_skipped, 2);
    assert_eq!(results.stats.packages_processed, 21 - 2);
    assert_eq!(results.symbols.len(), 18);
}
