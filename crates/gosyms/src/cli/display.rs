//! Text rendering of search results.

use colored::Colorize;
use gosyms::{ResultOrder, SearchResults};

const MAX_DISPLAY_ERRORS: usize = 10;

/// Print symbols followed by a short summary of the run.
pub fn print_results(query: &str, results: &SearchResults) {
    if results.symbols.is_empty() {
        println!("No symbols found matching \"{query}\"");
    } else {
        println!(
            "Found {} symbols matching \"{}\":",
            results.symbols.len().to_string().green().bold(),
            query.cyan()
        );
        println!();

        // Parallel results arrive in scheduling order; sort for a stable listing.
        let symbols = match results.order {
            ResultOrder::Discovery => results.symbols.clone(),
            ResultOrder::Unspecified => results.sorted_symbols(),
        };
        for sym in &symbols {
            let location = format!("{}:{}:{}", sym.path.display(), sym.line + 1, sym.character + 1);
            println!(
                "  {} {} {}",
                sym.name.white().bold(),
                format!("({} in {})", sym.kind, sym.package).dimmed(),
                format!("- {location}").dimmed()
            );
        }
    }

    let stats = &results.stats;
    println!();
    println!(
        "{} packages, {} local, {} skipped in {:.2?}",
        stats.packages_discovered,
        stats.local_packages,
        stats.packages_skipped,
        stats.duration
    );

    for error in stats.errors.iter().take(MAX_DISPLAY_ERRORS) {
        println!("  {} {error}", "•".dimmed());
    }
    if stats.errors.len() > MAX_DISPLAY_ERRORS {
        println!(
            "  {} ... and {} more",
            "•".dimmed(),
            stats.errors.len() - MAX_DISPLAY_ERRORS
        );
    }
    if !stats.diagnostics.is_empty() {
        println!(
            "{}: {} type-check diagnostics (run with -vv to see them)",
            "note".dimmed(),
            stats.diagnostics.len()
        );
    }
}
