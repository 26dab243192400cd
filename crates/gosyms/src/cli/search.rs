//! The search command: build a finder from the flags and print its results.

use std::path::PathBuf;

use clap::ValueEnum;
use gosyms::{BuildContext, Config, Finder, Strategy};

use super::display;

/// Pipeline selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Resolve imports and check declarations; reports vars and consts too
    Typed,
    /// Parallel parse of top-level funcs and types
    Syntax,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Typed => Strategy::Typed,
            StrategyArg::Syntax => Strategy::SyntaxOnly,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Pretty-printed JSON array of symbols
    Json,
    /// Human-readable listing
    Text,
}

/// Validated command-line options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub root: PathBuf,
    pub query: String,
    pub tags: Vec<String>,
    pub goos: Option<String>,
    pub goarch: Option<String>,
    pub no_cgo: bool,
    pub ignore: Vec<String>,
    pub strategy: StrategyArg,
    pub workers: Option<usize>,
    pub format: Format,
}

impl SearchOptions {
    fn build_context(&self) -> BuildContext {
        let env = BuildContext::from_env();
        let goos = self.goos.clone().unwrap_or_else(|| env.goos().to_string());
        let goarch = self
            .goarch
            .clone()
            .unwrap_or_else(|| env.goarch().to_string());

        BuildContext::new(goos, goarch)
            .with_cgo(env.cgo_enabled() && !self.no_cgo)
            .with_build_tags(self.tags.iter().filter(|t| !t.is_empty()).cloned())
    }

    fn config(&self) -> Config {
        let mut config = Config::new(&self.root)
            .with_strategy(self.strategy.into())
            .with_build_context(self.build_context());
        if !self.ignore.is_empty() {
            config = config.with_ignore(self.ignore.iter().cloned());
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config
    }
}

/// Run the search command.
pub fn run(options: &SearchOptions) -> Result<(), gosyms::Error> {
    let finder = Finder::new(options.config())?;
    let results = finder.search(&options.query)?;

    match options.format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&results.symbols).map_err(|e| {
                gosyms::Error::Config(format!("cannot encode results as JSON: {e}"))
            })?;
            println!("{json}");
        }
        Format::Text => display::print_results(&options.query, &results),
    }

    Ok(())
}
