//! Command-line argument definitions, parsed by `main` with `clap`.

use camino::Utf8PathBuf;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "phac", version, about = "Static type checker for a PHP-like dynamically-typed language")]
pub struct Cli {
    /// Source files to analyze.
    pub files: Vec<Utf8PathBuf>,

    /// Skip files whose canonical path starts with this prefix. May be repeated.
    #[arg(long = "ignore-file-prefix")]
    pub ignore_file_prefix: Vec<Utf8PathBuf>,

    /// Tolerate redeclaration of already-registered names, for re-running the
    /// checker over output it has already analyzed.
    #[arg(long)]
    pub self_check: bool,

    /// Print a one-line summary of files analyzed and diagnostics found.
    #[arg(long)]
    pub statistics: bool,

    /// Increase log verbosity. May be repeated (`-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Accepted for compatibility with the host tool's invocation; performs
    /// no additional evaluation beyond the files already given.
    #[arg(long)]
    pub eval: Option<Utf8PathBuf>,
}
