use clap::Parser;
use php_type_checker::cli::Cli;
use php_type_checker::{run_checker, CheckerConfig};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(path) = &cli.eval {
        tracing::info!(file = %path, "--eval accepted for compatibility, no additional evaluation performed");
    }

    let config = CheckerConfig {
        self_check: cli.self_check,
        ignored_prefixes: cli.ignore_file_prefix.clone(),
    };

    let outcome = match run_checker(&cli.files, &config) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    for diagnostic in &outcome.diagnostics {
        println!("{diagnostic}");
    }

    if cli.statistics {
        eprintln!(
            "{} file(s) analyzed, {} diagnostic(s)",
            outcome.files_analyzed,
            outcome.diagnostics.len()
        );
    }

    if outcome.has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
