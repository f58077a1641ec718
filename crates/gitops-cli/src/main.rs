//! # gitops-values-validation entry point
//!
//! Parses arguments, initializes logging on stderr and runs the hook
//! against the repository root.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gitops_cli::{build_context, run, Reporter};
use gitops_values::GitOpsRepository;

/// Validate GitOps Helm values against the platform-managed chart schema.
///
/// Schemas are downloaded from `GITOPS_SCHEMA_BASE_URL` (with a timeout of
/// `GITOPS_SCHEMA_TIMEOUT_SECS` seconds per request).
#[derive(Parser, Debug)]
#[command(name = "gitops-values-validation", version, about, long_about = None)]
struct Cli {
    /// Repository root containing the `gitops/` directory. Defaults to the
    /// current directory.
    root: Option<PathBuf>,

    /// YAML file of violations to ignore, replacing the built-in table.
    #[arg(long)]
    ignore_file: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Enable verbose logging. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match execute(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn execute(cli: &Cli) -> anyhow::Result<u8> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    tracing::debug!(root = %root.display(), "resolved repository root");

    let ctx = build_context(cli.ignore_file.as_deref())?;
    let repository = GitOpsRepository::new(root);
    let mut reporter = Reporter::new(std::io::stdout().lock());
    let outcome = run(&repository, &ctx, &mut reporter)?;
    Ok(outcome.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["gitops-values-validation"]).unwrap();
        assert!(cli.root.is_none());
        assert!(cli.ignore_file.is_none());
        assert!(!cli.no_color);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn all_options() {
        let cli = Cli::try_parse_from([
            "gitops-values-validation",
            "/repo",
            "--ignore-file",
            "ignored.yaml",
            "--no-color",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/repo")));
        assert_eq!(cli.ignore_file, Some(PathBuf::from("ignored.yaml")));
        assert!(cli.no_color);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["gitops-values-validation", "--fix"]).is_err());
    }
}
