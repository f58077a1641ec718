//! Terminal report.
//!
//! Progress lines and error blocks go to the wrapped writer (stdout in the
//! binary); logs go to stderr through `tracing`.

use std::io::{self, Write};

use colored::Colorize;
use gitops_values::{FatalError, ServiceInstance, ValidationError};

const TWINGATE_DOC_URL: &str =
    "https://kpler.atlassian.net/wiki/spaces/KSD/pages/243562083/Install+and+configure+the+Twingate+VPN+client";

/// Writes the human-readable report.
#[derive(Debug)]
pub struct Reporter<W> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// `Checking <instance> `, left open for the verdict.
    pub fn checking(&mut self, instance: &ServiceInstance) -> io::Result<()> {
        write!(self.out, "Checking {instance} ")?;
        self.out.flush()
    }

    pub fn passed(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", "PASSED".green())
    }

    /// Verdict plus one block per error.
    pub fn failed(&mut self, instance: &ServiceInstance, errors: &[ValidationError]) -> io::Result<()> {
        writeln!(self.out, "{}", "FAILED".red())?;
        let files = instance
            .values_files()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            self.out,
            "\nThe following error(s) were found in the files {files}\nunder {}:\n",
            instance.rel_path().display()
        )?;
        self.errors(errors)
    }

    /// Errors spanning several instances, such as duplicate service names.
    pub fn repository_errors(&mut self, errors: &[ValidationError]) -> io::Result<()> {
        writeln!(self.out, "\nThe following error(s) were found across applications:\n")?;
        self.errors(errors)
    }

    pub fn fatal(&mut self, error: &FatalError) -> io::Result<()> {
        writeln!(
            self.out,
            "\n\n{} {error}\n       Please check that your Twingate VPN Client is up and running configured.\n       More info at {TWINGATE_DOC_URL}\n\n",
            "FATAL:".red()
        )
    }

    fn errors(&mut self, errors: &[ValidationError]) -> io::Result<()> {
        for error in errors {
            writeln!(self.out, "{}\n", indent(&format_error(error), "  "))?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// One error block, unindented.
///
/// Schema hints are split: the first line follows `Hint:`, the rest is
/// indented underneath.
pub fn format_error(error: &ValidationError) -> String {
    let mut block = format!(
        "{} {}\n   at: {}",
        "ERROR:".red(),
        error.message(),
        error.location().bold()
    );
    match error {
        ValidationError::Schema { hint: Some(hint), .. } => {
            let (title, description) = hint.split_once('\n').unwrap_or((hint, ""));
            block.push_str(&format!("\n\n {} {title}\n\n", "Hint:".bold()));
            block.push_str(&indent(description, "       "));
        }
        ValidationError::Infrastructure { hint: Some(hint), .. } => {
            block.push_str(&format!("\n\n {} {hint}\n", "Hint:".bold()));
        }
        _ => {}
    }
    block
}

/// Prefix every line that is not blank.
fn indent(text: &str, prefix: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect()
}
