//! Pure formatting functions for UI output.
//!
//! Status lines go to stderr; only command results are printed to stdout so
//! they can be captured by a shell step. `console` drops the colors when
//! stderr is not a terminal, which is the normal case on a CI runner.

use crate::boundary::BoundaryWarning;
use crate::build::BuildReport;
use crate::ledger::ReleaseCheck;
use crate::resolver::ResolvedVersion;
use console::style;
use std::collections::BTreeMap;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    eprintln!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    eprintln!("{} {}", style("→").yellow(), message);
}

/// Display a boundary warning to the user.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Summary of how a version was resolved, one fact per line.
///
/// # Arguments
/// * `resolved` - The resolution outcome
pub fn format_resolution(resolved: &ResolvedVersion) -> Vec<String> {
    vec![
        format!("Type:    {}", resolved.commit_type),
        format!("Commit:  {}", crate::domain::commit::short_hash(&resolved.commit)),
        format!("Base:    {}", resolved.base),
        format!("Bump:    {}", resolved.bump),
        format!("Version: {}", resolved.tag),
    ]
}

pub fn display_resolution(resolved: &ResolvedVersion) {
    eprintln!("\n{}", style("Resolved version:").bold());
    for line in format_resolution(resolved) {
        eprintln!("  {}", line);
    }
}

/// `true <tag>` on a hit, `false` on a miss.
pub fn format_release_check(check: &ReleaseCheck) -> String {
    if check.released {
        format!("true {}", check.tag)
    } else {
        "false".to_string()
    }
}

/// One line per packaged target, or a single skip notice
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    match report {
        BuildReport::AlreadyReleased { tag } => {
            vec![format!("Skipped build: commit already released as {}", tag)]
        }
        BuildReport::Built { outputs } => outputs
            .iter()
            .map(|o| format!("{}  {}  {}", o.target, o.sha256, o.archive.display()))
            .collect(),
    }
}

pub fn display_build_report(report: &BuildReport) {
    match report {
        BuildReport::AlreadyReleased { .. } => {
            for line in format_build_report(report) {
                display_status(&line);
            }
        }
        BuildReport::Built { outputs } => {
            eprintln!("\n{}", style(format!("Packaged {} target(s):", outputs.len())).bold());
            for line in format_build_report(report) {
                eprintln!("  {}", line);
            }
        }
    }
}

/// `KEY=VALUE` lines in key order
pub fn format_exports(values: &BTreeMap<String, String>) -> Vec<String> {
    values.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}
