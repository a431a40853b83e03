//! User interface module - result output and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions and stderr status lines
//! - This module - Writing command results to stdout

use std::io::{self, Write};

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_boundary_warning, display_build_report, display_error, display_resolution,
    display_status, display_success, format_build_report, format_exports, format_release_check,
    format_resolution,
};

/// Print a command's primary result on stdout.
///
/// A closed pipe (`relgate env | head -1`) is not an error.
pub fn print_result(value: &str) -> io::Result<()> {
    print_lines(std::slice::from_ref(&value))
}

/// Print each line on stdout, flushing once at the end.
pub fn print_lines<S: AsRef<str>>(lines: &[S]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        match writeln!(out, "{}", line.as_ref()) {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            other => other?,
        }
    }
    match out.flush() {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_lines_accepts_strings_and_strs() {
        print_lines(&["a", "b"]).unwrap();
        print_lines(&vec!["c".to_string()]).unwrap();
        print_result("v1.0.0").unwrap();
    }
}
