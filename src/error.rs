use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for relgate operations
#[derive(Error, Debug)]
pub enum RelgateError {
    #[error("Git reference not found: {0}")]
    RefNotFound(String),

    #[error("No semver tag reachable from '{from}'")]
    NoBaseVersionFound { from: String },

    #[error("Invalid invocation context: {0}")]
    InvalidContext(String),

    #[error("Release not found: {0}")]
    ReleaseNotFound(String),

    #[error("Not in a CI environment: {0}")]
    NotInCiEnvironment(String),

    #[error("Archive I/O failed for '{}': {source}", path.display())]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache I/O failed: {0}")]
    CacheIo(String),

    #[error("Build script '{script}' failed for {target}: {message}")]
    Build {
        script: String,
        target: String,
        message: String,
    },

    #[error("Release provider error: {0}")]
    Release(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version parsing error: {0}")]
    Version(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("git command `{command}` failed: {stderr}")]
    GitCommand { command: String, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in relgate
pub type Result<T> = std::result::Result<T, RelgateError>;

impl RelgateError {
    pub fn ref_not_found(reference: impl Into<String>) -> Self {
        RelgateError::RefNotFound(reference.into())
    }

    pub fn invalid_context(msg: impl Into<String>) -> Self {
        RelgateError::InvalidContext(msg.into())
    }

    pub fn release_not_found(msg: impl Into<String>) -> Self {
        RelgateError::ReleaseNotFound(msg.into())
    }

    pub fn not_in_ci(msg: impl Into<String>) -> Self {
        RelgateError::NotInCiEnvironment(msg.into())
    }

    /// Wrap an I/O failure during pack/unpack with the path being processed
    pub fn archive_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RelgateError::ArchiveIo {
            path: path.into(),
            source,
        }
    }

    pub fn cache_io(msg: impl Into<String>) -> Self {
        RelgateError::CacheIo(msg.into())
    }

    /// Attribute a build failure to the script and the `os/arch` target it ran for
    pub fn build(
        script: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RelgateError::Build {
            script: script.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn release(msg: impl Into<String>) -> Self {
        RelgateError::Release(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        RelgateError::Config(msg.into())
    }

    pub fn version(msg: impl Into<String>) -> Self {
        RelgateError::Version(msg.into())
    }

    /// True for the "nothing there" kinds that callers commonly branch on
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RelgateError::RefNotFound(_)
                | RelgateError::ReleaseNotFound(_)
                | RelgateError::NoBaseVersionFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelgateError::config("test config issue");
        assert_eq!(err.to_string(), "Configuration error: test config issue");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RelgateError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_no_base_version_names_ref() {
        let err = RelgateError::NoBaseVersionFound {
            from: "HEAD".to_string(),
        };
        assert_eq!(err.to_string(), "No semver tag reachable from 'HEAD'");
    }

    #[test]
    fn test_build_error_attributes_target() {
        let err = RelgateError::build("build.sh", "linux/arm64", "exit status 2");
        let msg = err.to_string();
        assert!(msg.contains("build.sh"));
        assert!(msg.contains("linux/arm64"));
        assert!(msg.contains("exit status 2"));
    }

    #[test]
    fn test_archive_io_keeps_source() {
        use std::error::Error as _;

        let err = RelgateError::archive_io(
            "dist/app.tar.gz",
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated"),
        );
        assert!(err.to_string().contains("dist/app.tar.gz"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_is_not_found() {
        assert!(RelgateError::ref_not_found("main").is_not_found());
        assert!(RelgateError::release_not_found("v1.0.0").is_not_found());
        assert!(!RelgateError::cache_io("disk full").is_not_found());
        assert!(!RelgateError::invalid_context("pr number").is_not_found());
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (RelgateError::ref_not_found("x"), "Git reference not found"),
            (RelgateError::invalid_context("x"), "Invalid invocation context"),
            (RelgateError::release_not_found("x"), "Release not found"),
            (RelgateError::not_in_ci("x"), "Not in a CI environment"),
            (RelgateError::cache_io("x"), "Cache I/O failed"),
            (RelgateError::release("x"), "Release provider error"),
            (RelgateError::version("x"), "Version parsing error"),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }
}
