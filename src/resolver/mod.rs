//! Version resolution engine: git history plus invocation context in, next version out

pub mod version_resolver;

pub use version_resolver::{ResolvedVersion, VersionResolver};
