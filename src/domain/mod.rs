//! Domain logic - pure rules independent of git, the network and the filesystem

pub mod branch;
pub mod commit;
pub mod context;
pub mod prerelease;
pub mod release;
pub mod tag;
pub mod target;
pub mod version;

pub use branch::BranchContext;
pub use commit::CommitRef;
pub use context::{CommitType, InvocationContext};
pub use prerelease::PreRelease;
pub use release::Release;
pub use tag::TagRef;
pub use target::Target;
pub use version::{Version, VersionBump};
