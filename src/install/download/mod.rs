//! GitHub release download and archive extraction
//!
//! ## Module Organization
//!
//! - `platform` - Platform detection and release asset naming
//! - `github` - GitHub API interaction for release discovery
//! - `core` - Streaming download with progress tracking
//! - `extract` - Platform-specific archive extraction (ZIP, tar.gz)

pub mod core;
pub mod extract;
pub mod github;
pub mod platform;

pub use self::core::Fetcher;
pub use self::extract::{UNIX_BINARY_NAME, extract};
pub use self::github::{GitHubAsset, GitHubRelease, ReleaseAsset, ReleaseResolver, select_asset};
pub use self::platform::{ArchiveKind, Platform, host_kernel_name};
