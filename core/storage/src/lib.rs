//! CoachSync storage backends.
//!
//! Two seams live here:
//! - [`LocalMirror`]: the durable key/value store the cache and sync queue
//!   persist through. It is the source of truth across process restarts.
//! - [`RemoteApi`]: the wire contract of the coaching backend that the
//!   engine reads through and writes behind.
//!
//! Both seams ship an in-memory implementation for tests alongside the
//! production one.

pub mod file;
pub mod http;
pub mod memory;
pub mod mirror;
pub mod remote;

pub use file::FileMirror;
pub use http::HttpRemote;
pub use memory::{MemoryMirror, MemoryRemote};
pub use mirror::LocalMirror;
pub use remote::RemoteApi;

/// Default directory name for on-disk state, under the platform data dir.
pub const DATA_DIR_NAME: &str = "coachsync";

/// Resolve the default mirror directory for this platform.
pub fn default_mirror_dir() -> Option<std::path::PathBuf> {
    dirs::data_dir().map(|d| d.join(DATA_DIR_NAME).join("mirror"))
}
