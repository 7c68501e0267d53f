//! questlog-file - File-backed session storage.

mod storage;

pub use storage::FileStorage;
