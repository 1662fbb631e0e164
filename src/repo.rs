//! The filesystem abstraction consumed by the rest of the crate, plus a
//! `std::fs`-backed implementation and an in-memory one used by tests.

use std::io;

mod fs;
#[cfg(any(test, feature = "test"))]
pub mod mem;

pub use self::fs::Fs;
#[cfg(any(test, feature = "test"))]
pub use mem::Memory;

/// A repository of segment files, injected into [`crate::LogManager`] so
/// recovery and writes can be tested against an in-memory filesystem.
///
/// Any implementation of this set of operations suffices.
pub trait Repo: Clone {
    /// A single open segment file, readable, writable and seekable.
    type Segment: io::Read + io::Write + io::Seek;

    /// Create the log directory if it does not already exist.
    fn create_dir_if_missing(&self) -> io::Result<()>;

    /// List the file names directly inside the log directory.
    ///
    /// Entries that are not regular files, or whose name does not match the
    /// segment naming grammar, are filtered out by the caller, not here.
    fn get_children(&self) -> io::Result<Vec<String>>;

    /// Open `file_name` for appending, creating it if it does not exist.
    fn open_for_append(&self, file_name: &str) -> io::Result<Self::Segment>;

    /// Open an existing file for reading. Returns
    /// [`io::ErrorKind::NotFound`] if it does not exist.
    fn open_for_read(&self, file_name: &str) -> io::Result<Self::Segment>;

    /// Rename `from` to `to` within the log directory.
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    /// Remove `file_name`. Returns [`io::ErrorKind::NotFound`] if it does
    /// not exist.
    fn unlink(&self, file_name: &str) -> io::Result<()>;

    /// Flush `segment`'s data to stable storage (fdatasync semantics).
    fn fdatasync(&self, segment: &mut Self::Segment) -> io::Result<()>;
}
