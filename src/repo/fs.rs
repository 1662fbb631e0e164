use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;

use super::Repo;

/// A [`Repo`] which stores segments as ordinary files on disk.
#[derive(Clone)]
pub struct Fs {
    root: PathBuf,
}

impl fmt::Debug for Fs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fs").field("root", &self.root).finish()
    }
}

impl fmt::Display for Fs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

impl Fs {
    /// Create a repo rooted at `root`. Does not touch the filesystem --
    /// call [`Repo::create_dir_if_missing`] before using it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}

impl Repo for Fs {
    type Segment = File;

    fn create_dir_if_missing(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    fn get_children(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn open_for_append(&self, file_name: &str) -> io::Result<Self::Segment> {
        OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(self.path_for(file_name))
    }

    fn open_for_read(&self, file_name: &str) -> io::Result<Self::Segment> {
        File::open(self.path_for(file_name))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.path_for(from), self.path_for(to))
    }

    fn unlink(&self, file_name: &str) -> io::Result<()> {
        fs::remove_file(self.path_for(file_name))
    }

    fn fdatasync(&self, segment: &mut Self::Segment) -> io::Result<()> {
        segment.sync_data()
    }
}
