//! An in-memory [`Repo`], for fast unit and property tests that don't need
//! to touch the filesystem.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use super::Repo;

#[derive(Clone, Default)]
pub struct Memory {
    files: Rc<RefCell<BTreeMap<String, Rc<RefCell<Vec<u8>>>>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A handle onto one file's bytes, shared with the [`Memory`] repo it came
/// from so writes are visible to subsequent opens.
pub struct MemSegment {
    data: Rc<RefCell<Vec<u8>>>,
    pos: u64,
}

impl Read for MemSegment {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.borrow();
        let mut cursor = Cursor::new(&data[..]);
        cursor.set_position(self.pos);
        let n = cursor.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemSegment {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = self.data.borrow_mut();
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        self.pos = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemSegment {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.data.borrow().len() as u64;
        let new_pos = match pos {
            SeekFrom::Start(p) => p,
            SeekFrom::End(p) => (len as i64 + p).max(0) as u64,
            SeekFrom::Current(p) => (self.pos as i64 + p).max(0) as u64,
        };
        self.pos = new_pos;
        Ok(self.pos)
    }
}

impl Repo for Memory {
    type Segment = MemSegment;

    fn create_dir_if_missing(&self) -> io::Result<()> {
        Ok(())
    }

    fn get_children(&self) -> io::Result<Vec<String>> {
        Ok(self.files.borrow().keys().cloned().collect())
    }

    fn open_for_append(&self, file_name: &str) -> io::Result<Self::Segment> {
        let mut files = self.files.borrow_mut();
        let data = files.entry(file_name.to_string()).or_default().clone();
        let pos = data.borrow().len() as u64;
        Ok(MemSegment { data, pos })
    }

    fn open_for_read(&self, file_name: &str) -> io::Result<Self::Segment> {
        let files = self.files.borrow();
        let data = files
            .get(file_name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, file_name.to_string()))?;
        Ok(MemSegment { data, pos: 0 })
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let mut files = self.files.borrow_mut();
        let data = files
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.to_string()))?;
        files.insert(to.to_string(), data);
        Ok(())
    }

    fn unlink(&self, file_name: &str) -> io::Result<()> {
        self.files
            .borrow_mut()
            .remove(file_name)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, file_name.to_string()))
    }

    fn fdatasync(&self, _segment: &mut Self::Segment) -> io::Result<()> {
        Ok(())
    }
}
