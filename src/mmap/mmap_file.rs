use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::Path;

use crate::core::error::{Error, ErrorKind, Result};

/// Memory-mapped file for zero-copy reads.
///
/// Zero-length files are held as an empty buffer instead of a map; mapping
/// an empty file is an error on most platforms.
pub struct MmapFile {
    mmap: Option<Mmap>,
    len: usize,
}

impl MmapFile {
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            Error::new(
                ErrorKind::Io,
                format!("cannot open {}: {}", path.as_ref().display(), e),
            )
        })?;
        let len = file.metadata()?.len() as usize;

        if len == 0 {
            return Ok(MmapFile { mmap: None, len: 0 });
        }

        let mmap = unsafe { MmapOptions::new().len(len).map(&file)? };
        Ok(MmapFile { mmap: Some(mmap), len })
    }

    pub fn data(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A mmapped file viewed as a flat array of little-endian u64 values.
/// Shared by cursors via `Arc` so a reader can outlive the lock that
/// handed it out.
pub struct U64Array {
    file: MmapFile,
}

impl U64Array {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = MmapFile::open_read_only(&path)?;
        if file.len() % 8 != 0 {
            return Err(Error::new(
                ErrorKind::Parse,
                format!(
                    "{}: length {} is not a multiple of 8",
                    path.as_ref().display(),
                    file.len()
                ),
            ));
        }
        Ok(U64Array { file })
    }

    pub fn len(&self) -> usize {
        self.file.len() / 8
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_empty()
    }

    /// Value at `index`. Panics when out of range, like slice indexing.
    pub fn get(&self, index: usize) -> u64 {
        let bytes = self.file.data();
        let at = index * 8;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[at..at + 8]);
        u64::from_le_bytes(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn u64_array_reads_little_endian_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values");
        let mut f = File::create(&path).unwrap();
        for v in [0u64, 1, u64::MAX, 42] {
            f.write_all(&v.to_le_bytes()).unwrap();
        }
        f.flush().unwrap();

        let arr = U64Array::open(&path).unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.get(0), 0);
        assert_eq!(arr.get(1), 1);
        assert_eq!(arr.get(2), u64::MAX);
        assert_eq!(arr.get(3), 42);
    }

    #[test]
    fn empty_file_maps_to_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        File::create(&path).unwrap();
        let arr = U64Array::open(&path).unwrap();
        assert_eq!(arr.len(), 0);
    }

    #[test]
    fn misaligned_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd");
        let mut f = File::create(&path).unwrap();
        f.write_all(&[0u8; 12]).unwrap();
        assert!(U64Array::open(&path).is_err());
    }
}
