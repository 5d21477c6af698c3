//! Buffered file access with memory mapping support

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use memmap2::{Mmap, MmapOptions};
use tracing::debug;

use crate::error::Result;
use crate::types::Charset;

/// Byte buffer over one content file. Opens memory-mapped where possible,
/// falling back to reading the file into memory. `make_resident` copies a
/// mapped file into an owned buffer exactly once; after that the content
/// is frozen.
pub struct FileBuffer {
    path: PathBuf,
    charset: Charset,
    map: Option<Mmap>,
    resident: OnceLock<Box<[u8]>>,
}

impl FileBuffer {
    /// Open the file at `path`.
    pub fn open(path: &Path, charset: Charset) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let map = if len > 0 {
            match unsafe { MmapOptions::new().map(&file) } {
                Ok(map) => Some(map),
                Err(e) => {
                    debug!("failed to memory-map {path:?}, reading into memory: {e}");
                    None
                }
            }
        } else {
            None
        };

        let resident = OnceLock::new();
        if map.is_none() {
            let _ = resident.set(std::fs::read(path)?.into_boxed_slice());
        }

        debug!("opened {path:?} ({len} bytes, mapped: {})", map.is_some());
        Ok(Self {
            path: path.to_path_buf(),
            charset,
            map,
            resident,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The full file content.
    pub fn data(&self) -> &[u8] {
        if let Some(resident) = self.resident.get() {
            resident
        } else if let Some(map) = &self.map {
            map
        } else {
            &[]
        }
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Whether the content is held in an owned in-memory buffer.
    pub fn is_resident(&self) -> bool {
        self.resident.get().is_some()
    }

    /// Copy a mapped file into an owned buffer. Idempotent; the owned
    /// buffer never changes once set.
    pub fn make_resident(&self) {
        if let Some(map) = &self.map {
            let _ = self.resident.get_or_init(|| map.to_vec().into_boxed_slice());
        }
    }

    /// Walk backward from an arbitrary byte to the start of the line
    /// containing it.
    pub fn line_start(&self, pos: usize) -> usize {
        let data = self.data();
        let mut i = pos.min(data.len());
        while i > 0 && data[i - 1] != b'\n' {
            i -= 1;
        }
        i
    }

    /// Read the line beginning at `offset`, returning it decoded without
    /// its terminator, along with the offset of the next line. Returns
    /// `None` at or past the end of the buffer.
    pub fn line_at(&self, offset: usize) -> Option<(String, usize)> {
        let data = self.data();
        if offset >= data.len() {
            return None;
        }
        let (raw, next) = match data[offset..].iter().position(|&b| b == b'\n') {
            Some(i) => (&data[offset..offset + i], offset + i + 1),
            None => (&data[offset..], data.len()),
        };
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        Some((self.charset.decode(raw), next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn buffer_of(content: &[u8]) -> FileBuffer {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content).expect("write fixture");
        FileBuffer::open(file.path(), Charset::Utf8).expect("open buffer")
    }

    #[test]
    fn reads_lines_at_offsets() {
        let buffer = buffer_of(b"alpha\nbeta\ngamma\n");
        assert_eq!(buffer.line_at(0), Some(("alpha".to_owned(), 6)));
        assert_eq!(buffer.line_at(6), Some(("beta".to_owned(), 11)));
        assert_eq!(buffer.line_at(11), Some(("gamma".to_owned(), 17)));
        assert_eq!(buffer.line_at(17), None);
    }

    #[test]
    fn rewinds_to_line_start() {
        let buffer = buffer_of(b"alpha\nbeta\ngamma\n");
        assert_eq!(buffer.line_start(0), 0);
        assert_eq!(buffer.line_start(3), 0);
        assert_eq!(buffer.line_start(6), 6);
        assert_eq!(buffer.line_start(8), 6);
        assert_eq!(buffer.line_start(16), 11);
    }

    #[test]
    fn strips_carriage_returns() {
        let buffer = buffer_of(b"alpha\r\nbeta\r\n");
        assert_eq!(buffer.line_at(0), Some(("alpha".to_owned(), 7)));
        assert_eq!(buffer.line_at(7), Some(("beta".to_owned(), 13)));
    }

    #[test]
    fn handles_missing_final_newline() {
        let buffer = buffer_of(b"alpha\nbeta");
        assert_eq!(buffer.line_at(6), Some(("beta".to_owned(), 10)));
    }

    #[test]
    fn residence_is_frozen_once_loaded() {
        let buffer = buffer_of(b"alpha\n");
        let mapped = buffer.map.is_some();
        buffer.make_resident();
        if mapped {
            assert!(buffer.is_resident());
        }
        assert_eq!(buffer.line_at(0), Some(("alpha".to_owned(), 6)));
    }

    #[test]
    fn latin1_decoding() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&[0x63, 0x61, 0x66, 0xE9, b'\n'])
            .expect("write fixture");
        let buffer = FileBuffer::open(file.path(), Charset::Latin1).expect("open buffer");
        assert_eq!(buffer.line_at(0), Some(("café".to_owned(), 5)));
    }
}
