//! Data sources: one open content file plus its search strategy
//!
//! A [`DataSource`] binds a file to a content category and answers keyed
//! line lookups via one of two strategies: direct byte-offset access for
//! offset-keyed files, or comparator-driven bisection for sorted files.
//! Malformed keys and out-of-range offsets resolve to "not found"; only
//! environmental problems at open time are errors.

mod buffer;

pub use buffer::FileBuffer;

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::compare::{Comparator, is_header_line};
use crate::content::ContentCategory;
use crate::error::Result;
use crate::parse;
use crate::types::{Charset, Version};

/// How keys are located in a source, dispatched by `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// The key is the decimal byte offset of the record.
    DirectOffset,
    /// Records are bisected by byte offset using a line comparator.
    BinarySearch(Comparator),
}

/// One content file opened for keyed access.
pub struct DataSource {
    category: ContentCategory,
    buffer: FileBuffer,
    strategy: SearchStrategy,
    version: Option<Version>,
}

impl DataSource {
    /// Open the file at `path` for the given category and strategy.
    pub fn open(
        path: &Path,
        category: ContentCategory,
        strategy: SearchStrategy,
        charset: Charset,
    ) -> Result<Self> {
        let buffer = FileBuffer::open(path, charset)?;
        let version = if category.kind.has_version_header() {
            scan_version(&buffer)
        } else {
            None
        };
        debug!(
            "opened source {category} from {:?} ({:?}, version {version:?})",
            path.file_name(),
            strategy,
        );
        Ok(Self {
            category,
            buffer,
            strategy,
            version,
        })
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    pub fn path(&self) -> &Path {
        self.buffer.path()
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// The version declared in this file's header, if any.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn is_resident(&self) -> bool {
        self.buffer.is_resident()
    }

    pub fn make_resident(&self) {
        self.buffer.make_resident();
    }

    /// Look up the line for `key`. Absent, malformed, and out-of-range
    /// keys all return `None`.
    pub fn line(&self, key: &str) -> Option<String> {
        match self.strategy {
            SearchStrategy::DirectOffset => self.direct_line(key),
            SearchStrategy::BinarySearch(comparator) => self.binary_line(comparator, key),
        }
    }

    /// A restartable cursor over record lines in file order, starting at
    /// the position selected by `start_key` (or the first record).
    pub fn cursor(self: &Arc<Self>, start_key: Option<&str>) -> LineCursor {
        let pos = match start_key {
            None => 0,
            Some(key) => self.start_offset(key),
        };
        LineCursor {
            source: Arc::clone(self),
            pos,
        }
    }

    /// The first record line, skipping the header block.
    pub(crate) fn first_record(&self) -> Option<String> {
        let mut pos = 0;
        while let Some((line, next)) = self.buffer.line_at(pos) {
            if !is_header_line(&line) && !line.trim().is_empty() {
                return Some(line);
            }
            pos = next;
        }
        None
    }

    fn direct_line(&self, key: &str) -> Option<String> {
        let offset: usize = key.parse().ok()?;
        if offset >= self.buffer.len() {
            return None;
        }
        let (line, _) = self.buffer.line_at(offset)?;
        // reject records that do not echo their own key, which happens
        // when a file was re-encoded and offsets no longer line up
        line.starts_with(key).then_some(line)
    }

    fn binary_line(&self, comparator: Comparator, key: &str) -> Option<String> {
        let mut start = 0usize;
        let mut stop = self.buffer.len();
        while stop - start > 1 {
            let midpoint = (start + stop) / 2;
            let line_start = self.buffer.line_start(midpoint);
            let Some((line, _)) = self.buffer.line_at(line_start) else {
                stop = midpoint;
                continue;
            };
            match comparator.compare(&line, key) {
                Ordering::Equal => return Some(line),
                Ordering::Greater => stop = midpoint,
                Ordering::Less => start = midpoint,
            }
        }
        None
    }

    /// Byte offset the cursor should start at for `start_key`.
    fn start_offset(&self, key: &str) -> usize {
        match self.strategy {
            SearchStrategy::DirectOffset => match key.parse::<usize>() {
                Ok(offset) if offset < self.buffer.len() => offset,
                _ => self.buffer.len(),
            },
            SearchStrategy::BinarySearch(comparator) => self.binary_start(comparator, key),
        }
    }

    /// Bisect to the last line ordered before `key`, then advance to the
    /// first line at or after it. Tolerates a key that is a proper prefix
    /// of its targets: no matching line is ever skipped, even when several
    /// lines compare equal to the key.
    fn binary_start(&self, comparator: Comparator, key: &str) -> usize {
        let mut last_before = None;
        let mut start = 0usize;
        let mut stop = self.buffer.len();
        while start + 1 < stop {
            let midpoint = (start + stop) / 2;
            let line_start = self.buffer.line_start(midpoint);
            let Some((line, _)) = self.buffer.line_at(line_start) else {
                stop = midpoint;
                continue;
            };
            match comparator.compare(&line, key) {
                Ordering::Less => {
                    start = midpoint;
                    last_before = Some(line_start);
                }
                Ordering::Equal | Ordering::Greater => stop = midpoint,
            }
        }

        let mut pos = last_before.unwrap_or(0);
        while let Some((line, next)) = self.buffer.line_at(pos) {
            if comparator.compare(&line, key) != Ordering::Less {
                break;
            }
            pos = next;
        }
        pos
    }
}

fn scan_version(buffer: &FileBuffer) -> Option<Version> {
    let mut pos = 0;
    while let Some((line, next)) = buffer.line_at(pos) {
        if !is_header_line(&line) {
            break;
        }
        if let Some(version) = parse::version_marker(&line) {
            return Some(version);
        }
        pos = next;
    }
    None
}

/// Lazy, one-pass cursor over record lines of a source, in file order.
/// Header and blank lines are skipped.
pub struct LineCursor {
    source: Arc<DataSource>,
    pos: usize,
}

impl Iterator for LineCursor {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let (line, next) = self.source.buffer.line_at(self.pos)?;
            self.pos = next;
            if is_header_line(&line) || line.trim().is_empty() {
                continue;
            }
            return Some(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PartOfSpeech;
    use std::io::Write;

    fn source_of(content: &str, category: ContentCategory, strategy: SearchStrategy) -> DataSource {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write fixture");
        DataSource::open(file.path(), category, strategy, Charset::Utf8).expect("open source")
    }

    fn index_source(content: &str) -> DataSource {
        source_of(
            content,
            ContentCategory::index(PartOfSpeech::Noun),
            SearchStrategy::BinarySearch(Comparator::IndexLine {
                case_sensitive: true,
            }),
        )
    }

    #[test]
    fn direct_access_hits_and_misses() {
        let content = "00000010 foo\n00000025 bar\n";
        // offsets are real byte offsets into the content above
        let source = source_of(
            "xxxxxxxxxx00000010 foo\n",
            ContentCategory::data(PartOfSpeech::Noun),
            SearchStrategy::DirectOffset,
        );
        assert_eq!(source.line("10"), None); // record must echo its key
        drop(source);

        let source = source_of(
            content,
            ContentCategory::data(PartOfSpeech::Noun),
            SearchStrategy::DirectOffset,
        );
        assert_eq!(source.line("00000010"), None); // offset 10 is mid-line
        assert_eq!(source.line("0"), Some("00000010 foo".to_owned())); // literal prefix
        assert_eq!(source.line("99999999"), None);
        assert_eq!(source.line("not-a-number"), None);
    }

    #[test]
    fn direct_access_round_trips_aligned_offsets() {
        // first line is 13 bytes, so the second record sits at offset 13
        let content = "00000000 foo\n00000013 bar\n";
        let source = source_of(
            content,
            ContentCategory::data(PartOfSpeech::Noun),
            SearchStrategy::DirectOffset,
        );
        assert_eq!(source.line("00000000"), Some("00000000 foo".to_owned()));
        assert_eq!(source.line("00000013"), Some("00000013 bar".to_owned()));
    }

    #[test]
    fn binary_search_finds_every_line() {
        let content = "apple n 1 1 00000010\nbanana n 1 1 00000020\ncherry n 1 1 00000030\n\
                       damson n 1 1 00000040\nelder n 1 1 00000050\n";
        let source = index_source(content);
        for lemma in ["apple", "banana", "cherry", "damson", "elder"] {
            let line = source.line(lemma).expect("seeded key found");
            assert!(line.starts_with(lemma));
        }
        assert_eq!(source.line("aardvark"), None);
        assert_eq!(source.line("blueberry"), None);
        assert_eq!(source.line("zucchini"), None);
    }

    #[test]
    fn binary_search_skips_header_block() {
        let content = "  1 corpus version 3.1\n  2 license text\napple n 1 1 00000010\n\
                       banana n 1 1 00000020\n";
        let source = index_source(content);
        assert_eq!(
            source.line("apple"),
            Some("apple n 1 1 00000010".to_owned())
        );
        assert_eq!(source.version(), Some(&Version::new(3, 1, 0)));
    }

    #[test]
    fn cursor_starts_at_prefix_without_omission() {
        let content = "cap n 1 1 00000010\ncar n 1 1 00000020\ncar_pool n 1 1 00000030\n\
                       carp n 1 1 00000040\ncat n 1 1 00000050\n";
        let source = Arc::new(index_source(content));

        let matches: Vec<String> = source
            .cursor(Some("car"))
            .take_while(|line| line.starts_with("car"))
            .collect();
        assert_eq!(
            matches,
            vec![
                "car n 1 1 00000020".to_owned(),
                "car_pool n 1 1 00000030".to_owned(),
                "carp n 1 1 00000040".to_owned(),
            ]
        );
    }

    #[test]
    fn cursor_from_key_before_first_line_sees_everything() {
        let content = "banana n 1 1 00000020\ncherry n 1 1 00000030\n";
        let source = Arc::new(index_source(content));
        assert_eq!(source.cursor(Some("a")).count(), 2);
    }

    #[test]
    fn cursor_from_key_after_last_line_is_empty() {
        let content = "banana n 1 1 00000020\ncherry n 1 1 00000030\n";
        let source = Arc::new(index_source(content));
        assert_eq!(source.cursor(Some("zebra")).count(), 0);
    }

    #[test]
    fn cursor_is_restartable() {
        let content = "banana n 1 1 00000020\ncherry n 1 1 00000030\n";
        let source = Arc::new(index_source(content));
        assert_eq!(source.cursor(None).count(), 2);
        assert_eq!(source.cursor(None).count(), 2);
    }
}
