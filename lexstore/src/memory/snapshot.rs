//! The fully-resident snapshot and its on-disk image format
//!
//! A snapshot is the de-duplicated in-memory copy of one full corpus,
//! built by a single loader pass. Maps preserve insertion order, which is
//! the backing store's iteration order; the hot-swap fast-forward protocol
//! depends on that. The image format is a magic tag, a little-endian
//! format version, and a gzip-compressed bincode body; a version mismatch
//! fails before any decoding is attempted.

use std::io::{Read, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::content::PartOfSpeech;
use crate::error::{LexError, Result};
use crate::model::{
    Entry, EntryId, ExceptionEntry, ExceptionId, Group, GroupId, Member, SenseEntry, SenseKey,
};
use crate::types::Version;

const IMAGE_MAGIC: [u8; 8] = *b"LEXSNAP\0";
const IMAGE_FORMAT: u16 = 1;

/// Complete in-memory image of a corpus.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub(crate) version: Option<Version>,
    pub(crate) entries: [IndexMap<EntryId, Arc<Entry>>; 4],
    pub(crate) groups: [IndexMap<u64, Arc<Group>>; 4],
    pub(crate) exceptions: [IndexMap<ExceptionId, Arc<ExceptionEntry>>; 4],
    pub(crate) members: IndexMap<SenseKey, Member>,
    pub(crate) senses: IndexMap<SenseKey, SenseEntry>,
}

impl Snapshot {
    pub(crate) fn new(version: Option<Version>) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn entry(&self, id: &EntryId) -> Option<&Arc<Entry>> {
        self.entries[id.pos.index()].get(id)
    }

    pub fn group(&self, id: GroupId) -> Option<&Arc<Group>> {
        self.groups[id.pos.index()].get(&id.offset)
    }

    pub fn exception(&self, id: &ExceptionId) -> Option<&Arc<ExceptionEntry>> {
        self.exceptions[id.pos.index()].get(id)
    }

    pub fn member(&self, key: &SenseKey) -> Option<&Member> {
        self.members.get(key)
    }

    pub fn sense_entry(&self, key: &SenseKey) -> Option<&SenseEntry> {
        self.senses.get(key)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.iter().map(IndexMap::len).sum()
    }

    pub fn group_count(&self) -> usize {
        self.groups.iter().map(IndexMap::len).sum()
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.iter().map(IndexMap::len).sum()
    }

    pub fn sense_count(&self) -> usize {
        self.senses.len()
    }

    pub fn group_ids(&self, pos: PartOfSpeech) -> impl Iterator<Item = GroupId> + '_ {
        self.groups[pos.index()]
            .values()
            .map(|group| group.id)
    }

    /// Serialize this snapshot as a framed, compressed image.
    pub(crate) fn write_image(&self, out: &mut dyn Write) -> Result<()> {
        out.write_all(&IMAGE_MAGIC)?;
        out.write_all(&IMAGE_FORMAT.to_le_bytes())?;
        let mut encoder = GzEncoder::new(out, Compression::default());
        bincode::serialize_into(&mut encoder, self)
            .map_err(|e| LexError::ImageFormat(e.to_string()))?;
        encoder.finish()?;
        Ok(())
    }

    /// Deserialize an image. The frame is checked before any decoding; a
    /// magic or format-version mismatch never attempts a partial decode.
    pub(crate) fn read_image(mut reader: impl Read) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != IMAGE_MAGIC {
            return Err(LexError::ImageFormat("unrecognized magic".to_owned()));
        }
        let mut format = [0u8; 2];
        reader.read_exact(&mut format)?;
        let format = u16::from_le_bytes(format);
        if format != IMAGE_FORMAT {
            return Err(LexError::ImageFormat(format!(
                "unsupported image format version {format} (expected {IMAGE_FORMAT})"
            )));
        }
        bincode::deserialize_from(GzDecoder::new(reader))
            .map_err(|e| LexError::ImageFormat(e.to_string()))
    }
}
