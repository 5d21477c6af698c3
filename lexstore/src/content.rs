//! Content categories and the fixed registry matching them to files
//!
//! A content category is one logical role a physical file plays: a data
//! kind crossed with an optional part of speech. The registry is a const
//! table built at compile time; providers iterate it in declaration order
//! when resolving files.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compare::Comparator;

/// Part of speech of a lexical sub-corpus.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
}

impl PartOfSpeech {
    pub const ALL: [Self; 4] = [Self::Noun, Self::Verb, Self::Adjective, Self::Adverb];

    /// Single-character tag used in data lines.
    pub fn tag(self) -> char {
        match self {
            Self::Noun => 'n',
            Self::Verb => 'v',
            Self::Adjective => 'a',
            Self::Adverb => 'r',
        }
    }

    /// Numeric tag used in sense keys.
    pub fn number(self) -> u8 {
        match self {
            Self::Noun => 1,
            Self::Verb => 2,
            Self::Adjective => 3,
            Self::Adverb => 4,
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'n' => Some(Self::Noun),
            'v' => Some(Self::Verb),
            'a' => Some(Self::Adjective),
            'r' => Some(Self::Adverb),
            _ => None,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::Noun),
            2 => Some(Self::Verb),
            3 => Some(Self::Adjective),
            4 => Some(Self::Adverb),
            _ => None,
        }
    }

    /// Stable position of this part of speech in per-category tables.
    pub fn index(self) -> usize {
        match self {
            Self::Noun => 0,
            Self::Verb => 1,
            Self::Adjective => 2,
            Self::Adverb => 3,
        }
    }

    /// Tokens looked for in file names when resolving categories.
    fn name_hints(self) -> &'static [&'static str] {
        match self {
            Self::Noun => &["noun"],
            Self::Verb => &["verb"],
            Self::Adjective => &["adj", "adjective"],
            Self::Adverb => &["adv", "adverb"],
        }
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Noun => "noun",
            Self::Verb => "verb",
            Self::Adjective => "adjective",
            Self::Adverb => "adverb",
        };
        f.write_str(name)
    }
}

/// What kind of records a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    /// Lemma index: one entry per lemma, keyed by lemma.
    Index,
    /// Group data: one group per line, keyed by byte offset.
    Data,
    /// Morphological exceptions, keyed by surface form.
    Exception,
    /// Sense records, keyed by full sense key.
    Sense,
    /// Runs of sense records sharing a key; backed by the sense file.
    SenseGroup,
}

impl DataKind {
    pub fn key_space(self) -> KeySpace {
        match self {
            Self::Data => KeySpace::ByteOffset,
            _ => KeySpace::SortedLine,
        }
    }

    /// Whether files of this kind carry a version marker in their header.
    pub fn has_version_header(self) -> bool {
        matches!(self, Self::Index | Self::Data)
    }

    fn name_hints(self) -> &'static [&'static str] {
        match self {
            Self::Index => &["index", "idx"],
            Self::Data => &["data", "dat"],
            Self::Exception => &["exception", "exc"],
            Self::Sense | Self::SenseGroup => &["sense"],
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Index => "index",
            Self::Data => "data",
            Self::Exception => "exception",
            Self::Sense => "sense",
            Self::SenseGroup => "senses",
        };
        f.write_str(name)
    }
}

/// How record keys map to positions in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpace {
    /// The key is the decimal byte offset of the record.
    ByteOffset,
    /// Records are sorted; keys are found by comparator bisection.
    SortedLine,
}

/// One logical role a physical file plays: data kind plus optional part of
/// speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentCategory {
    pub kind: DataKind,
    pub pos: Option<PartOfSpeech>,
}

impl ContentCategory {
    pub const fn new(kind: DataKind, pos: Option<PartOfSpeech>) -> Self {
        Self { kind, pos }
    }

    /// The full category registry, in resolution order.
    pub const ALL: [Self; 14] = [
        Self::new(DataKind::Index, Some(PartOfSpeech::Noun)),
        Self::new(DataKind::Index, Some(PartOfSpeech::Verb)),
        Self::new(DataKind::Index, Some(PartOfSpeech::Adjective)),
        Self::new(DataKind::Index, Some(PartOfSpeech::Adverb)),
        Self::new(DataKind::Data, Some(PartOfSpeech::Noun)),
        Self::new(DataKind::Data, Some(PartOfSpeech::Verb)),
        Self::new(DataKind::Data, Some(PartOfSpeech::Adjective)),
        Self::new(DataKind::Data, Some(PartOfSpeech::Adverb)),
        Self::new(DataKind::Exception, Some(PartOfSpeech::Noun)),
        Self::new(DataKind::Exception, Some(PartOfSpeech::Verb)),
        Self::new(DataKind::Exception, Some(PartOfSpeech::Adjective)),
        Self::new(DataKind::Exception, Some(PartOfSpeech::Adverb)),
        Self::new(DataKind::Sense, None),
        Self::new(DataKind::SenseGroup, None),
    ];

    pub const fn index(kind_pos: PartOfSpeech) -> Self {
        Self::new(DataKind::Index, Some(kind_pos))
    }

    pub const fn data(kind_pos: PartOfSpeech) -> Self {
        Self::new(DataKind::Data, Some(kind_pos))
    }

    pub const fn exception(kind_pos: PartOfSpeech) -> Self {
        Self::new(DataKind::Exception, Some(kind_pos))
    }

    pub const SENSE: Self = Self::new(DataKind::Sense, None);
    pub const SENSE_GROUP: Self = Self::new(DataKind::SenseGroup, None);

    pub fn key_space(self) -> KeySpace {
        self.kind.key_space()
    }

    /// The comparator matching this category's on-disk sort order.
    pub fn default_comparator(self) -> Comparator {
        match self.kind {
            DataKind::Index => Comparator::IndexLine {
                case_sensitive: true,
            },
            DataKind::Data => Comparator::OffsetLine,
            DataKind::Exception => Comparator::ExceptionLine,
            DataKind::Sense | DataKind::SenseGroup => Comparator::SenseKeyLine,
        }
    }

    /// Categories allowed to share one backing file with another category.
    pub(crate) fn shares_file(self) -> bool {
        matches!(self.kind, DataKind::Sense | DataKind::SenseGroup)
    }

    /// Token matching against a lowercased file name: the name must contain
    /// one of the kind hints and, when a part of speech is set, one of its
    /// hints as well.
    pub(crate) fn matches_name(self, name: &str) -> bool {
        let kind_hit = self.kind.name_hints().iter().any(|h| name.contains(h));
        let pos_hit = self
            .pos
            .is_none_or(|pos| pos.name_hints().iter().any(|h| name.contains(h)));
        kind_hit && pos_hit
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "{}/{}", self.kind, pos),
            None => write!(f, "{}", self.kind),
        }
    }
}
