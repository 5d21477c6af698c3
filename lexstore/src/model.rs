//! Domain items stored in the lexical graph
//!
//! The engine treats these as opaque keyed values; the interesting part is
//! the id types and the cross-references between them. An [`Entry`] points
//! at the [`Group`]s containing its lemma, a [`Group`] relates to other
//! groups, and a [`SenseEntry`] ties a [`SenseKey`] back to a group.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::content::PartOfSpeech;

/// Identifier of an index entry: normalized lemma plus part of speech.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId {
    pub lemma: String,
    pub pos: PartOfSpeech,
}

impl EntryId {
    /// Normalizes the lemma: trimmed, lowercased, spaces as underscores.
    pub fn new(lemma: &str, pos: PartOfSpeech) -> Self {
        Self {
            lemma: lemma.trim().to_lowercase().replace(' ', "_"),
            pos,
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.lemma, self.pos)
    }
}

/// Identifier of a group: the byte offset of its record plus the part of
/// speech of the file holding it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GroupId {
    pub offset: u64,
    pub pos: PartOfSpeech,
}

impl GroupId {
    pub fn new(offset: u64, pos: PartOfSpeech) -> Self {
        Self { offset, pos }
    }

    /// The zero-padded form used as a lookup key in data files.
    pub fn offset_key(self) -> String {
        format!("{:08}", self.offset)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}/{}", self.offset, self.pos)
    }
}

/// A sense key: `lemma%N:LL` where N is the part-of-speech number and LL a
/// two-digit lexical id. Cheap to clone and share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenseKey(Arc<str>);

impl SenseKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    /// Composes the canonical key for a lemma within a group.
    pub fn synthesize(lemma: &str, pos: PartOfSpeech, lex_id: u32) -> Self {
        let lemma = lemma.trim().to_lowercase().replace(' ', "_");
        Self(Arc::from(
            format!("{lemma}%{}:{lex_id:02}", pos.number()).as_str(),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The lemma portion, before `%`.
    pub fn lemma(&self) -> &str {
        self.0.split('%').next().unwrap_or("")
    }

    /// The part of speech encoded after `%`.
    pub fn pos(&self) -> Option<PartOfSpeech> {
        let digit = self.0.split('%').nth(1)?.chars().next()?;
        PartOfSpeech::from_number(digit.to_digit(10)? as u8)
    }
}

impl fmt::Display for SenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An index record: where a lemma occurs across groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    /// How often the lemma was observed in tagged text.
    pub use_count: u32,
    /// Cross-references to the groups containing this lemma.
    pub groups: Vec<GroupId>,
}

/// One lemma inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub lemma: String,
    pub lex_id: u32,
    pub key: SenseKey,
}

/// Typed relation between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Hypernym,
    Hyponym,
    Antonym,
    Similar,
    PartOf,
    HasPart,
    Also,
}

impl RelationKind {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Hypernym => "@",
            Self::Hyponym => "~",
            Self::Antonym => "!",
            Self::Similar => "&",
            Self::PartOf => "%p",
            Self::HasPart => "#p",
            Self::Also => "^",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "@" => Some(Self::Hypernym),
            "~" => Some(Self::Hyponym),
            "!" => Some(Self::Antonym),
            "&" => Some(Self::Similar),
            "%p" => Some(Self::PartOf),
            "#p" => Some(Self::HasPart),
            "^" => Some(Self::Also),
            _ => None,
        }
    }
}

/// A group of synonymous members plus its outgoing relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub members: Vec<Member>,
    pub relations: Vec<(RelationKind, GroupId)>,
    pub gloss: String,
}

impl Group {
    /// Looks up a member by its sense key.
    pub fn member(&self, key: &SenseKey) -> Option<&Member> {
        self.members.iter().find(|m| &m.key == key)
    }
}

/// Auxiliary record mapping a sense key to its group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenseEntry {
    pub key: SenseKey,
    pub group: GroupId,
    pub sense_number: u32,
    pub use_count: u32,
}

/// Identifier of a morphological exception.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExceptionId {
    pub surface: String,
    pub pos: PartOfSpeech,
}

impl ExceptionId {
    pub fn new(surface: &str, pos: PartOfSpeech) -> Self {
        Self {
            surface: surface.trim().to_lowercase().replace(' ', "_"),
            pos,
        }
    }
}

impl fmt::Display for ExceptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.surface, self.pos)
    }
}

/// An irregular surface form and its root forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionEntry {
    pub id: ExceptionId,
    pub roots: Vec<String>,
}

/// Unified id over every item family, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
    Entry(EntryId),
    Group(GroupId),
    Exception(ExceptionId),
}

/// Unified item, shared cheaply out of the cache.
#[derive(Debug, Clone)]
pub enum Item {
    Entry(Arc<Entry>),
    Group(Arc<Group>),
    Exception(Arc<ExceptionEntry>),
}

impl Item {
    pub fn id(&self) -> ItemId {
        match self {
            Self::Entry(e) => ItemId::Entry(e.id.clone()),
            Self::Group(g) => ItemId::Group(g.id),
            Self::Exception(x) => ItemId::Exception(x.id.clone()),
        }
    }
}
