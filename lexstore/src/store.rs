//! The dictionary-shaped store abstraction and its disk-backed form
//!
//! [`LexicalStore`] is the keyed surface every backend exposes: caches wrap
//! it, the in-memory store builds its snapshot by draining its iterators.
//! Absent keys are `Ok(None)`; only misuse and environmental problems are
//! errors.

use tracing::warn;

use crate::content::{ContentCategory, PartOfSpeech};
use crate::error::Result;
use crate::model::{
    Entry, EntryId, ExceptionEntry, ExceptionId, Group, GroupId, Member, SenseEntry, SenseKey,
};
use crate::parse;
use crate::provider::ContentProvider;
use crate::types::Version;

/// Keyed read access to a lexical graph.
pub trait LexicalStore: Send + Sync {
    fn open(&self) -> Result<()>;
    fn is_open(&self) -> bool;
    fn close(&self);
    fn version(&self) -> Result<Option<Version>>;

    fn entry(&self, id: &EntryId) -> Result<Option<Entry>>;
    fn group(&self, id: GroupId) -> Result<Option<Group>>;
    fn member(&self, key: &SenseKey) -> Result<Option<Member>>;
    fn sense_entry(&self, key: &SenseKey) -> Result<Option<SenseEntry>>;
    /// Every sense record whose key equals `key`, in file order.
    fn sense_entries(&self, key: &SenseKey) -> Result<Vec<SenseEntry>>;
    fn exception(&self, id: &ExceptionId) -> Result<Option<ExceptionEntry>>;

    fn entries(&self, pos: PartOfSpeech) -> Result<Box<dyn Iterator<Item = Entry> + Send + '_>>;
    fn groups(&self, pos: PartOfSpeech) -> Result<Box<dyn Iterator<Item = Group> + Send + '_>>;
    fn exceptions(
        &self,
        pos: PartOfSpeech,
    ) -> Result<Box<dyn Iterator<Item = ExceptionEntry> + Send + '_>>;
    fn all_sense_entries(&self) -> Result<Box<dyn Iterator<Item = SenseEntry> + Send + '_>>;
}

/// Store that composes a [`ContentProvider`] with the line parsers.
pub struct DataSourceStore {
    provider: ContentProvider,
}

impl DataSourceStore {
    pub fn new(provider: ContentProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ContentProvider {
        &self.provider
    }

    fn iterate<T: 'static>(
        &self,
        category: ContentCategory,
        parse_line: impl Fn(&str) -> std::result::Result<T, parse::ParseError> + Send + 'static,
    ) -> Result<Box<dyn Iterator<Item = T> + Send + '_>> {
        let Some(cursor) = self.provider.lines(category, None)? else {
            return Ok(Box::new(std::iter::empty()));
        };
        Ok(Box::new(cursor.filter_map(move |line| {
            match parse_line(&line) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("skipping unparseable line in {category}: {e}");
                    None
                }
            }
        })))
    }
}

impl LexicalStore for DataSourceStore {
    fn open(&self) -> Result<()> {
        self.provider.open()
    }

    fn is_open(&self) -> bool {
        self.provider.is_open()
    }

    fn close(&self) {
        self.provider.close();
    }

    fn version(&self) -> Result<Option<Version>> {
        self.provider.version()
    }

    fn entry(&self, id: &EntryId) -> Result<Option<Entry>> {
        let line = self
            .provider
            .line(ContentCategory::index(id.pos), &id.lemma)?;
        match line {
            Some(line) => Ok(Some(parse::entry_line(&line, id.pos)?)),
            None => Ok(None),
        }
    }

    fn group(&self, id: GroupId) -> Result<Option<Group>> {
        let line = self
            .provider
            .line(ContentCategory::data(id.pos), &id.offset_key())?;
        match line {
            Some(line) => Ok(Some(parse::group_line(&line, id.pos)?)),
            None => Ok(None),
        }
    }

    /// Members are reached through the sense file: the sense record names
    /// the group, the group holds the member.
    fn member(&self, key: &SenseKey) -> Result<Option<Member>> {
        let Some(sense) = self.sense_entry(key)? else {
            return Ok(None);
        };
        let Some(group) = self.group(sense.group)? else {
            return Ok(None);
        };
        Ok(group.member(key).cloned())
    }

    fn sense_entry(&self, key: &SenseKey) -> Result<Option<SenseEntry>> {
        let line = self.provider.line(ContentCategory::SENSE, key.as_str())?;
        match line {
            Some(line) => Ok(Some(parse::sense_line(&line)?)),
            None => Ok(None),
        }
    }

    fn sense_entries(&self, key: &SenseKey) -> Result<Vec<SenseEntry>> {
        let Some(cursor) = self
            .provider
            .lines(ContentCategory::SENSE_GROUP, Some(key.as_str()))?
        else {
            return Ok(Vec::new());
        };
        let mut run = Vec::new();
        for line in cursor {
            if line.split_whitespace().next() != Some(key.as_str()) {
                break;
            }
            run.push(parse::sense_line(&line)?);
        }
        Ok(run)
    }

    fn exception(&self, id: &ExceptionId) -> Result<Option<ExceptionEntry>> {
        let line = self
            .provider
            .line(ContentCategory::exception(id.pos), &id.surface)?;
        match line {
            Some(line) => Ok(Some(parse::exception_line(&line, id.pos)?)),
            None => Ok(None),
        }
    }

    fn entries(&self, pos: PartOfSpeech) -> Result<Box<dyn Iterator<Item = Entry> + Send + '_>> {
        self.iterate(ContentCategory::index(pos), move |line| {
            parse::entry_line(line, pos)
        })
    }

    fn groups(&self, pos: PartOfSpeech) -> Result<Box<dyn Iterator<Item = Group> + Send + '_>> {
        self.iterate(ContentCategory::data(pos), move |line| {
            parse::group_line(line, pos)
        })
    }

    fn exceptions(
        &self,
        pos: PartOfSpeech,
    ) -> Result<Box<dyn Iterator<Item = ExceptionEntry> + Send + '_>> {
        self.iterate(ContentCategory::exception(pos), move |line| {
            parse::exception_line(line, pos)
        })
    }

    fn all_sense_entries(&self) -> Result<Box<dyn Iterator<Item = SenseEntry> + Send + '_>> {
        self.iterate(ContentCategory::SENSE, parse::sense_line)
    }
}
