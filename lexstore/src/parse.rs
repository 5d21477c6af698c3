//! Line parsers turning one text line into one domain item
//!
//! One parser per data kind. Line formats use whitespace-separated fields
//! with fixed-width, zero-padded byte offsets:
//!
//! - index: `lemma pos use_count n_groups offset...`
//! - data: `offset pos n_members (lemma lex_id)... n_rels (sym pos offset)... | gloss`
//! - sense: `sense_key offset sense_number use_count`
//! - exception: `surface root...`

use std::str::SplitWhitespace;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::content::PartOfSpeech;
use crate::model::{
    Entry, EntryId, ExceptionEntry, ExceptionId, Group, GroupId, Member, RelationKind, SenseEntry,
    SenseKey,
};
use crate::types::Version;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed {kind} line ({reason}): {line}")]
    Malformed {
        kind: &'static str,
        reason: &'static str,
        line: String,
    },
}

impl ParseError {
    fn new(kind: &'static str, reason: &'static str, line: &str) -> Self {
        Self::Malformed {
            kind,
            reason,
            line: line.to_owned(),
        }
    }
}

type Result<T> = std::result::Result<T, ParseError>;

struct Fields<'a> {
    kind: &'static str,
    line: &'a str,
    iter: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(kind: &'static str, line: &'a str) -> Self {
        Self {
            kind,
            line,
            iter: line.split_whitespace(),
        }
    }

    fn next(&mut self, what: &'static str) -> Result<&'a str> {
        self.iter
            .next()
            .ok_or_else(|| ParseError::new(self.kind, what, self.line))
    }

    fn number<T: std::str::FromStr>(&mut self, what: &'static str) -> Result<T> {
        self.next(what)?
            .parse()
            .map_err(|_| ParseError::new(self.kind, what, self.line))
    }

    fn pos(&mut self, what: &'static str) -> Result<PartOfSpeech> {
        let field = self.next(what)?;
        let mut chars = field.chars();
        match (chars.next(), chars.next()) {
            (Some(tag), None) => {
                PartOfSpeech::from_tag(tag).ok_or_else(|| ParseError::new(self.kind, what, self.line))
            }
            _ => Err(ParseError::new(self.kind, what, self.line)),
        }
    }
}

/// Parses one index line into an [`Entry`]. The expected part of speech is
/// checked against the line's own tag.
pub fn entry_line(line: &str, pos: PartOfSpeech) -> Result<Entry> {
    let mut fields = Fields::new("index", line);
    let lemma = fields.next("missing lemma")?;
    let line_pos = fields.pos("bad part-of-speech tag")?;
    if line_pos != pos {
        return Err(ParseError::new("index", "part-of-speech mismatch", line));
    }
    let use_count = fields.number("bad use count")?;
    let n_groups: usize = fields.number("bad group count")?;
    let mut groups = Vec::with_capacity(n_groups);
    for _ in 0..n_groups {
        let offset = fields.number("bad group offset")?;
        groups.push(GroupId::new(offset, pos));
    }
    Ok(Entry {
        id: EntryId::new(lemma, pos),
        use_count,
        groups,
    })
}

/// Parses one data line into a [`Group`]. The line's declared offset must
/// agree with the part of speech of the file it came from.
pub fn group_line(line: &str, pos: PartOfSpeech) -> Result<Group> {
    let mut fields = Fields::new("data", line);
    let offset = fields.number("bad offset")?;
    let line_pos = fields.pos("bad part-of-speech tag")?;
    if line_pos != pos {
        return Err(ParseError::new("data", "part-of-speech mismatch", line));
    }
    let id = GroupId::new(offset, pos);

    let n_members: usize = fields.number("bad member count")?;
    let mut members = Vec::with_capacity(n_members);
    for _ in 0..n_members {
        let lemma = fields.next("missing member lemma")?;
        let lex_id = fields.number("bad member lex id")?;
        members.push(Member {
            lemma: lemma.to_owned(),
            lex_id,
            key: SenseKey::synthesize(lemma, pos, lex_id),
        });
    }

    let n_rels: usize = fields.number("bad relation count")?;
    let mut relations = Vec::with_capacity(n_rels);
    for _ in 0..n_rels {
        let symbol = fields.next("missing relation symbol")?;
        let kind = RelationKind::from_symbol(symbol)
            .ok_or_else(|| ParseError::new("data", "unknown relation symbol", line))?;
        let rel_pos = fields.pos("bad relation part of speech")?;
        let rel_offset = fields.number("bad relation offset")?;
        relations.push((kind, GroupId::new(rel_offset, rel_pos)));
    }

    let gloss = match line.split_once(" | ") {
        Some((_, gloss)) => gloss.trim().to_owned(),
        None => String::new(),
    };

    Ok(Group {
        id,
        members,
        relations,
        gloss,
    })
}

/// Parses one sense line into a [`SenseEntry`]. The group's part of speech
/// is recovered from the sense key itself.
pub fn sense_line(line: &str) -> Result<SenseEntry> {
    let mut fields = Fields::new("sense", line);
    let key = SenseKey::new(fields.next("missing sense key")?);
    let pos = key
        .pos()
        .ok_or_else(|| ParseError::new("sense", "key has no part of speech", line))?;
    let offset = fields.number("bad group offset")?;
    let sense_number = fields.number("bad sense number")?;
    let use_count = fields.number("bad use count")?;
    Ok(SenseEntry {
        key,
        group: GroupId::new(offset, pos),
        sense_number,
        use_count,
    })
}

/// Parses one exception line into an [`ExceptionEntry`].
pub fn exception_line(line: &str, pos: PartOfSpeech) -> Result<ExceptionEntry> {
    let mut fields = Fields::new("exception", line);
    let surface = fields.next("missing surface form")?;
    let mut roots = Vec::new();
    for root in fields.iter.by_ref() {
        roots.push(root.to_owned());
    }
    if roots.is_empty() {
        return Err(ParseError::new("exception", "no root forms", line));
    }
    Ok(ExceptionEntry {
        id: ExceptionId::new(surface, pos),
        roots,
    })
}

/// Recovers the byte-offset key from the leading field of a data line.
/// Used by the provider's direct-access self-test.
pub fn group_offset(line: &str) -> Result<u64> {
    Fields::new("data", line).number("bad offset")
}

/// Extracts a version marker from a header line, if it carries one.
pub fn version_marker(line: &str) -> Option<Version> {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    let re = MARKER.get_or_init(|| {
        Regex::new(r"version\s+(\d+)\.(\d+)(?:\.(\d+))?").unwrap_or_else(|e| unreachable!("{e}"))
    });
    let caps = re.captures(line)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse().ok());
    Some(Version::new(part(1)?, part(2)?, part(3).unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_index_line() {
        let entry = entry_line("dog n 42 2 00000010 00000025", PartOfSpeech::Noun)
            .expect("parseable line");
        assert_eq!(entry.id, EntryId::new("dog", PartOfSpeech::Noun));
        assert_eq!(entry.use_count, 42);
        assert_eq!(
            entry.groups,
            vec![
                GroupId::new(10, PartOfSpeech::Noun),
                GroupId::new(25, PartOfSpeech::Noun)
            ]
        );
    }

    #[test]
    fn parses_data_line() {
        let line = "00000010 n 2 dog 0 domestic_dog 1 1 @ n 00000025 | a domesticated canid";
        let group = group_line(line, PartOfSpeech::Noun).expect("parseable line");
        assert_eq!(group.id, GroupId::new(10, PartOfSpeech::Noun));
        assert_eq!(group.members.len(), 2);
        assert_eq!(group.members[0].key.as_str(), "dog%1:00");
        assert_eq!(
            group.relations,
            vec![(RelationKind::Hypernym, GroupId::new(25, PartOfSpeech::Noun))]
        );
        assert_eq!(group.gloss, "a domesticated canid");
    }

    #[test]
    fn parses_sense_line() {
        let sense = sense_line("dog%1:00 00000010 1 42").expect("parseable line");
        assert_eq!(sense.key.as_str(), "dog%1:00");
        assert_eq!(sense.group, GroupId::new(10, PartOfSpeech::Noun));
        assert_eq!(sense.sense_number, 1);
    }

    #[test]
    fn parses_exception_line() {
        let exc = exception_line("geese goose", PartOfSpeech::Noun).expect("parseable line");
        assert_eq!(exc.id.surface, "geese");
        assert_eq!(exc.roots, vec!["goose".to_owned()]);
    }

    #[test]
    fn rejects_mismatched_pos() {
        assert!(entry_line("dog v 1 1 00000010", PartOfSpeech::Noun).is_err());
        assert!(group_line("00000010 v 1 dog 0 0", PartOfSpeech::Noun).is_err());
    }

    #[test]
    fn extracts_version_marker() {
        assert_eq!(
            version_marker("  1 This database is distributed as version 3.1 of the corpus"),
            Some(Version::new(3, 1, 0))
        );
        assert_eq!(
            version_marker("  1 version 2.10.4"),
            Some(Version::new(2, 10, 4))
        );
        assert_eq!(version_marker("  1 no marker here"), None);
    }
}
