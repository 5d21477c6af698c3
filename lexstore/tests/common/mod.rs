//! Shared corpus fixtures for integration tests
//!
//! Builds sorted, line-oriented corpus files in a temp directory. Data
//! lines embed their own byte offsets, so files are composed twice: once
//! with placeholder offsets to learn line lengths, then with the real
//! ones. All offsets print as fixed-width 8-digit fields, keeping lengths
//! stable between the passes.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use lexstore::PartOfSpeech;

/// Conventional short file-name token per part of speech.
pub fn short_name(pos: PartOfSpeech) -> &'static str {
    match pos {
        PartOfSpeech::Noun => "noun",
        PartOfSpeech::Verb => "verb",
        PartOfSpeech::Adjective => "adj",
        PartOfSpeech::Adverb => "adv",
    }
}

pub const HEADER: &str = "  1 lexical corpus version 3.1\n  2 fixture data\n";

pub struct GroupSpec {
    pub lemmas: Vec<String>,
    /// (relation symbol, target group index within the same corpus)
    pub relations: Vec<(&'static str, usize)>,
    pub gloss: String,
}

pub struct PosCorpus {
    pub pos: PartOfSpeech,
    pub groups: Vec<GroupSpec>,
    pub exceptions: Vec<(String, Vec<String>)>,
}

fn data_line(group: &GroupSpec, tag: char, offset: u64, targets: &[u64]) -> String {
    let mut line = format!("{offset:08} {tag} {}", group.lemmas.len());
    for (lex_id, lemma) in group.lemmas.iter().enumerate() {
        let _ = write!(line, " {lemma} {lex_id}");
    }
    let _ = write!(line, " {}", group.relations.len());
    for ((symbol, _), target) in group.relations.iter().zip(targets) {
        let _ = write!(line, " {symbol} {tag} {target:08}");
    }
    let _ = write!(line, " | {}", group.gloss);
    line
}

/// Writes index/data/exception/sense files for the given corpora into
/// `dir` and returns the real group offsets, one vector per corpus.
pub fn write_corpus(dir: &Path, corpora: &[PosCorpus]) -> Vec<Vec<u64>> {
    let mut sense_lines: BTreeMap<String, String> = BTreeMap::new();
    let mut all_offsets = Vec::new();

    for corpus in corpora {
        let tag = corpus.pos.tag();

        // first pass: placeholder offsets, to learn line lengths
        let raw: Vec<String> = corpus
            .groups
            .iter()
            .map(|g| data_line(g, tag, 0, &vec![0; g.relations.len()]))
            .collect();
        let mut offsets = Vec::new();
        let mut at = HEADER.len() as u64;
        for line in &raw {
            offsets.push(at);
            at += line.len() as u64 + 1;
        }

        // second pass: real offsets and relation targets
        let mut data = String::from(HEADER);
        for (i, group) in corpus.groups.iter().enumerate() {
            let targets: Vec<u64> = group.relations.iter().map(|(_, t)| offsets[*t]).collect();
            let line = data_line(group, tag, offsets[i], &targets);
            assert_eq!(line.len(), raw[i].len(), "fixture line length drifted");
            data.push_str(&line);
            data.push('\n');
        }
        fs::write(dir.join(format!("data.{}", short_name(corpus.pos))), data).expect("write data file");

        // index file: one line per lemma, sorted
        let mut per_lemma: BTreeMap<&str, Vec<u64>> = BTreeMap::new();
        for (i, group) in corpus.groups.iter().enumerate() {
            for lemma in &group.lemmas {
                per_lemma.entry(lemma).or_default().push(offsets[i]);
            }
        }
        let mut index = String::from(HEADER);
        for (lemma, group_offsets) in &per_lemma {
            let _ = write!(index, "{lemma} {tag} {} {}", lemma.len(), group_offsets.len());
            for offset in group_offsets {
                let _ = write!(index, " {offset:08}");
            }
            index.push('\n');
        }
        fs::write(dir.join(format!("index.{}", short_name(corpus.pos))), index)
            .expect("write index file");

        // sense records: one per member occurrence
        for (i, group) in corpus.groups.iter().enumerate() {
            for (lex_id, lemma) in group.lemmas.iter().enumerate() {
                let key = format!("{lemma}%{}:{lex_id:02}", corpus.pos.number());
                let sense_number = per_lemma[lemma.as_str()]
                    .iter()
                    .position(|o| *o == offsets[i])
                    .map_or(1, |p| p + 1);
                sense_lines.insert(
                    key.clone(),
                    format!("{key} {:08} {sense_number} {}", offsets[i], lemma.len()),
                );
            }
        }

        // exceptions, sorted by surface form
        if !corpus.exceptions.is_empty() {
            let mut sorted: Vec<_> = corpus.exceptions.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            let mut exc = String::new();
            for (surface, roots) in sorted {
                let _ = write!(exc, "{surface} {}", roots.join(" "));
                exc.push('\n');
            }
            fs::write(dir.join(format!("{}.exc", short_name(corpus.pos))), exc)
                .expect("write exception file");
        }

        all_offsets.push(offsets);
    }

    let mut sense = String::new();
    for line in sense_lines.values() {
        sense.push_str(line);
        sense.push('\n');
    }
    fs::write(dir.join("index.sense"), sense).expect("write sense file");

    all_offsets
}

fn group(lemmas: &[&str], relations: Vec<(&'static str, usize)>, gloss: &str) -> GroupSpec {
    GroupSpec {
        lemmas: lemmas.iter().map(|l| (*l).to_owned()).collect(),
        relations,
        gloss: gloss.to_owned(),
    }
}

/// A small hand-written noun corpus with cross-references.
pub fn small_noun_corpus() -> PosCorpus {
    PosCorpus {
        pos: PartOfSpeech::Noun,
        groups: vec![
            // 0
            group(
                &["animal", "creature"],
                vec![("~", 1), ("~", 3)],
                "a living organism",
            ),
            // 1
            group(
                &["dog", "domestic_dog"],
                vec![("@", 0), ("^", 2)],
                "a domesticated canid",
            ),
            // 2
            group(&["car", "auto"], vec![("#p", 4)], "a motor vehicle"),
            // 3
            group(&["carp"], vec![("@", 0)], "a freshwater fish"),
            // 4
            group(&["wheel"], vec![("%p", 2)], "a circular frame"),
        ],
        exceptions: vec![
            ("dogs_bodies".to_owned(), vec!["dogsbody".to_owned()]),
            ("geese".to_owned(), vec!["goose".to_owned()]),
            (
                "oxen".to_owned(),
                vec!["ox".to_owned(), "oxen".to_owned()],
            ),
        ],
    }
}

/// A generated corpus with `n` single-member groups, each relating to the
/// next, for order-sensitive iteration tests.
pub fn generated_corpus(pos: PartOfSpeech, n: usize) -> PosCorpus {
    let groups = (0..n)
        .map(|i| {
            let lemma = format!("w{i:04}");
            group(
                &[lemma.as_str()],
                vec![("@", (i + 1) % n)],
                &format!("generated group {i}"),
            )
        })
        .collect();
    PosCorpus {
        pos,
        groups,
        exceptions: Vec::new(),
    }
}
