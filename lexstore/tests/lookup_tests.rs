//! Keyed lookups and prefix iteration over seeded corpora

mod common;

use std::sync::Arc;

use lexstore::{
    Charset, Comparator, ContentCategory, ContentProvider, DataSource, PartOfSpeech,
    SearchStrategy,
};
use pretty_assertions::assert_eq;

fn open_provider(dir: &std::path::Path) -> ContentProvider {
    let provider = ContentProvider::new(dir);
    provider.open().expect("provider opens");
    provider
}

#[test]
fn direct_access_example() {
    // the two records really do sit at byte offsets 10 and 25
    let content = "         \n00000010 foo\n \n00000025 bar\n";
    assert_eq!(&content[10..22], "00000010 foo");
    assert_eq!(&content[25..37], "00000025 bar");

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("data.noun");
    std::fs::write(&path, content).expect("write fixture");

    let source = DataSource::open(
        &path,
        ContentCategory::data(PartOfSpeech::Noun),
        SearchStrategy::DirectOffset,
        Charset::Utf8,
    )
    .expect("source opens");

    assert_eq!(source.line("00000010"), Some("00000010 foo".to_owned()));
    assert_eq!(source.line("00000025"), Some("00000025 bar".to_owned()));
    assert_eq!(source.line("99999999"), None);
    assert_eq!(source.line("garbage"), None);
}

#[test]
fn every_seeded_key_is_found_by_both_strategies() {
    let dir = tempfile::tempdir().expect("temp dir");
    let offsets = common::write_corpus(dir.path(), &[common::small_noun_corpus()]);
    let provider = open_provider(dir.path());

    // binary search over the index file
    for lemma in ["animal", "auto", "car", "carp", "creature", "dog", "wheel"] {
        let line = provider
            .line(ContentCategory::index(PartOfSpeech::Noun), lemma)
            .expect("provider open")
            .unwrap_or_else(|| panic!("lemma {lemma} not found"));
        assert!(line.starts_with(lemma));
    }
    assert_eq!(
        provider
            .line(ContentCategory::index(PartOfSpeech::Noun), "zebra")
            .expect("provider open"),
        None
    );

    // direct access over the data file, keyed by real offsets
    for offset in &offsets[0] {
        let key = format!("{offset:08}");
        let line = provider
            .line(ContentCategory::data(PartOfSpeech::Noun), &key)
            .expect("provider open")
            .unwrap_or_else(|| panic!("offset {key} not found"));
        assert!(line.starts_with(&key));
    }

    // binary search over the sense file
    let line = provider
        .line(ContentCategory::SENSE, "dog%1:00")
        .expect("provider open")
        .expect("sense key found");
    assert!(line.starts_with("dog%1:00"));
}

#[test]
fn prefix_iteration_enumerates_the_exact_sorted_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    common::write_corpus(dir.path(), &[common::small_noun_corpus()]);
    let provider = open_provider(dir.path());

    let run: Vec<String> = provider
        .lines(ContentCategory::index(PartOfSpeech::Noun), Some("car"))
        .expect("provider open")
        .expect("category resolved")
        .take_while(|line| line.starts_with("car"))
        .collect();

    let lemmas: Vec<&str> = run
        .iter()
        .map(|line| line.split_whitespace().next().expect("nonempty"))
        .collect();
    assert_eq!(lemmas, vec!["car", "carp"]);
}

#[test]
fn iteration_from_the_top_sees_every_record_in_order() {
    let dir = tempfile::tempdir().expect("temp dir");
    common::write_corpus(dir.path(), &[common::generated_corpus(PartOfSpeech::Noun, 100)]);
    let provider = open_provider(dir.path());

    let lemmas: Vec<String> = provider
        .lines(ContentCategory::index(PartOfSpeech::Noun), None)
        .expect("provider open")
        .expect("category resolved")
        .map(|line| {
            line.split_whitespace()
                .next()
                .expect("nonempty")
                .to_owned()
        })
        .collect();

    let expected: Vec<String> = (0..100).map(|i| format!("w{i:04}")).collect();
    assert_eq!(lemmas, expected);
}

#[test]
fn comparator_override_changes_search_order_contract() {
    // a file deliberately sorted caselessly only works with the caseless
    // comparator
    let content = "Alpha x\nbeta x\nGamma x\n";
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("index.noun");
    std::fs::write(&path, content).expect("write fixture");

    let source = Arc::new(
        DataSource::open(
            &path,
            ContentCategory::index(PartOfSpeech::Noun),
            SearchStrategy::BinarySearch(Comparator::IndexLine {
                case_sensitive: false,
            }),
            Charset::Utf8,
        )
        .expect("source opens"),
    );
    assert_eq!(source.line("beta"), Some("beta x".to_owned()));
    assert_eq!(source.line("gamma"), Some("Gamma x".to_owned()));
    drop(source);
}
