use std::fs;
use std::path::{Path, PathBuf};

use tripod::compose;
use tripod::core::types::{TriplePattern, TriplePosition};
use tripod::store::Store;

fn write_nt(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

const S1: &str = "http://ex.org/s1";
const S2: &str = "http://ex.org/s2";
const P1: &str = "http://ex.org/p1";
const P2: &str = "http://ex.org/p2";
const O1: &str = "http://ex.org/o1";

fn fixture_lines() -> Vec<&'static str> {
    vec![
        "<http://ex.org/s1> <http://ex.org/p1> <http://ex.org/o1> .",
        "<http://ex.org/s1> <http://ex.org/p1> \"v1\" .",
        "<http://ex.org/s1> <http://ex.org/p2> <http://ex.org/o1> .",
        "<http://ex.org/s2> <http://ex.org/p1> <http://ex.org/o1> .",
        "<http://ex.org/s2> <http://ex.org/p2> \"v2\"@en .",
        "# a comment line",
        "<http://ex.org/s2> <http://ex.org/p2> \"v1\" .",
        // duplicate of the first line; stored as its own row
        "<http://ex.org/s1> <http://ex.org/p1> <http://ex.org/o1> .",
    ]
}

/// One entry per input instance: the duplicated line appears twice.
fn fixture_triples() -> Vec<(String, String, String)> {
    let mut triples = vec![
        (S1, P1, O1),
        (S1, P1, O1),
        (S1, P1, "\"v1\""),
        (S1, P2, O1),
        (S2, P1, O1),
        (S2, P2, "\"v2\"@en"),
        (S2, P2, "\"v1\""),
    ]
    .into_iter()
    .map(|(s, p, o)| (s.to_string(), p.to_string(), o.to_string()))
    .collect::<Vec<_>>();
    triples.sort();
    triples
}

fn build_fixture(dir: &Path) -> Store {
    let input = write_nt(dir, "input.nt", &fixture_lines());
    let out = dir.join("store");
    compose::build_from_text(&input, &out, "https://example.com/").unwrap();
    Store::open(&out).unwrap()
}

fn resolve_pattern(store: &Store, s: &str, p: &str, o: &str) -> TriplePattern {
    let id = |pos: TriplePosition, term: &str| {
        if term.is_empty() {
            0
        } else {
            store.dict(pos).unwrap().string_to_id(term).unwrap()
        }
    };
    TriplePattern::new(
        id(TriplePosition::Subject, s),
        id(TriplePosition::Predicate, p),
        id(TriplePosition::Object, o),
    )
}

fn matches(store: &mut Store, pattern: &TriplePattern) -> Vec<(String, String, String)> {
    let mut cursor = store.query(pattern).unwrap();
    let mut rows = Vec::new();
    while cursor.has_next() {
        let triple = cursor.read();
        cursor.proceed();
        rows.push((
            store.dict(TriplePosition::Subject).unwrap().id_to_string(triple.subject).unwrap(),
            store.dict(TriplePosition::Predicate).unwrap().id_to_string(triple.predicate).unwrap(),
            store.dict(TriplePosition::Object).unwrap().id_to_string(triple.object).unwrap(),
        ));
    }
    rows
}

#[test]
fn full_walk_replays_one_row_per_input_line() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = build_fixture(dir.path());
    store.ensure_all_dicts().unwrap();

    // the repeated input line comes back twice; multiplicity is real
    let rows = matches(&mut store, &TriplePattern::default());
    assert_eq!(rows, fixture_triples());
}

#[test]
fn every_pattern_shape_agrees_with_naive_filtering() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = build_fixture(dir.path());
    store.ensure_all_dicts().unwrap();

    let all = fixture_triples();
    let subjects = ["", S1, S2];
    let predicates = ["", P1, P2];
    let objects = ["", O1, "\"v1\""];

    for s in subjects {
        for p in predicates {
            for o in objects {
                let pattern = resolve_pattern(&store, s, p, o);
                let mut got = matches(&mut store, &pattern);
                got.sort();
                let mut expected: Vec<_> = all
                    .iter()
                    .filter(|(ts, tp, to)| {
                        (s.is_empty() || ts == s)
                            && (p.is_empty() || tp == p)
                            && (o.is_empty() || to == o)
                    })
                    .cloned()
                    .collect();
                if !s.is_empty() && !p.is_empty() && !o.is_empty() {
                    // fully bound patterns are an existence check
                    expected.dedup();
                }
                assert_eq!(got, expected, "pattern ({:?} {:?} {:?})", s, p, o);
            }
        }
    }
}

#[test]
fn fully_bound_pattern_is_an_existence_check() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = build_fixture(dir.path());
    store.ensure_all_dicts().unwrap();

    let present = resolve_pattern(&store, S1, P1, O1);
    assert_eq!(matches(&mut store, &present).len(), 1);

    // all three terms exist, the combination does not
    let absent = resolve_pattern(&store, S1, P2, "\"v1\"");
    assert!(matches(&mut store, &absent).is_empty());
}

#[test]
fn walks_come_out_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = build_fixture(dir.path());
    store.ensure_all_dicts().unwrap();

    let rows = matches(&mut store, &TriplePattern::default());
    let mut sorted = rows.clone();
    sorted.sort();
    // SPO walk order equals byte order of the term strings
    assert_eq!(rows, sorted);

    let one_subject = resolve_pattern(&store, S1, "", "");
    let rows = matches(&mut store, &one_subject);
    let mut sorted = rows.clone();
    sorted.sort();
    assert_eq!(rows, sorted);
    // three distinct s1 triples plus the duplicated line
    assert_eq!(rows.len(), 4);
}

#[test]
fn term_queries_filter_by_prefix_and_position() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = build_fixture(dir.path());
    store.ensure_all_dicts().unwrap();

    let subjects: Vec<(String, u64)> = store
        .terms("http://ex.org/s", TriplePosition::Subject)
        .unwrap()
        .collect();
    assert_eq!(
        subjects.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>(),
        vec![S1, S2]
    );
    // s1 appears in four rows, one of them a duplicate line
    assert_eq!(subjects[0].1, 4);

    let literals: Vec<String> = store
        .terms("\"v", TriplePosition::Object)
        .unwrap()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(literals, vec!["\"v1\"", "\"v2\"@en"]);

    let none: Vec<(String, u64)> = store
        .terms("http://ex.org/s", TriplePosition::Predicate)
        .unwrap()
        .collect();
    assert!(none.is_empty());
}

#[test]
fn any_position_terms_are_merged_and_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = build_fixture(dir.path());
    store.ensure_all_dicts().unwrap();

    // o1 is only an object; s1/s2 only subjects; everything merges sorted
    let all: Vec<String> = store
        .terms_any("http://ex.org/", &TriplePosition::ALL)
        .unwrap()
        .collect();
    assert_eq!(all, vec![O1, P1, P2, S1, S2]);

    let mut sorted = all.clone();
    sorted.dedup();
    assert_eq!(all, sorted);
}

#[test]
fn order_file_disagreeing_with_the_dictionary_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = build_fixture(dir.path());
    store.ensure_all_dicts().unwrap();
    let pattern = resolve_pattern(&store, S1, "", "");

    // overwrite the subject primary ids with ids no dictionary handed out
    let mut bogus = Vec::new();
    for id in [900u64, 901] {
        bogus.extend_from_slice(&id.to_le_bytes());
    }
    fs::write(dir.path().join("store").join("subject.primary-ids"), &bogus).unwrap();

    assert!(store.query(&pattern).is_err());
}

#[test]
fn opening_a_non_store_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Store::open(dir.path()).is_err());
    assert!(Store::open(&dir.path().join("missing")).is_err());
}

#[test]
fn nquads_input_ignores_the_graph_term() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_nt(
        dir.path(),
        "input.nq",
        &[
            "<http://ex.org/s1> <http://ex.org/p1> <http://ex.org/o1> <http://ex.org/g1> .",
            "<http://ex.org/s1> <http://ex.org/p1> \"v1\" .",
        ],
    );
    let out = dir.path().join("store");
    compose::build_from_text(&input, &out, "https://example.com/").unwrap();
    let mut store = Store::open(&out).unwrap();
    store.ensure_all_dicts().unwrap();
    assert_eq!(matches(&mut store, &TriplePattern::default()).len(), 2);
}
