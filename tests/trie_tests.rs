use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tripod::core::error::ErrorKind;
use tripod::dict::Dictionary;

fn dict_with(terms: &[&str]) -> Dictionary {
    let mut dict = Dictionary::new();
    for term in terms {
        dict.add(term, 1).unwrap();
    }
    dict
}

#[test]
fn round_trip_and_dense_ids() {
    let terms = [
        "http://ex.org/alpha",
        "http://ex.org/beta",
        "http://ex.org/alphabet",
        "\"a literal value\"",
        "_:blank1",
        "zz",
    ];
    let mut dict = Dictionary::new();
    let mut ids = Vec::new();
    for term in terms {
        ids.push(dict.add(term, 1).unwrap());
    }
    // fresh dictionary: ids are the dense range [1..N] in insertion order
    assert_eq!(ids, (1..=terms.len() as u64).collect::<Vec<_>>());
    for (term, id) in terms.iter().zip(&ids) {
        assert_eq!(dict.string_to_id(term).unwrap(), *id);
        assert_eq!(dict.id_to_string(*id).unwrap(), *term);
    }
    assert_eq!(dict.len(), terms.len() as u64);
}

#[test]
fn duplicate_insert_bumps_instead_of_duplicating() {
    let mut dict = Dictionary::new();
    let first = dict.add("http://ex.org/a", 1).unwrap();
    let again = dict.add("http://ex.org/a", 2).unwrap();
    assert_eq!(first, again);
    assert_eq!(dict.len(), 1);
    let all: Vec<(String, u64)> = dict.query("").collect();
    assert_eq!(all, vec![("http://ex.org/a".to_string(), 3)]);
}

#[test]
fn short_terms_are_rejected() {
    let mut dict = Dictionary::new();
    let err = dict.add("x", 1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
}

#[test]
fn compare_matches_byte_order() {
    let mut rng = StdRng::seed_from_u64(0x7210d);
    let alphabet = b"abcdefgh/:.#0123";
    let mut terms = Vec::new();
    for _ in 0..200 {
        let len = rng.gen_range(2..14);
        let term: String = (0..len)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
            .collect();
        terms.push(term);
    }
    terms.sort();
    terms.dedup();

    let mut dict = Dictionary::new();
    let ids: Vec<u64> = terms.iter().map(|t| dict.add(t, 1).unwrap()).collect();

    for i in 0..terms.len() {
        for j in 0..terms.len() {
            assert_eq!(
                dict.compare(ids[i], ids[j]),
                terms[i].as_bytes().cmp(terms[j].as_bytes()),
                "compare({:?}, {:?})",
                terms[i],
                terms[j]
            );
        }
    }
}

#[test]
fn compare_handles_prefix_terms() {
    let dict = dict_with(&["ab", "abc", "abcd", "ac"]);
    let ab = dict.string_to_id("ab").unwrap();
    let abc = dict.string_to_id("abc").unwrap();
    let abcd = dict.string_to_id("abcd").unwrap();
    let ac = dict.string_to_id("ac").unwrap();
    assert_eq!(dict.compare(ab, abc), Ordering::Less);
    assert_eq!(dict.compare(abc, abcd), Ordering::Less);
    assert_eq!(dict.compare(abcd, ac), Ordering::Less);
    assert_eq!(dict.compare(ac, ab), Ordering::Greater);
    assert_eq!(dict.compare(abc, abc), Ordering::Equal);
}

#[test]
fn compare_across_dictionaries_agrees_with_string_order() {
    let a = dict_with(&["apple", "banana", "cherry", "da", "db"]);
    let b = dict_with(&["banana", "blueberry", "cherry", "apples", "da"]);

    let mut pairs = Vec::new();
    for (ta, _) in a.query("") {
        for (tb, _) in b.query("") {
            pairs.push((ta.clone(), tb));
        }
    }
    for (ta, tb) in pairs {
        let ia = a.string_to_id(&ta).unwrap();
        let ib = b.string_to_id(&tb).unwrap();
        assert_eq!(
            a.compare_across(ia, &b, ib).unwrap(),
            ta.as_bytes().cmp(tb.as_bytes()),
            "compare_across({:?}, {:?})",
            ta,
            tb
        );
    }
}

#[test]
fn insert_then_remove_is_an_inverse() {
    let mut dict = dict_with(&["keep-me", "other"]);
    dict.add("doomed", 1).unwrap();
    dict.remove("doomed", 1).unwrap();

    assert!(dict.string_to_id("doomed").is_err());
    assert_eq!(dict.len(), 2);
    assert!(dict.string_to_id("keep-me").is_ok());
    assert!(dict.string_to_id("other").is_ok());

    // tombstoned slots are never reused
    let fresh = dict.add("newcomer", 1).unwrap();
    assert_eq!(fresh, 4);
}

#[test]
fn partial_remove_only_decrements() {
    let mut dict = Dictionary::new();
    dict.add("http://ex.org/t", 5).unwrap();
    dict.remove("http://ex.org/t", 2).unwrap();
    let all: Vec<(String, u64)> = dict.query("").collect();
    assert_eq!(all[0].1, 3);
    assert_eq!(dict.len(), 1);
}

#[test]
fn removing_an_absent_term_errors() {
    let mut dict = dict_with(&["present"]);
    let err = dict.remove("absent", 1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[test]
fn comparing_a_foreign_id_is_an_error_not_a_panic() {
    let dict = dict_with(&["aa", "bb"]);
    let aa = dict.string_to_id("aa").unwrap();
    assert!(dict.try_compare(aa, 999).is_err());
    assert!(dict.try_compare(999, aa).is_err());
    assert_eq!(dict.try_compare(aa, aa).unwrap(), Ordering::Equal);

    let other = dict_with(&["cc"]);
    assert!(dict.compare_across(aa, &other, 999).is_err());
}

#[test]
fn save_open_round_trip_preserves_ids_and_terms() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terms.dictionary");

    let mut rng = StdRng::seed_from_u64(42);
    let mut terms = Vec::new();
    for i in 0..300 {
        let tail: String = (0..rng.gen_range(1..20))
            .map(|_| (b'a' + rng.gen_range(0..26)) as char)
            .collect();
        terms.push(format!("http://ex.org/{}/{}", i % 7, tail));
    }
    terms.sort();
    terms.dedup();

    let mut dict = Dictionary::new();
    let ids: Vec<u64> = terms.iter().map(|t| dict.add(t, 2).unwrap()).collect();
    dict.save(&path).unwrap();

    let reopened = Dictionary::open(&path).unwrap();
    assert_eq!(reopened.len(), terms.len() as u64);
    for (term, id) in terms.iter().zip(&ids) {
        assert_eq!(reopened.string_to_id(term).unwrap(), *id);
        assert_eq!(reopened.id_to_string(*id).unwrap(), *term);
    }

    let listed: Vec<String> = reopened.query("").map(|(t, _)| t).collect();
    let mut expected = terms.clone();
    expected.sort();
    assert_eq!(listed, expected);
}

#[test]
fn removals_survive_a_save_as_holes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terms.dictionary");

    let mut dict = dict_with(&["aa", "bb", "cc", "dd"]); // ids 1..4
    dict.remove("bb", 1).unwrap();
    dict.remove("dd", 1).unwrap(); // trailing deletion
    dict.save(&path).unwrap();

    let mut reopened = Dictionary::open(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.string_to_id("aa").unwrap(), 1);
    assert_eq!(reopened.string_to_id("cc").unwrap(), 3);
    assert_eq!(reopened.string_to_id("bb").unwrap_err().kind, ErrorKind::NotFound);
    assert_eq!(reopened.id_to_string(2).unwrap_err().kind, ErrorKind::NotFound);
    assert_eq!(reopened.id_to_string(4).unwrap_err().kind, ErrorKind::NotFound);

    // new terms continue past every id ever handed out
    assert_eq!(reopened.add("ee", 1).unwrap(), 5);
}

#[test]
fn removal_of_a_persisted_term_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terms.dictionary");

    let mut dict = dict_with(&["shared/x", "shared/y", "shared/z"]);
    dict.save(&path).unwrap();

    let mut reopened = Dictionary::open(&path).unwrap();
    reopened.remove("shared/y", 1).unwrap();
    assert!(reopened.string_to_id("shared/y").is_err());
    assert_eq!(reopened.string_to_id("shared/x").unwrap(), 1);
    assert_eq!(reopened.string_to_id("shared/z").unwrap(), 3);

    // second save after the delta removal
    let path2 = dir.path().join("terms2.dictionary");
    reopened.save(&path2).unwrap();
    let third = Dictionary::open(&path2).unwrap();
    assert_eq!(third.len(), 2);
    assert_eq!(third.string_to_id("shared/x").unwrap(), 1);
    assert_eq!(third.string_to_id("shared/z").unwrap(), 3);
}

#[test]
fn prefix_query_merges_persisted_and_fresh_terms_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terms.dictionary");

    let mut dict = dict_with(&["apple", "apricot", "banana"]);
    dict.save(&path).unwrap();

    let mut reopened = Dictionary::open(&path).unwrap();
    reopened.add("apex", 1).unwrap();
    reopened.add("applesauce", 1).unwrap();

    let matched: Vec<String> = reopened.query("ap").map(|(t, _)| t).collect();
    assert_eq!(matched, vec!["apex", "apple", "applesauce", "apricot"]);

    let none: Vec<String> = reopened.query("zz").map(|(t, _)| t).collect();
    assert!(none.is_empty());

    let exact: Vec<String> = reopened.query("banana").map(|(t, _)| t).collect();
    assert_eq!(exact, vec!["banana"]);
}

#[test]
fn random_mutation_save_cycles_stay_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(9);

    // model: term -> (id, occurrences)
    let mut model: Vec<(String, u64, u64)> = Vec::new();
    let mut dict = Dictionary::new();

    for round in 0..4 {
        for _ in 0..60 {
            if !model.is_empty() && rng.gen_bool(0.3) {
                let at = rng.gen_range(0..model.len());
                let (term, _, occ) = model[at].clone();
                dict.remove(&term, occ).unwrap();
                model.remove(at);
            } else {
                let term = format!("term/{}/{}", round, rng.gen_range(0..100_000));
                if model.iter().any(|(t, _, _)| *t == term) {
                    continue;
                }
                let id = dict.add(&term, 1).unwrap();
                model.push((term, id, 1));
            }
        }
        let path = dir.path().join(format!("cycle-{}.dictionary", round));
        dict.save(&path).unwrap();
        dict = Dictionary::open(&path).unwrap();

        assert_eq!(dict.len(), model.len() as u64);
        for (term, id, _) in &model {
            assert_eq!(dict.string_to_id(term).unwrap(), *id, "term {:?}", term);
            assert_eq!(dict.id_to_string(*id).unwrap(), *term);
        }
    }
}
