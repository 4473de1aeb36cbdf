use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{TermId, TriplePosition};
use crate::dict::term_iter::PrefixTerms;
use crate::dict::trie::Trie;
use crate::mmap::MmapFile;

/// One position's term dictionary: interning, lookup in both directions,
/// prefix queries, and ordering. Backed by a radix trie over an mmapped
/// base plus an in-memory delta.
pub struct Dictionary {
    trie: Trie,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary { trie: Trie::new() }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let map = MmapFile::open_read_only(path)?;
        let trie = Trie::load(map).map_err(|e| {
            Error::new(e.kind, format!("{}: {}", path.display(), e.context))
        })?;
        debug!(path = %path.display(), terms = trie.len(), "opened dictionary");
        Ok(Dictionary { trie })
    }

    pub fn file_path(dir: &Path, position: TriplePosition) -> PathBuf {
        dir.join(format!("{}s.dictionary", position.as_str()))
    }

    /// Intern a term, adding `occurrences` to its count. Returns its id.
    pub fn add(&mut self, term: &str, occurrences: u64) -> Result<TermId> {
        let (id, _) = self.trie.insert(term, occurrences)?;
        Ok(id)
    }

    /// Remove `occurrences` of a term; the term disappears when its count
    /// reaches zero. Removing an absent term is an error.
    pub fn remove(&mut self, term: &str, occurrences: u64) -> Result<()> {
        let id = self.trie.string_to_id(term)?;
        self.trie.remove(id, occurrences)
    }

    pub fn string_to_id(&self, term: &str) -> Result<TermId> {
        self.trie.string_to_id(term)
    }

    pub fn id_to_string(&self, id: TermId) -> Result<String> {
        self.trie.id_to_string(id)
    }

    /// All stored terms starting with `prefix`, lexicographic, lazy.
    pub fn query<'a>(&'a self, prefix: &str) -> PrefixTerms<'a> {
        PrefixTerms::new(&self.trie, prefix)
    }

    /// Order of two terms of this dictionary by id, without materializing
    /// the strings. Invalid ids are a caller bug and panic; use
    /// `try_compare` for ids read from untrusted files.
    pub fn compare(&self, a: TermId, b: TermId) -> Ordering {
        self.trie.compare(a, b)
    }

    /// Fallible compare for ids that may not belong to this dictionary.
    pub fn try_compare(&self, a: TermId, b: TermId) -> Result<Ordering> {
        self.trie.try_compare(a, b)
    }

    /// Order across dictionaries; falls back to the intra-dictionary
    /// compare when `other` is this dictionary.
    pub fn compare_across(&self, a: TermId, other: &Dictionary, b: TermId) -> Result<Ordering> {
        self.trie.try_compare_across(a, &other.trie, b)
    }

    /// Number of distinct live terms.
    pub fn len(&self) -> u64 {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| {
            Error::new(ErrorKind::Io, format!("cannot create {}: {}", path.display(), e))
        })?;
        let mut out = BufWriter::new(file);
        self.trie.save(&mut out)?;
        out.flush()?;
        Ok(())
    }
}

/// The three dictionaries of one store or compose target.
pub struct DictSet {
    pub subjects: Dictionary,
    pub predicates: Dictionary,
    pub objects: Dictionary,
}

impl DictSet {
    pub fn new() -> Self {
        DictSet {
            subjects: Dictionary::new(),
            predicates: Dictionary::new(),
            objects: Dictionary::new(),
        }
    }

    pub fn get(&self, position: TriplePosition) -> &Dictionary {
        match position {
            TriplePosition::Subject => &self.subjects,
            TriplePosition::Predicate => &self.predicates,
            TriplePosition::Object => &self.objects,
        }
    }

    pub fn get_mut(&mut self, position: TriplePosition) -> &mut Dictionary {
        match position {
            TriplePosition::Subject => &mut self.subjects,
            TriplePosition::Predicate => &mut self.predicates,
            TriplePosition::Object => &mut self.objects,
        }
    }

    pub fn set(&mut self, position: TriplePosition, dict: Dictionary) {
        match position {
            TriplePosition::Subject => self.subjects = dict,
            TriplePosition::Predicate => self.predicates = dict,
            TriplePosition::Object => self.objects = dict,
        }
    }

    pub fn save_all(&self, dir: &Path) -> Result<()> {
        for position in TriplePosition::ALL {
            self.get(position)
                .save(&Dictionary::file_path(dir, position))?;
        }
        Ok(())
    }
}
