use std::iter::Peekable;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{TripleOrder, TriplePattern, TriplePosition};
use crate::dict::term_iter::PrefixTerms;
use crate::dict::Dictionary;
use crate::triples::csr::OrderFiles;
use crate::triples::TripleCursor;

/// One on-disk store: a directory holding three dictionaries and five
/// CSR orders. Dictionaries and order files load lazily and at most once.
pub struct Store {
    dir: PathBuf,
    subjects: Option<Dictionary>,
    predicates: Option<Dictionary>,
    objects: Option<Dictionary>,
    orders: OrderFiles,
}

impl Store {
    /// Open a store directory. The directory must exist and carry the
    /// three dictionary files; everything is mapped lazily afterwards.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a store directory", dir.display()),
            ));
        }
        for position in TriplePosition::ALL {
            let path = Dictionary::file_path(dir, position);
            if !path.is_file() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("{} is missing {}", dir.display(), path.display()),
                ));
            }
        }
        debug!(dir = %dir.display(), "opened store");
        Ok(Store {
            dir: dir.to_path_buf(),
            subjects: None,
            predicates: None,
            objects: None,
            orders: OrderFiles::new(dir.to_path_buf()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn dict_slot(&mut self, position: TriplePosition) -> &mut Option<Dictionary> {
        match position {
            TriplePosition::Subject => &mut self.subjects,
            TriplePosition::Predicate => &mut self.predicates,
            TriplePosition::Object => &mut self.objects,
        }
    }

    pub fn ensure_dict(&mut self, position: TriplePosition) -> Result<()> {
        if self.dict_slot(position).is_none() {
            let dict = Dictionary::open(&Dictionary::file_path(&self.dir, position))?;
            *self.dict_slot(position) = Some(dict);
        }
        Ok(())
    }

    pub fn ensure_all_dicts(&mut self) -> Result<()> {
        for position in TriplePosition::ALL {
            self.ensure_dict(position)?;
        }
        Ok(())
    }

    /// The loaded dictionary for a position. Queries fail closed: asking
    /// for an unloaded dictionary is an error, never an empty answer.
    pub fn dict(&self, position: TriplePosition) -> Result<&Dictionary> {
        let slot = match position {
            TriplePosition::Subject => &self.subjects,
            TriplePosition::Predicate => &self.predicates,
            TriplePosition::Object => &self.objects,
        };
        slot.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::NotLoaded,
                format!("{} dictionary of {} is not loaded", position.as_str(), self.dir.display()),
            )
        })
    }

    /// Move a loaded dictionary out of the store (compose target
    /// unification). Further queries against that position fail closed.
    pub fn take_dict(&mut self, position: TriplePosition) -> Result<Dictionary> {
        self.ensure_dict(position)?;
        self.dict_slot(position).take().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidState,
                format!("{} dictionary taken twice", position.as_str()),
            )
        })
    }

    /// Pattern lookup. Routes to the order that places the bound
    /// positions first and binary-searches by dictionary order.
    pub fn query(&mut self, pattern: &TriplePattern) -> Result<TripleCursor> {
        let order = TripleOrder::for_pattern(pattern);
        self.ensure_all_dicts()?;
        let arrays = self.orders.arrays(order)?;
        let [p0, p1, p2] = order.positions();
        let dicts = [self.dict(p0)?, self.dict(p1)?, self.dict(p2)?];
        TripleCursor::open(arrays, order, pattern, dicts)
    }

    /// Whole-store walk in a fixed order (compose input).
    pub fn query_order(&self, order: TripleOrder) -> Result<TripleCursor> {
        Ok(TripleCursor::walk_all(self.orders.arrays(order)?, order))
    }

    /// Prefix query against one position's dictionary.
    pub fn terms<'a>(&'a self, prefix: &str, position: TriplePosition) -> Result<PrefixTerms<'a>> {
        Ok(self.dict(position)?.query(prefix))
    }

    /// Prefix query across several positions, merged and deduplicated,
    /// still lexicographic.
    pub fn terms_any<'a>(
        &'a self,
        prefix: &str,
        positions: &[TriplePosition],
    ) -> Result<MergedTerms<'a>> {
        let mut iters = Vec::with_capacity(positions.len());
        for &position in positions {
            iters.push(self.dict(position)?.query(prefix).peekable());
        }
        Ok(MergedTerms { iters })
    }
}

/// K-way merge of per-position prefix streams; a term present in several
/// positions comes out once.
pub struct MergedTerms<'a> {
    iters: Vec<Peekable<PrefixTerms<'a>>>,
}

impl Iterator for MergedTerms<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mut min: Option<&str> = None;
        for iter in self.iters.iter_mut() {
            if let Some((term, _)) = iter.peek() {
                if min.map_or(true, |m| term.as_str() < m) {
                    min = Some(term.as_str());
                }
            }
        }
        let min = min?.to_owned();
        for iter in self.iters.iter_mut() {
            if iter.peek().map_or(false, |(term, _)| *term == min) {
                iter.next();
            }
        }
        Some(min)
    }
}
