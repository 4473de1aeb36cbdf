use std::cmp::Ordering;
use std::path::Path;

use tracing::{debug, info};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{QuantifiedTriple, TripleOrder, TriplePosition};
use crate::dict::{DictSet, Dictionary};
use crate::store::Store;
use crate::triples::CsrWriter;
use crate::triples::TripleCursor;

fn pos_index(position: TriplePosition) -> usize {
    match position {
        TriplePosition::Subject => 0,
        TriplePosition::Predicate => 1,
        TriplePosition::Object => 2,
    }
}

/// Multiset union of the additions minus the subtractions, written as a
/// fresh store under `output`.
pub fn merge_stores(
    mut additions: Vec<Store>,
    mut subtractions: Vec<Store>,
    output: &Path,
) -> Result<()> {
    for store in additions.iter_mut().chain(subtractions.iter_mut()) {
        store.ensure_all_dicts()?;
    }

    // Per position the addition with the most distinct terms becomes the
    // unification target; everyone else relocates into it.
    let mut target_idx = [0usize; 3];
    for position in TriplePosition::ALL {
        let mut best = 0usize;
        for (i, store) in additions.iter().enumerate() {
            if store.dict(position)?.len() > additions[best].dict(position)?.len() {
                best = i;
            }
        }
        target_idx[pos_index(position)] = best;
    }

    let mut targets = DictSet::new();
    for position in TriplePosition::ALL {
        let dict = additions[target_idx[pos_index(position)]].take_dict(position)?;
        targets.set(position, dict);
    }

    for (i, store) in additions.iter().enumerate() {
        for position in TriplePosition::ALL {
            if i == target_idx[pos_index(position)] {
                continue;
            }
            let mut merged = 0u64;
            for (term, occurrences) in store.terms("", position)? {
                targets.get_mut(position).add(&term, occurrences)?;
                merged += 1;
            }
            debug!(
                source = %store.dir().display(),
                position = position.as_str(),
                terms = merged,
                "unified dictionary"
            );
        }
    }

    for order in TripleOrder::ALL {
        let mut add = MergedStream::new(&additions, &targets, Some(&target_idx), order)?;
        let mut sub = MergedStream::new(&subtractions, &targets, None, order)?;
        let mut writer = CsrWriter::create(output, order)?;

        while add.has_next() {
            let mut current = add.read();
            add.proceed()?;
            while add.has_next() && add.read().same_terms(&current) {
                current.quantity += add.read().quantity;
                add.proceed()?;
            }
            while sub.has_next() && sub.read().same_terms(&current) {
                let quantity = sub.read().quantity;
                if quantity > current.quantity {
                    return Err(Error::new(
                        ErrorKind::InvalidInput,
                        format!(
                            "over-subtraction of triple ({}, {}, {})",
                            current.subject, current.predicate, current.object
                        ),
                    ));
                }
                current.quantity -= quantity;
                sub.proceed()?;
            }
            if current.quantity > 0 {
                writer.push(&current)?;
            }
        }
        if sub.has_next() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "subtraction contains triples absent from the additions".to_string(),
            ));
        }
        info!(order = order.name(), rows = writer.rows_written(), "merged order");
        writer.finish()?;
    }

    for store in &subtractions {
        for position in TriplePosition::ALL {
            for (term, occurrences) in store.terms("", position)? {
                targets.get_mut(position).remove(&term, occurrences)?;
            }
        }
    }

    targets.save_all(output)?;
    Ok(())
}

struct SourceCursor<'a> {
    cursor: TripleCursor,
    /// Per position (s, p, o): the dictionary the source's ids live in.
    /// For the unification target that is the target dictionary itself.
    dicts: [&'a Dictionary; 3],
    /// Whether ids of this position must be relocated on emit.
    remap: [bool; 3],
}

/// K-way merge of several stores' whole-store walks under one order,
/// compared across dictionaries and relocated into the target id space
/// on emit. Equal triples come out adjacent so the caller can sum their
/// quantities.
struct MergedStream<'a> {
    sources: Vec<SourceCursor<'a>>,
    order: TripleOrder,
    targets: &'a DictSet,
    head: Option<QuantifiedTriple>,
}

impl<'a> MergedStream<'a> {
    /// `target_idx` marks which source already lives in the target id
    /// space per position; None (subtractions) relocates everything.
    fn new(
        stores: &'a [Store],
        targets: &'a DictSet,
        target_idx: Option<&[usize; 3]>,
        order: TripleOrder,
    ) -> Result<Self> {
        let mut sources = Vec::with_capacity(stores.len());
        for (i, store) in stores.iter().enumerate() {
            let cursor = store.query_order(order)?;
            let mut dicts: [&Dictionary; 3] = [
                targets.get(TriplePosition::Subject),
                targets.get(TriplePosition::Predicate),
                targets.get(TriplePosition::Object),
            ];
            let mut remap = [false; 3];
            for position in TriplePosition::ALL {
                let k = pos_index(position);
                let is_target = target_idx.map_or(false, |t| t[k] == i);
                if !is_target {
                    dicts[k] = store.dict(position)?;
                    remap[k] = true;
                }
            }
            sources.push(SourceCursor { cursor, dicts, remap });
        }
        let mut stream = MergedStream { sources, order, targets, head: None };
        stream.advance()?;
        Ok(stream)
    }

    fn has_next(&self) -> bool {
        self.head.is_some()
    }

    fn read(&self) -> QuantifiedTriple {
        match self.head {
            Some(triple) => triple,
            None => panic!("merged stream read past the end"),
        }
    }

    fn proceed(&mut self) -> Result<()> {
        self.advance()
    }

    fn advance(&mut self) -> Result<()> {
        let mut min: Option<usize> = None;
        for i in 0..self.sources.len() {
            if !self.sources[i].cursor.has_next() {
                continue;
            }
            min = Some(match min {
                None => i,
                Some(j) => {
                    if self.compare_heads(i, j)? == Ordering::Less {
                        i
                    } else {
                        j
                    }
                }
            });
        }
        self.head = match min {
            None => None,
            Some(i) => {
                let raw = self.sources[i].cursor.read();
                self.sources[i].cursor.proceed();
                Some(self.relocate(i, raw)?)
            }
        };
        Ok(())
    }

    fn compare_heads(&self, i: usize, j: usize) -> Result<Ordering> {
        let ti = self.sources[i].cursor.read();
        let tj = self.sources[j].cursor.read();
        for position in self.order.positions() {
            let k = pos_index(position);
            let ord = self.sources[i].dicts[k].compare_across(
                ti.term(position),
                self.sources[j].dicts[k],
                tj.term(position),
            )?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }

    fn relocate(&self, i: usize, mut triple: QuantifiedTriple) -> Result<QuantifiedTriple> {
        for position in TriplePosition::ALL {
            let k = pos_index(position);
            if !self.sources[i].remap[k] {
                continue;
            }
            let term = self.sources[i].dicts[k].id_to_string(triple.term(position))?;
            let id = self.targets.get(position).string_to_id(&term).map_err(|_| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("term '{}' is absent from the unified dictionary", term),
                )
            })?;
            triple.set_term(position, id);
        }
        Ok(triple)
    }
}
