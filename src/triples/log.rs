use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rayon::prelude::*;
use tracing::debug;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{QuantifiedTriple, TermId, TripleOrder};
use crate::dict::DictSet;
use crate::triples::csr;

pub(crate) fn put_u64<W: Write>(out: &mut W, value: u64) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Streaming CSR emitter for one order. Rows must arrive sorted under
/// that order; duplicate rows are written as-is, one row per instance,
/// so store walks replay the multiset.
pub struct CsrWriter {
    order: TripleOrder,
    primary: Option<BufWriter<File>>,
    secondary_ids: BufWriter<File>,
    secondary_refs: BufWriter<File>,
    tertiary_ids: BufWriter<File>,
    tertiary_refs: BufWriter<File>,
    cur_primary: Option<u64>,
    cur_secondary: Option<u64>,
    secondary_count: u64,
    tertiary_count: u64,
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| {
        Error::new(ErrorKind::Io, format!("cannot create {}: {}", path.display(), e))
    })?;
    Ok(BufWriter::new(file))
}

impl CsrWriter {
    pub fn create(dir: &Path, order: TripleOrder) -> Result<Self> {
        let primary = if order.writes_primary_ids() {
            Some(create(&csr::primary_ids_path(dir, order))?)
        } else {
            None
        };
        Ok(CsrWriter {
            order,
            primary,
            secondary_ids: create(&csr::secondary_ids_path(dir, order))?,
            secondary_refs: create(&csr::secondary_refs_path(dir, order))?,
            tertiary_ids: create(&csr::tertiary_ids_path(dir, order))?,
            tertiary_refs: create(&csr::tertiary_refs_path(dir, order))?,
            cur_primary: None,
            cur_secondary: None,
            secondary_count: 0,
            tertiary_count: 0,
        })
    }

    pub fn push(&mut self, triple: &QuantifiedTriple) -> Result<()> {
        let [p, s, t] = triple.ordered_terms(self.order);
        if self.cur_primary != Some(p) {
            if let Some(out) = &mut self.primary {
                put_u64(out, p)?;
            }
            put_u64(&mut self.secondary_refs, self.secondary_count)?;
            self.cur_primary = Some(p);
            self.cur_secondary = None;
        }
        if self.cur_secondary != Some(s) {
            put_u64(&mut self.secondary_ids, s)?;
            put_u64(&mut self.tertiary_refs, self.tertiary_count)?;
            self.secondary_count += 1;
            self.cur_secondary = Some(s);
        }
        put_u64(&mut self.tertiary_ids, t)?;
        self.tertiary_count += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.tertiary_count
    }

    pub fn finish(mut self) -> Result<()> {
        if let Some(out) = &mut self.primary {
            out.flush()?;
        }
        self.secondary_ids.flush()?;
        self.secondary_refs.flush()?;
        self.tertiary_ids.flush()?;
        self.tertiary_refs.flush()?;
        Ok(())
    }
}

/// In-memory triple log for a bulk build: interned ids are appended, then
/// the log is re-sorted once per order and emitted as CSR.
pub struct TripleLog {
    triples: Vec<QuantifiedTriple>,
}

impl TripleLog {
    pub fn new() -> Self {
        TripleLog { triples: Vec::new() }
    }

    pub fn add(&mut self, subject: TermId, predicate: TermId, object: TermId) {
        self.triples.push(QuantifiedTriple::new(subject, predicate, object, 1));
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    fn sort_for(&mut self, order: TripleOrder, dicts: &DictSet) {
        let positions = order.positions();
        let cmps = positions.map(|p| dicts.get(p));
        self.triples.par_sort_unstable_by(|a, b| {
            for i in 0..3 {
                let ord = cmps[i].compare(a.term(positions[i]), b.term(positions[i]));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    pub fn save(&mut self, dir: &Path, dicts: &DictSet) -> Result<()> {
        for order in TripleOrder::ALL {
            self.sort_for(order, dicts);
            let mut writer = CsrWriter::create(dir, order)?;
            for triple in &self.triples {
                writer.push(triple)?;
            }
            debug!(order = order.name(), rows = writer.rows_written(), "wrote order");
            writer.finish()?;
        }
        Ok(())
    }
}
