use std::cmp::Ordering;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{QuantifiedTriple, TermId, TripleOrder, TriplePattern};
use crate::dict::Dictionary;
use crate::mmap::U64Array;
use crate::triples::csr::CsrArrays;

/// Binary search of `ids[lo..hi]` for `target` under the dictionary's
/// term order. Bounds are re-checked every iteration, so an absent key
/// always terminates with None. An on-disk id the dictionary does not
/// know is an InvalidState error, not a panic.
fn search(
    ids: &U64Array,
    mut lo: usize,
    mut hi: usize,
    target: TermId,
    dict: &Dictionary,
) -> Result<Option<usize>> {
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let ord = dict.try_compare(target, ids.get(mid)).map_err(|e| {
            Error::new(
                ErrorKind::InvalidState,
                format!("order file disagrees with the dictionary: {}", e.context),
            )
        })?;
        match ord {
            Ordering::Equal => return Ok(Some(mid)),
            Ordering::Less => hi = mid,
            Ordering::Greater => lo = mid + 1,
        }
    }
    Ok(None)
}

/// Lockstep walk over an order's three levels. The tertiary offset always
/// advances; the secondary (then primary) offset advances when it crosses
/// the next segment boundary.
struct CsrWalk {
    arrays: CsrArrays,
    p_idx: usize,
    s_idx: usize,
    t_idx: usize,
    t_end: usize,
    cur_primary: u64,
    cur_secondary: u64,
}

impl CsrWalk {
    fn all(arrays: CsrArrays) -> Self {
        let t_end = arrays.tertiary_ids.len();
        let (cur_primary, cur_secondary) = if t_end > 0 {
            (arrays.primary_ids.get(0), arrays.secondary_ids.get(0))
        } else {
            (0, 0)
        };
        CsrWalk {
            arrays,
            p_idx: 0,
            s_idx: 0,
            t_idx: 0,
            t_end,
            cur_primary,
            cur_secondary,
        }
    }

    fn for_primary(arrays: CsrArrays, p_idx: usize) -> Self {
        let (s_lo, s_hi) = arrays.secondary_range(p_idx);
        let (t_lo, _) = arrays.tertiary_range(s_lo);
        let t_end = if s_hi < arrays.tertiary_refs.len() {
            arrays.tertiary_refs.get(s_hi) as usize
        } else {
            arrays.tertiary_ids.len()
        };
        let cur_primary = arrays.primary_ids.get(p_idx);
        let cur_secondary = arrays.secondary_ids.get(s_lo);
        CsrWalk {
            arrays,
            p_idx,
            s_idx: s_lo,
            t_idx: t_lo,
            t_end,
            cur_primary,
            cur_secondary,
        }
    }

    fn has_next(&self) -> bool {
        self.t_idx < self.t_end
    }

    fn read(&self, order: TripleOrder) -> QuantifiedTriple {
        QuantifiedTriple::from_ordered(
            order,
            self.cur_primary,
            self.cur_secondary,
            self.arrays.tertiary_ids.get(self.t_idx),
            1,
        )
    }

    fn proceed(&mut self) {
        self.t_idx += 1;
        if self.t_idx >= self.t_end {
            return;
        }
        let (_, t_hi) = self.arrays.tertiary_range(self.s_idx);
        if self.t_idx >= t_hi {
            self.s_idx += 1;
            self.cur_secondary = self.arrays.secondary_ids.get(self.s_idx);
            let (_, s_hi) = self.arrays.secondary_range(self.p_idx);
            if self.s_idx >= s_hi {
                self.p_idx += 1;
                self.cur_primary = self.arrays.primary_ids.get(self.p_idx);
            }
        }
    }
}

/// One tertiary segment, primary and secondary fixed (two bound terms).
struct TertiarySpan {
    arrays: CsrArrays,
    t_idx: usize,
    t_end: usize,
    primary: u64,
    secondary: u64,
}

enum CursorKind {
    Empty,
    Walk(CsrWalk),
    Span(TertiarySpan),
    Single(Option<QuantifiedTriple>),
}

/// Forward-only cursor over one pattern's matches, sorted under the
/// routed order. The shape is fixed at construction; reading is
/// allocation-free.
pub struct TripleCursor {
    order: TripleOrder,
    kind: CursorKind,
}

impl TripleCursor {
    pub fn empty(order: TripleOrder) -> Self {
        TripleCursor { order, kind: CursorKind::Empty }
    }

    /// Whole-store walk in the given order.
    pub fn walk_all(arrays: CsrArrays, order: TripleOrder) -> Self {
        TripleCursor { order, kind: CursorKind::Walk(CsrWalk::all(arrays)) }
    }

    /// Route a pattern against loaded arrays. `dicts` are the
    /// dictionaries of the order's positions, most significant first.
    /// Patterns bind a prefix of the order's positions by construction
    /// of the routing table.
    pub fn open(
        arrays: CsrArrays,
        order: TripleOrder,
        pattern: &TriplePattern,
        dicts: [&Dictionary; 3],
    ) -> Result<Self> {
        let [p0, p1, p2] = order.positions();
        let bound = [pattern.term(p0), pattern.term(p1), pattern.term(p2)];

        if bound[0] == 0 {
            return Ok(TripleCursor::walk_all(arrays, order));
        }
        let Some(p_idx) =
            search(&arrays.primary_ids, 0, arrays.primary_ids.len(), bound[0], dicts[0])?
        else {
            return Ok(TripleCursor::empty(order));
        };
        if bound[1] == 0 {
            return Ok(TripleCursor {
                order,
                kind: CursorKind::Walk(CsrWalk::for_primary(arrays, p_idx)),
            });
        }
        let (s_lo, s_hi) = arrays.secondary_range(p_idx);
        let Some(s_idx) = search(&arrays.secondary_ids, s_lo, s_hi, bound[1], dicts[1])? else {
            return Ok(TripleCursor::empty(order));
        };
        let (t_lo, t_hi) = arrays.tertiary_range(s_idx);
        if bound[2] == 0 {
            return Ok(TripleCursor {
                order,
                kind: CursorKind::Span(TertiarySpan {
                    arrays,
                    t_idx: t_lo,
                    t_end: t_hi,
                    primary: bound[0],
                    secondary: bound[1],
                }),
            });
        }
        // fully bound: a real existence check
        Ok(match search(&arrays.tertiary_ids, t_lo, t_hi, bound[2], dicts[2])? {
            Some(_) => TripleCursor {
                order,
                kind: CursorKind::Single(Some(QuantifiedTriple::from_ordered(
                    order, bound[0], bound[1], bound[2], 1,
                ))),
            },
            None => TripleCursor::empty(order),
        })
    }

    pub fn order(&self) -> TripleOrder {
        self.order
    }

    pub fn has_next(&self) -> bool {
        match &self.kind {
            CursorKind::Empty => false,
            CursorKind::Walk(walk) => walk.has_next(),
            CursorKind::Span(span) => span.t_idx < span.t_end,
            CursorKind::Single(t) => t.is_some(),
        }
    }

    pub fn read(&self) -> QuantifiedTriple {
        match &self.kind {
            CursorKind::Walk(walk) => walk.read(self.order),
            CursorKind::Span(span) => QuantifiedTriple::from_ordered(
                self.order,
                span.primary,
                span.secondary,
                span.arrays.tertiary_ids.get(span.t_idx),
                1,
            ),
            CursorKind::Single(Some(t)) => *t,
            CursorKind::Empty | CursorKind::Single(None) => {
                panic!("triple cursor read past the end")
            }
        }
    }

    pub fn proceed(&mut self) {
        match &mut self.kind {
            CursorKind::Empty => {}
            CursorKind::Walk(walk) => walk.proceed(),
            CursorKind::Span(span) => span.t_idx += 1,
            CursorKind::Single(t) => *t = None,
        }
    }
}
