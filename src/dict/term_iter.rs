use crate::dict::arena::TrieArena;
use crate::dict::trie::{Scope, Trie};

/// Merged walk over one node's out-edges: the persisted siblings and the
/// ones added this session, interleaved by first label byte, tombstoned
/// edges skipped.
pub struct OutEdgeIter<'a> {
    arena: &'a TrieArena,
    base_idx: usize,
    base_end: usize,
    delta: &'a [u64],
    delta_idx: usize,
}

impl<'a> OutEdgeIter<'a> {
    pub fn new(arena: &'a TrieArena, node: u64) -> Self {
        let (base_idx, base_end) = arena.base_out_edge_range(node);
        let mut iter = OutEdgeIter {
            arena,
            base_idx,
            base_end,
            delta: arena.delta_out_edges(node),
            delta_idx: 0,
        };
        iter.skip_deleted_base();
        iter
    }

    fn skip_deleted_base(&mut self) {
        while self.base_idx < self.base_end {
            let edge_id = self.arena.out_edge_id_at(self.base_idx);
            if !self.arena.edge(edge_id).deleted {
                break;
            }
            self.base_idx += 1;
        }
    }

    fn peek_base(&self) -> Option<u64> {
        if self.base_idx < self.base_end {
            Some(self.arena.out_edge_id_at(self.base_idx))
        } else {
            None
        }
    }

    fn peek_delta(&self) -> Option<u64> {
        self.delta.get(self.delta_idx).copied()
    }

    /// The next edge and whether it comes from the persisted side.
    fn current(&self) -> Option<(u64, bool)> {
        match (self.peek_base(), self.peek_delta()) {
            (None, None) => None,
            (Some(b), None) => Some((b, true)),
            (None, Some(d)) => Some((d, false)),
            (Some(b), Some(d)) => {
                if self.arena.first_label_byte(b) <= self.arena.first_label_byte(d) {
                    Some((b, true))
                } else {
                    Some((d, false))
                }
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.current().is_some()
    }

    pub fn read(&self) -> u64 {
        match self.current() {
            Some((edge, _)) => edge,
            None => panic!("out-edge iterator read past the end"),
        }
    }

    pub fn proceed(&mut self) {
        match self.current() {
            Some((_, true)) => {
                self.base_idx += 1;
                self.skip_deleted_base();
            }
            Some((_, false)) => self.delta_idx += 1,
            None => {}
        }
    }
}

/// Depth-first walk of a scope, yielding live leaf slots in
/// lexicographic term order.
pub struct TermIter<'a> {
    arena: &'a TrieArena,
    stack: Vec<OutEdgeIter<'a>>,
    next: Option<u64>,
}

impl<'a> TermIter<'a> {
    pub fn from_scope(arena: &'a TrieArena, scope: Scope) -> Self {
        let mut iter = TermIter { arena, stack: Vec::new(), next: None };
        match scope {
            Scope::Empty => {}
            Scope::Leaf(slot) => iter.next = Some(slot),
            Scope::Subtree(node) => {
                iter.stack.push(OutEdgeIter::new(arena, node));
                iter.advance();
            }
        }
        iter
    }

    fn advance(&mut self) {
        self.next = None;
        while let Some(top) = self.stack.last_mut() {
            if !top.has_next() {
                self.stack.pop();
                continue;
            }
            let edge_id = top.read();
            top.proceed();
            let edge = self.arena.edge(edge_id);
            if edge.out_is_leaf {
                if self.arena.leaf(edge.out_node).occurrences > 0 {
                    self.next = Some(edge.out_node);
                    return;
                }
            } else {
                self.stack.push(OutEdgeIter::new(self.arena, edge.out_node));
            }
        }
    }
}

impl Iterator for TermIter<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let slot = self.next.take()?;
        if !self.stack.is_empty() {
            self.advance();
        }
        Some(slot)
    }
}

/// Lazy (term, occurrences) stream for every stored term with a given
/// prefix, in lexicographic order.
pub struct PrefixTerms<'a> {
    trie: &'a Trie,
    inner: TermIter<'a>,
}

impl<'a> PrefixTerms<'a> {
    pub fn new(trie: &'a Trie, prefix: &str) -> Self {
        let scope = trie.scope(prefix.as_bytes());
        PrefixTerms {
            trie,
            inner: TermIter::from_scope(trie.arena(), scope),
        }
    }
}

impl Iterator for PrefixTerms<'_> {
    type Item = (String, u64);

    fn next(&mut self) -> Option<(String, u64)> {
        let slot = self.inner.next()?;
        let occurrences = self.trie.arena().leaf(slot).occurrences;
        Some((self.trie.string_at_slot(slot), occurrences))
    }
}
