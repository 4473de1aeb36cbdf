use std::cmp::Ordering;
use std::io::Write;

use crate::core::error::{Error, ErrorKind, Result};
use crate::dict::arena::TrieArena;
use crate::dict::term_iter::OutEdgeIter;
use crate::mmap::MmapFile;

/// Where a prefix walk landed.
pub enum Scope {
    /// No stored term starts with the prefix.
    Empty,
    /// Exactly one term matches; the leaf's slot.
    Leaf(u64),
    /// Subtree rooted at this internal node holds every match.
    Subtree(u64),
}

/// How an edge label relates to the remaining key bytes.
enum LabelMatch {
    /// First bytes differ.
    Disjoint { label_after_key: bool },
    /// Label and key remainder are identical.
    Equal,
    /// The whole label matched and key bytes remain.
    LabelIsPrefix { len: usize },
    /// The whole key remainder matched inside the label.
    KeyExhausted,
    /// A proper shared prefix, then a mismatch.
    Shared { len: usize },
}

fn compare_label(label: &[u8], key: &[u8]) -> LabelMatch {
    let mut i = 0;
    while i < label.len() && i < key.len() && label[i] == key[i] {
        i += 1;
    }
    if i == 0 {
        return LabelMatch::Disjoint { label_after_key: label[0] > key[0] };
    }
    match (i == label.len(), i == key.len()) {
        (true, true) => LabelMatch::Equal,
        (true, false) => LabelMatch::LabelIsPrefix { len: i },
        (false, true) => LabelMatch::KeyExhausted,
        (false, false) => LabelMatch::Shared { len: i },
    }
}

enum Step {
    NewLeaf,
    AtLeaf(u64),
    Descend { next_node: u64, consumed: usize },
    Split { edge_id: u64, shared: usize },
}

/// Radix trie over an arena. Terms are stored with a trailing NUL byte so
/// no stored key is a strict prefix of another; sibling edges are ordered
/// by their first label byte.
pub struct Trie {
    arena: TrieArena,
}

impl Trie {
    pub fn new() -> Self {
        Trie { arena: TrieArena::new() }
    }

    pub fn load(map: MmapFile) -> Result<Self> {
        Ok(Trie { arena: TrieArena::load(map)? })
    }

    pub fn save<W: Write>(&self, out: &mut W) -> Result<()> {
        self.arena.save(out)
    }

    pub fn len(&self) -> u64 {
        self.arena.live_leaves()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.live_leaves() == 0
    }

    pub(crate) fn arena(&self) -> &TrieArena {
        &self.arena
    }

    /// Insert a term or bump its occurrence count. Returns the exposed id
    /// and whether the term is new.
    pub fn insert(&mut self, term: &str, occurrences: u64) -> Result<(u64, bool)> {
        if occurrences == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "occurrence count must be positive".to_string(),
            ));
        }
        if term.len() < 2 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("term '{}' is shorter than 2 bytes", term),
            ));
        }
        let mut key = Vec::with_capacity(term.len() + 1);
        key.extend_from_slice(term.as_bytes());
        key.push(0);

        if self.arena.total_internal_slots() == 0 {
            self.arena.add_internal(0);
        }

        let mut node = 0u64;
        let mut offset = 0usize;
        loop {
            match self.step(node, &key, offset)? {
                Step::NewLeaf => {
                    let slot = self.attach_leaf(node, &key[offset..], occurrences);
                    return Ok((self.arena.internal_to_exposed(slot), true));
                }
                Step::AtLeaf(slot) => {
                    self.arena.leaf_mut(slot).occurrences += occurrences;
                    return Ok((self.arena.internal_to_exposed(slot), false));
                }
                Step::Descend { next_node, consumed } => {
                    node = next_node;
                    offset += consumed;
                }
                Step::Split { edge_id, shared } => {
                    let slot = self.split_edge(edge_id, shared, &key[offset + shared..], occurrences);
                    return Ok((self.arena.internal_to_exposed(slot), true));
                }
            }
        }
    }

    pub fn string_to_id(&self, term: &str) -> Result<u64> {
        if term.len() < 2 || self.arena.total_internal_slots() == 0 {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("term '{}' not present", term),
            ));
        }
        let mut key = Vec::with_capacity(term.len() + 1);
        key.extend_from_slice(term.as_bytes());
        key.push(0);

        let mut node = 0u64;
        let mut offset = 0usize;
        loop {
            match self.step(node, &key, offset)? {
                Step::AtLeaf(slot) => return Ok(self.arena.internal_to_exposed(slot)),
                Step::Descend { next_node, consumed } => {
                    node = next_node;
                    offset += consumed;
                }
                Step::NewLeaf | Step::Split { .. } => {
                    return Err(Error::new(
                        ErrorKind::NotFound,
                        format!("term '{}' not present", term),
                    ));
                }
            }
        }
    }

    pub fn id_to_string(&self, exposed: u64) -> Result<String> {
        let slot = self.arena.exposed_to_internal(exposed)?;
        if self.arena.leaf(slot).occurrences == 0 {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("no term with id {}", exposed),
            ));
        }
        Ok(self.string_at_slot(slot))
    }

    /// Remove `occurrences` from a term. At zero the leaf and its in-edge
    /// are tombstoned, and a parent left with a single out-edge is merged
    /// into its grandparent.
    pub fn remove(&mut self, exposed: u64, occurrences: u64) -> Result<()> {
        let slot = self.arena.exposed_to_internal(exposed)?;
        let leaf = self.arena.leaf(slot);
        if leaf.occurrences == 0 {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("term {} already removed", exposed),
            ));
        }
        if leaf.occurrences > occurrences {
            self.arena.leaf_mut(slot).occurrences -= occurrences;
            return Ok(());
        }

        self.arena.remove_leaf(slot);
        let in_edge = leaf.in_edge;
        let parent = self.arena.edge(in_edge).in_node;
        self.arena.remove_edge(in_edge);
        self.arena.remove_out_edge(parent, in_edge);
        if parent == 0 {
            return Ok(());
        }
        match self.arena.internal(parent).num_out_edges {
            0 => Err(Error::new(
                ErrorKind::InvalidState,
                format!("node {} left without out-edges", parent),
            )),
            1 => self.merge_up(parent),
            _ => Ok(()),
        }
    }

    /// Locate the subtree (or single leaf) holding every term that starts
    /// with `prefix`.
    pub fn scope(&self, prefix: &[u8]) -> Scope {
        if self.arena.total_internal_slots() == 0 || self.arena.live_leaves() == 0 {
            return Scope::Empty;
        }
        if prefix.is_empty() {
            return Scope::Subtree(0);
        }
        let mut node = 0u64;
        let mut offset = 0usize;
        loop {
            let mut chosen = None;
            let mut iter = OutEdgeIter::new(&self.arena, node);
            while iter.has_next() {
                let edge_id = iter.read();
                match compare_label(self.arena.label(edge_id), &prefix[offset..]) {
                    LabelMatch::Disjoint { label_after_key: true } => return Scope::Empty,
                    LabelMatch::Disjoint { label_after_key: false } => iter.proceed(),
                    m => {
                        chosen = Some((edge_id, m));
                        break;
                    }
                }
            }
            let Some((edge_id, m)) = chosen else { return Scope::Empty };
            let edge = self.arena.edge(edge_id);
            match m {
                LabelMatch::Equal | LabelMatch::KeyExhausted => {
                    return if edge.out_is_leaf {
                        Scope::Leaf(edge.out_node)
                    } else {
                        Scope::Subtree(edge.out_node)
                    };
                }
                LabelMatch::LabelIsPrefix { len } => {
                    if edge.out_is_leaf {
                        // leaf labels end at the terminator; nothing
                        // continues past it
                        return Scope::Empty;
                    }
                    node = edge.out_node;
                    offset += len;
                }
                LabelMatch::Shared { .. } => return Scope::Empty,
                LabelMatch::Disjoint { .. } => return Scope::Empty,
            }
        }
    }

    /// Order of two terms of this dictionary without materializing either
    /// string: the first byte of the first divergent edges on the two
    /// root paths decides. Invalid ids are a caller bug and panic; use
    /// `try_compare` for ids read from untrusted input.
    pub fn compare(&self, a: u64, b: u64) -> Ordering {
        match self.try_compare(a, b) {
            Ok(ord) => ord,
            Err(_) => panic!("compare called with an invalid term id ({}, {})", a, b),
        }
    }

    pub fn try_compare(&self, a: u64, b: u64) -> Result<Ordering> {
        if a == b {
            return Ok(Ordering::Equal);
        }
        let pa = self.root_path(a)?;
        let pb = self.root_path(b)?;
        for (ea, eb) in pa.iter().zip(pb.iter()) {
            if ea != eb {
                return Ok(self
                    .arena
                    .first_label_byte(*ea)
                    .cmp(&self.arena.first_label_byte(*eb)));
            }
        }
        Ok(pa.len().cmp(&pb.len()))
    }

    /// Order of a term of this dictionary against a term of another, by
    /// lazily streaming label bytes down both root paths.
    pub fn try_compare_across(&self, a: u64, other: &Trie, b: u64) -> Result<Ordering> {
        if std::ptr::eq(self, other) {
            return self.try_compare(a, b);
        }
        let ia = PathBytes::new(&self.arena, self.root_path(a)?);
        let ib = PathBytes::new(&other.arena, other.root_path(b)?);
        Ok(ia.cmp(ib))
    }

    pub(crate) fn string_at_slot(&self, slot: u64) -> String {
        let mut path = self.path_to_root(self.arena.leaf(slot).in_edge);
        path.reverse();
        let mut bytes = Vec::new();
        for &edge in &path {
            bytes.extend_from_slice(self.arena.label(edge));
        }
        if bytes.last() == Some(&0) {
            bytes.pop();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn step(&self, node: u64, key: &[u8], offset: usize) -> Result<Step> {
        let mut iter = OutEdgeIter::new(&self.arena, node);
        while iter.has_next() {
            let edge_id = iter.read();
            let edge = self.arena.edge(edge_id);
            match compare_label(self.arena.label(edge_id), &key[offset..]) {
                LabelMatch::Disjoint { label_after_key: true } => return Ok(Step::NewLeaf),
                LabelMatch::Disjoint { label_after_key: false } => iter.proceed(),
                LabelMatch::Equal => {
                    if !edge.out_is_leaf {
                        return Err(Error::new(
                            ErrorKind::InvalidState,
                            "terminated key matched an internal edge".to_string(),
                        ));
                    }
                    return Ok(Step::AtLeaf(edge.out_node));
                }
                LabelMatch::LabelIsPrefix { len } => {
                    if edge.out_is_leaf {
                        return Err(Error::new(
                            ErrorKind::InvalidState,
                            "key continues past a leaf label".to_string(),
                        ));
                    }
                    return Ok(Step::Descend { next_node: edge.out_node, consumed: len });
                }
                LabelMatch::KeyExhausted => {
                    return Err(Error::new(
                        ErrorKind::InvalidState,
                        "stored label extends past the key terminator".to_string(),
                    ));
                }
                LabelMatch::Shared { len } => return Ok(Step::Split { edge_id, shared: len }),
            }
        }
        Ok(Step::NewLeaf)
    }

    fn attach_leaf(&mut self, node: u64, remainder: &[u8], occurrences: u64) -> u64 {
        let edge = self.arena.add_edge(remainder, true, node, 0);
        let slot = self.arena.add_leaf(edge, occurrences);
        self.arena.edge_mut(edge).out_node = slot;
        self.arena.add_out_edge(node, edge);
        slot
    }

    /// Cut an edge at `shared` bytes: a new internal node takes the
    /// shrunk edge, the old continuation reattaches below it, and the new
    /// term's remainder becomes a sibling leaf.
    fn split_edge(&mut self, edge_id: u64, shared: usize, remainder: &[u8], occurrences: u64) -> u64 {
        let old = self.arena.edge(edge_id);
        let tail = self.arena.label(edge_id)[shared..].to_vec();
        let mid = self.arena.add_internal(edge_id);
        let cont = self.arena.add_edge(&tail, old.out_is_leaf, mid, old.out_node);
        if old.out_is_leaf {
            self.arena.leaf_mut(old.out_node).in_edge = cont;
        } else {
            self.arena.internal_mut(old.out_node).in_edge = cont;
        }
        self.arena.shrink_label(edge_id, shared as u64);
        {
            let e = self.arena.edge_mut(edge_id);
            e.out_node = mid;
            e.out_is_leaf = false;
        }
        self.arena.add_out_edge(mid, cont);
        self.attach_leaf(mid, remainder, occurrences)
    }

    fn merge_up(&mut self, node: u64) -> Result<()> {
        let survivor = {
            let iter = OutEdgeIter::new(&self.arena, node);
            if !iter.has_next() {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    format!("node {} has no surviving out-edge", node),
                ));
            }
            iter.read()
        };
        let surv_edge = self.arena.edge(survivor);
        let node_in = self.arena.internal(node).in_edge;
        let grand = self.arena.edge(node_in).in_node;

        let mut label = self.arena.label(node_in).to_vec();
        label.extend_from_slice(self.arena.label(survivor));
        let merged = self
            .arena
            .add_edge(&label, surv_edge.out_is_leaf, grand, surv_edge.out_node);
        if surv_edge.out_is_leaf {
            self.arena.leaf_mut(surv_edge.out_node).in_edge = merged;
        } else {
            self.arena.internal_mut(surv_edge.out_node).in_edge = merged;
        }
        self.arena.remove_edge(survivor);
        self.arena.remove_out_edge(node, survivor);
        self.arena.remove_edge(node_in);
        self.arena.add_out_edge(grand, merged);
        self.arena.remove_out_edge(grand, node_in);
        self.arena.remove_internal(node);
        Ok(())
    }

    /// Edge ids from the leaf's in-edge up to the root.
    fn path_to_root(&self, leaf_in_edge: u64) -> Vec<u64> {
        let mut path = vec![leaf_in_edge];
        loop {
            let last = path[path.len() - 1];
            let edge = self.arena.edge(last);
            if edge.in_node == 0 {
                break;
            }
            path.push(self.arena.internal(edge.in_node).in_edge);
        }
        path
    }

    /// Root-to-leaf edge ids for an exposed id.
    fn root_path(&self, exposed: u64) -> Result<Vec<u64>> {
        let slot = self.arena.exposed_to_internal(exposed)?;
        if self.arena.leaf(slot).occurrences == 0 {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("no term with id {}", exposed),
            ));
        }
        let mut path = self.path_to_root(self.arena.leaf(slot).in_edge);
        path.reverse();
        Ok(path)
    }
}

/// Streams the label bytes along a root-to-leaf path, terminator included.
struct PathBytes<'a> {
    arena: &'a TrieArena,
    path: Vec<u64>,
    segment: usize,
    at: usize,
}

impl<'a> PathBytes<'a> {
    fn new(arena: &'a TrieArena, path: Vec<u64>) -> Self {
        PathBytes { arena, path, segment: 0, at: 0 }
    }
}

impl Iterator for PathBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        while self.segment < self.path.len() {
            let label = self.arena.label(self.path[self.segment]);
            if self.at < label.len() {
                let byte = label[self.at];
                self.at += 1;
                return Some(byte);
            }
            self.segment += 1;
            self.at = 0;
        }
        None
    }
}
