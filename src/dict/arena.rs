use std::collections::HashMap;
use std::io::Write;

use tracing::debug;

use crate::core::error::{Error, ErrorKind, Result};
use crate::dict::term_iter::OutEdgeIter;
use crate::mmap::MmapFile;

/// Trie leaf: one stored term. `occurrences == 0` marks a tombstone.
#[derive(Debug, Clone, Copy)]
pub struct LeafNode {
    pub in_edge: u64,
    pub occurrences: u64,
}

/// Trie internal node. `num_out_edges == 0` marks a tombstone;
/// `out_edges_offset` indexes the persisted out-edge-id array and is only
/// meaningful for mmapped nodes.
#[derive(Debug, Clone, Copy)]
pub struct InternalNode {
    pub in_edge: u64,
    pub out_edges_offset: u64,
    pub num_out_edges: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub label_offset: u64,
    pub label_len: u64,
    pub in_node: u64,
    pub out_node: u64,
    pub out_is_leaf: bool,
    pub deleted: bool,
}

/// One gap in the exposed id space. `start` is the compacted leaf slot at
/// which the gap applies, `cumulative` the total gap size up to and
/// including this hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hole {
    pub start: u64,
    pub size: u64,
    pub cumulative: u64,
}

const HEADER_LEN: usize = 5 * 8;
const EDGE_REC: usize = 5 * 8;
const LEAF_REC: usize = 2 * 8;
const INTERNAL_REC: usize = 3 * 8;
const HOLE_REC: usize = 3 * 8;

/// Decoded section offsets over one mmapped dictionary file.
struct BaseView {
    map: MmapFile,
    labels_at: usize,
    edges_at: usize,
    num_edges: usize,
    leaves_at: usize,
    num_leaves: usize,
    out_edges_at: usize,
    internals_at: usize,
    num_internals: usize,
    holes: Vec<Hole>,
}

impl BaseView {
    fn decode(map: MmapFile) -> Result<Self> {
        let bytes = map.data();
        if bytes.len() < HEADER_LEN {
            return Err(Error::new(
                ErrorKind::Parse,
                format!("dictionary file too short: {} bytes", bytes.len()),
            ));
        }
        let num_leaves = u64_at(bytes, 0) as usize;
        let num_internals = u64_at(bytes, 8) as usize;
        let num_edges = u64_at(bytes, 16) as usize;
        let num_label_bytes = u64_at(bytes, 24) as usize;
        let num_holes = u64_at(bytes, 32) as usize;

        let labels_at = HEADER_LEN;
        let edges_at = labels_at + num_label_bytes;
        let leaves_at = edges_at + num_edges * EDGE_REC;
        let holes_at = leaves_at + num_leaves * LEAF_REC;
        let out_edges_at = holes_at + num_holes * HOLE_REC;
        let internals_at = out_edges_at + num_edges * 8;
        let expected = internals_at + num_internals * INTERNAL_REC;
        if bytes.len() != expected {
            return Err(Error::new(
                ErrorKind::Parse,
                format!(
                    "dictionary file length {} does not match header ({} expected)",
                    bytes.len(),
                    expected
                ),
            ));
        }

        let mut holes = Vec::with_capacity(num_holes);
        for i in 0..num_holes {
            let at = holes_at + i * HOLE_REC;
            holes.push(Hole {
                start: u64_at(bytes, at),
                size: u64_at(bytes, at + 8),
                cumulative: u64_at(bytes, at + 16),
            });
        }

        Ok(BaseView {
            map,
            labels_at,
            edges_at,
            num_edges,
            leaves_at,
            num_leaves,
            out_edges_at,
            internals_at,
            num_internals,
            holes,
        })
    }

    fn leaf(&self, slot: usize) -> LeafNode {
        let at = self.leaves_at + slot * LEAF_REC;
        let bytes = self.map.data();
        LeafNode {
            in_edge: u64_at(bytes, at),
            occurrences: u64_at(bytes, at + 8),
        }
    }

    fn internal(&self, slot: usize) -> InternalNode {
        let at = self.internals_at + slot * INTERNAL_REC;
        let bytes = self.map.data();
        InternalNode {
            in_edge: u64_at(bytes, at),
            out_edges_offset: u64_at(bytes, at + 8),
            num_out_edges: u64_at(bytes, at + 16),
        }
    }

    fn edge(&self, slot: usize) -> Edge {
        let at = self.edges_at + slot * EDGE_REC;
        let bytes = self.map.data();
        Edge {
            label_offset: u64_at(bytes, at),
            label_len: u64_at(bytes, at + 8),
            in_node: u64_at(bytes, at + 16),
            out_node: u64_at(bytes, at + 24),
            out_is_leaf: u64_at(bytes, at + 32) != 0,
            deleted: false,
        }
    }

    fn label(&self, edge: &Edge) -> &[u8] {
        let at = self.labels_at + edge.label_offset as usize;
        &self.map.data()[at..at + edge.label_len as usize]
    }

    fn out_edge_id(&self, index: usize) -> u64 {
        u64_at(self.map.data(), self.out_edges_at + index * 8)
    }
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

fn put_u64<W: Write>(out: &mut W, value: u64) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Compacted id for `id` after removing the sorted tombstoned slots.
fn compacted(sorted_deleted: &[u64], id: u64) -> u64 {
    id - sorted_deleted.partition_point(|&d| d < id) as u64
}

/// Slot arena backing one radix trie: an immutable mmapped base plus
/// in-memory deltas. Mutations of base records go through copy-on-write
/// overrides; new records append to the delta vectors. All handles are
/// slot indexes, base slots first.
pub struct TrieArena {
    base: Option<BaseView>,

    new_leaves: Vec<LeafNode>,
    new_internals: Vec<InternalNode>,
    new_edges: Vec<Edge>,
    new_labels: Vec<Vec<u8>>,

    leaf_overrides: HashMap<u64, LeafNode>,
    internal_overrides: HashMap<u64, InternalNode>,
    edge_overrides: HashMap<u64, Edge>,

    /// Out-edges added this session, per internal node, ordered by the
    /// first label byte.
    new_out_edges: HashMap<u64, Vec<u64>>,

    live_leaves: u64,
}

impl TrieArena {
    pub fn new() -> Self {
        TrieArena {
            base: None,
            new_leaves: Vec::new(),
            new_internals: Vec::new(),
            new_edges: Vec::new(),
            new_labels: Vec::new(),
            leaf_overrides: HashMap::new(),
            internal_overrides: HashMap::new(),
            edge_overrides: HashMap::new(),
            new_out_edges: HashMap::new(),
            live_leaves: 0,
        }
    }

    pub fn load(map: MmapFile) -> Result<Self> {
        let base = BaseView::decode(map)?;
        let live_leaves = base.num_leaves as u64;
        let mut arena = TrieArena::new();
        arena.base = Some(base);
        arena.live_leaves = live_leaves;
        Ok(arena)
    }

    pub fn live_leaves(&self) -> u64 {
        self.live_leaves
    }

    pub fn base_leaf_slots(&self) -> u64 {
        self.base.as_ref().map_or(0, |b| b.num_leaves as u64)
    }

    pub fn total_leaf_slots(&self) -> u64 {
        self.base_leaf_slots() + self.new_leaves.len() as u64
    }

    pub fn base_internal_slots(&self) -> u64 {
        self.base.as_ref().map_or(0, |b| b.num_internals as u64)
    }

    pub fn total_internal_slots(&self) -> u64 {
        self.base_internal_slots() + self.new_internals.len() as u64
    }

    pub fn base_edge_slots(&self) -> u64 {
        self.base.as_ref().map_or(0, |b| b.num_edges as u64)
    }

    pub fn total_edge_slots(&self) -> u64 {
        self.base_edge_slots() + self.new_edges.len() as u64
    }

    fn base_holes(&self) -> &[Hole] {
        self.base.as_ref().map_or(&[], |b| b.holes.as_slice())
    }

    // --- record routing -------------------------------------------------

    pub fn leaf(&self, id: u64) -> LeafNode {
        if let Some(leaf) = self.leaf_overrides.get(&id) {
            return *leaf;
        }
        let base = self.base_leaf_slots();
        if id < base {
            if let Some(b) = &self.base {
                return b.leaf(id as usize);
            }
        }
        self.new_leaves[(id - base) as usize]
    }

    pub fn leaf_mut(&mut self, id: u64) -> &mut LeafNode {
        let base = self.base_leaf_slots();
        if id < base {
            let current = self.leaf(id);
            return self.leaf_overrides.entry(id).or_insert(current);
        }
        &mut self.new_leaves[(id - base) as usize]
    }

    pub fn internal(&self, id: u64) -> InternalNode {
        if let Some(node) = self.internal_overrides.get(&id) {
            return *node;
        }
        let base = self.base_internal_slots();
        if id < base {
            if let Some(b) = &self.base {
                return b.internal(id as usize);
            }
        }
        self.new_internals[(id - base) as usize]
    }

    pub fn internal_mut(&mut self, id: u64) -> &mut InternalNode {
        let base = self.base_internal_slots();
        if id < base {
            let current = self.internal(id);
            return self.internal_overrides.entry(id).or_insert(current);
        }
        &mut self.new_internals[(id - base) as usize]
    }

    pub fn edge(&self, id: u64) -> Edge {
        if let Some(edge) = self.edge_overrides.get(&id) {
            return *edge;
        }
        let base = self.base_edge_slots();
        if id < base {
            if let Some(b) = &self.base {
                return b.edge(id as usize);
            }
        }
        self.new_edges[(id - base) as usize]
    }

    pub fn edge_mut(&mut self, id: u64) -> &mut Edge {
        let base = self.base_edge_slots();
        if id < base {
            let current = self.edge(id);
            return self.edge_overrides.entry(id).or_insert(current);
        }
        &mut self.new_edges[(id - base) as usize]
    }

    pub fn label(&self, edge_id: u64) -> &[u8] {
        let edge = self.edge(edge_id);
        let base = self.base_edge_slots();
        if edge_id < base {
            if let Some(b) = &self.base {
                return b.label(&edge);
            }
        }
        &self.new_labels[(edge_id - base) as usize][..edge.label_len as usize]
    }

    pub fn first_label_byte(&self, edge_id: u64) -> u8 {
        self.label(edge_id)[0]
    }

    // --- construction ---------------------------------------------------

    pub fn add_leaf(&mut self, in_edge: u64, occurrences: u64) -> u64 {
        let id = self.total_leaf_slots();
        self.new_leaves.push(LeafNode { in_edge, occurrences });
        self.live_leaves += 1;
        id
    }

    pub fn add_internal(&mut self, in_edge: u64) -> u64 {
        let id = self.total_internal_slots();
        self.new_internals.push(InternalNode {
            in_edge,
            out_edges_offset: 0,
            num_out_edges: 0,
        });
        id
    }

    pub fn add_edge(&mut self, label: &[u8], out_is_leaf: bool, in_node: u64, out_node: u64) -> u64 {
        let id = self.total_edge_slots();
        self.new_edges.push(Edge {
            label_offset: 0,
            label_len: label.len() as u64,
            in_node,
            out_node,
            out_is_leaf,
            deleted: false,
        });
        self.new_labels.push(label.to_vec());
        id
    }

    pub fn remove_leaf(&mut self, id: u64) {
        let leaf = self.leaf_mut(id);
        leaf.occurrences = 0;
        self.live_leaves -= 1;
    }

    pub fn remove_internal(&mut self, id: u64) {
        self.internal_mut(id).num_out_edges = 0;
    }

    pub fn remove_edge(&mut self, id: u64) {
        self.edge_mut(id).deleted = true;
    }

    /// Truncate an edge label to its first `new_len` bytes (edge split).
    pub fn shrink_label(&mut self, edge_id: u64, new_len: u64) {
        self.edge_mut(edge_id).label_len = new_len;
    }

    pub fn add_out_edge(&mut self, node: u64, edge: u64) {
        let byte = self.first_label_byte(edge);
        let pos = {
            let existing: &[u64] = self
                .new_out_edges
                .get(&node)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            existing
                .iter()
                .position(|&e| self.first_label_byte(e) > byte)
                .unwrap_or(existing.len())
        };
        self.new_out_edges.entry(node).or_default().insert(pos, edge);
        self.internal_mut(node).num_out_edges += 1;
    }

    pub fn remove_out_edge(&mut self, node: u64, edge: u64) {
        if let Some(edges) = self.new_out_edges.get_mut(&node) {
            if let Some(i) = edges.iter().position(|&e| e == edge) {
                edges.remove(i);
            }
        }
        self.internal_mut(node).num_out_edges -= 1;
    }

    pub fn delta_out_edges(&self, node: u64) -> &[u64] {
        self.new_out_edges
            .get(&node)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Range into the persisted out-edge-id array for a base node.
    /// Empty for delta nodes.
    pub fn base_out_edge_range(&self, node: u64) -> (usize, usize) {
        let Some(base) = &self.base else { return (0, 0) };
        if node >= base.num_internals as u64 {
            return (0, 0);
        }
        let start = base.internal(node as usize).out_edges_offset as usize;
        let end = if (node as usize) + 1 < base.num_internals {
            base.internal(node as usize + 1).out_edges_offset as usize
        } else {
            base.num_edges
        };
        (start, end)
    }

    pub fn out_edge_id_at(&self, index: usize) -> u64 {
        match &self.base {
            Some(b) => b.out_edge_id(index),
            None => 0,
        }
    }

    // --- exposed id mapping ----------------------------------------------

    /// Exposed ids stay stable across compactions via the hole list
    /// inherited from the base file. Slots appended this session land
    /// past every hole, so the same formula covers them.
    pub fn internal_to_exposed(&self, slot: u64) -> u64 {
        let holes = self.base_holes();
        let i = holes.partition_point(|h| h.start <= slot);
        let cum = if i == 0 { 0 } else { holes[i - 1].cumulative };
        slot + cum + 1
    }

    pub fn exposed_to_internal(&self, exposed: u64) -> Result<u64> {
        if exposed == 0 {
            return Err(Error::new(
                ErrorKind::NotFound,
                "0 is not a term id".to_string(),
            ));
        }
        let holes = self.base_holes();
        let i = holes.partition_point(|h| h.start + h.cumulative + 1 <= exposed);
        let cum = if i == 0 { 0 } else { holes[i - 1].cumulative };
        let slot = exposed - cum - 1;
        if slot >= self.total_leaf_slots() || self.internal_to_exposed(slot) != exposed {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("no term with id {}", exposed),
            ));
        }
        Ok(slot)
    }

    // --- persistence ------------------------------------------------------

    /// Write the compacted trie. Tombstoned slots disappear; surviving
    /// cross-references are renumbered; the hole list is recomputed so
    /// exposed ids of surviving leaves are unchanged.
    pub fn save<W: Write>(&self, out: &mut W) -> Result<()> {
        let total_leaves = self.total_leaf_slots();
        let total_internals = self.total_internal_slots();
        let total_edges = self.total_edge_slots();

        let mut deleted_leaves = Vec::new();
        for slot in 0..total_leaves {
            if self.leaf(slot).occurrences == 0 {
                deleted_leaves.push(slot);
            }
        }
        let mut deleted_internals = Vec::new();
        for slot in 0..total_internals {
            if self.internal(slot).num_out_edges == 0 {
                deleted_internals.push(slot);
            }
        }
        let mut deleted_edges = Vec::new();
        let mut live_label_bytes = 0u64;
        for slot in 0..total_edges {
            let edge = self.edge(slot);
            if edge.deleted {
                deleted_edges.push(slot);
            } else {
                live_label_bytes += edge.label_len;
            }
        }

        let live_leaves = total_leaves - deleted_leaves.len() as u64;
        let live_internals = total_internals - deleted_internals.len() as u64;
        let live_edges = total_edges - deleted_edges.len() as u64;
        debug_assert_eq!(live_leaves, self.live_leaves);

        let holes = self.compute_holes(total_leaves);

        debug!(
            leaves = live_leaves,
            internals = live_internals,
            edges = live_edges,
            holes = holes.len(),
            "saving dictionary"
        );

        put_u64(out, live_leaves)?;
        put_u64(out, live_internals)?;
        put_u64(out, live_edges)?;
        put_u64(out, live_label_bytes)?;
        put_u64(out, holes.len() as u64)?;

        // labels
        for slot in 0..total_edges {
            if !self.edge(slot).deleted {
                out.write_all(self.label(slot))?;
            }
        }

        // edge records, labels renumbered sequentially
        let mut label_offset = 0u64;
        for slot in 0..total_edges {
            let edge = self.edge(slot);
            if edge.deleted {
                continue;
            }
            let out_node = if edge.out_is_leaf {
                compacted(&deleted_leaves, edge.out_node)
            } else {
                compacted(&deleted_internals, edge.out_node)
            };
            put_u64(out, label_offset)?;
            put_u64(out, edge.label_len)?;
            put_u64(out, compacted(&deleted_internals, edge.in_node))?;
            put_u64(out, out_node)?;
            put_u64(out, edge.out_is_leaf as u64)?;
            label_offset += edge.label_len;
        }

        // leaf records
        for slot in 0..total_leaves {
            let leaf = self.leaf(slot);
            if leaf.occurrences == 0 {
                continue;
            }
            put_u64(out, compacted(&deleted_edges, leaf.in_edge))?;
            put_u64(out, leaf.occurrences)?;
        }

        // holes
        for hole in &holes {
            put_u64(out, hole.start)?;
            put_u64(out, hole.size)?;
            put_u64(out, hole.cumulative)?;
        }

        // out-edge ids grouped per live internal node, then the internal
        // records pointing into that array
        let mut internal_records = Vec::with_capacity(live_internals as usize);
        let mut out_edge_count = 0u64;
        for slot in 0..total_internals {
            let node = self.internal(slot);
            if node.num_out_edges == 0 {
                continue;
            }
            let offset = out_edge_count;
            let mut written = 0u64;
            let mut iter = OutEdgeIter::new(self, slot);
            while iter.has_next() {
                let edge_id = iter.read();
                put_u64(out, compacted(&deleted_edges, edge_id))?;
                written += 1;
                iter.proceed();
            }
            if written != node.num_out_edges {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    format!(
                        "node {}: {} live out-edges but count says {}",
                        slot, written, node.num_out_edges
                    ),
                ));
            }
            out_edge_count += written;
            let in_edge = if slot == 0 {
                0
            } else {
                compacted(&deleted_edges, node.in_edge)
            };
            internal_records.push((in_edge, offset, written));
        }
        if out_edge_count != live_edges {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!(
                    "{} out-edge ids written for {} live edges",
                    out_edge_count, live_edges
                ),
            ));
        }

        for (in_edge, offset, count) in internal_records {
            put_u64(out, in_edge)?;
            put_u64(out, offset)?;
            put_u64(out, count)?;
        }

        Ok(())
    }

    /// Walk live leaves in slot order, recording every gap in the exposed
    /// id sequence as a hole positioned at the compacted slot where it
    /// applies. Covers inherited holes, this session's tombstones, and
    /// trailing deletions in one pass.
    fn compute_holes(&self, total_leaves: u64) -> Vec<Hole> {
        let mut holes: Vec<Hole> = Vec::new();
        let mut out_slot = 0u64;
        let mut expected = 1u64;
        for slot in 0..total_leaves {
            if self.leaf(slot).occurrences == 0 {
                continue;
            }
            let exposed = self.internal_to_exposed(slot);
            if exposed > expected {
                let size = exposed - expected;
                let cumulative = holes.last().map_or(0, |h| h.cumulative) + size;
                holes.push(Hole { start: out_slot, size, cumulative });
            }
            expected = exposed + 1;
            out_slot += 1;
        }
        if total_leaves > 0 {
            let last_exposed = self.internal_to_exposed(total_leaves - 1);
            if expected <= last_exposed {
                let size = last_exposed - expected + 1;
                let cumulative = holes.last().map_or(0, |h| h.cumulative) + size;
                holes.push(Hole { start: out_slot, size, cumulative });
            }
        }
        holes
    }
}
