use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::TripleOrder;
use crate::mmap::U64Array;

pub fn primary_ids_path(dir: &Path, order: TripleOrder) -> PathBuf {
    dir.join(format!("{}.primary-ids", order.primary_position().as_str()))
}

pub fn secondary_ids_path(dir: &Path, order: TripleOrder) -> PathBuf {
    dir.join(format!("{}.secondary-ids", order.name()))
}

pub fn secondary_refs_path(dir: &Path, order: TripleOrder) -> PathBuf {
    dir.join(format!("{}.secondary-refs", order.name()))
}

pub fn tertiary_ids_path(dir: &Path, order: TripleOrder) -> PathBuf {
    dir.join(format!("{}.tertiary-ids", order.name()))
}

pub fn tertiary_refs_path(dir: &Path, order: TripleOrder) -> PathBuf {
    dir.join(format!("{}.tertiary-refs", order.name()))
}

/// The five mmapped arrays of one order. `refs[i]` is the start of group
/// i's segment; the segment ends where group i+1 starts, or at the array
/// end for the last group.
#[derive(Clone)]
pub struct CsrArrays {
    pub primary_ids: Arc<U64Array>,
    pub secondary_ids: Arc<U64Array>,
    pub secondary_refs: Arc<U64Array>,
    pub tertiary_ids: Arc<U64Array>,
    pub tertiary_refs: Arc<U64Array>,
}

impl CsrArrays {
    pub fn secondary_range(&self, p_idx: usize) -> (usize, usize) {
        let start = self.secondary_refs.get(p_idx) as usize;
        let end = if p_idx + 1 < self.secondary_refs.len() {
            self.secondary_refs.get(p_idx + 1) as usize
        } else {
            self.secondary_ids.len()
        };
        (start, end)
    }

    pub fn tertiary_range(&self, s_idx: usize) -> (usize, usize) {
        let start = self.tertiary_refs.get(s_idx) as usize;
        let end = if s_idx + 1 < self.tertiary_refs.len() {
            self.tertiary_refs.get(s_idx + 1) as usize
        } else {
            self.tertiary_ids.len()
        };
        (start, end)
    }
}

/// Lazily mmapped order files of one store directory. Each order loads at
/// most once; a missing file is a NotLoaded error, never an empty result.
pub struct OrderFiles {
    dir: PathBuf,
    loaded: RwLock<HashMap<TripleOrder, CsrArrays>>,
}

impl OrderFiles {
    pub fn new(dir: PathBuf) -> Self {
        OrderFiles { dir, loaded: RwLock::new(HashMap::new()) }
    }

    pub fn arrays(&self, order: TripleOrder) -> Result<CsrArrays> {
        if let Some(arrays) = self.loaded.read().get(&order) {
            return Ok(arrays.clone());
        }
        let arrays = CsrArrays {
            primary_ids: Arc::new(open_required(&primary_ids_path(&self.dir, order))?),
            secondary_ids: Arc::new(open_required(&secondary_ids_path(&self.dir, order))?),
            secondary_refs: Arc::new(open_required(&secondary_refs_path(&self.dir, order))?),
            tertiary_ids: Arc::new(open_required(&tertiary_ids_path(&self.dir, order))?),
            tertiary_refs: Arc::new(open_required(&tertiary_refs_path(&self.dir, order))?),
        };
        debug!(order = order.name(), rows = arrays.tertiary_ids.len(), "loaded order");
        let mut loaded = self.loaded.write();
        Ok(loaded.entry(order).or_insert(arrays).clone())
    }
}

fn open_required(path: &Path) -> Result<U64Array> {
    U64Array::open(path).map_err(|e| match e.kind {
        ErrorKind::Io => Error::new(
            ErrorKind::NotLoaded,
            format!("required file {} cannot be loaded: {}", path.display(), e.context),
        ),
        _ => e,
    })
}
