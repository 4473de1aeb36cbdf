pub mod arena;
pub mod dictionary;
pub mod term_iter;
pub mod trie;

pub use dictionary::{DictSet, Dictionary};
