//! Compact, updatable on-disk index for RDF triple sets.
//!
//! A store directory holds three term dictionaries (radix tries with
//! stable dense ids) and five sorted triple orders in CSR form:
//!
//! ```text
//!               +-----------------------------------------+
//!               |                  Store                  |
//!               +---------+---------------+---------------+
//!                         |               |
//!          +--------------+--+        +---+----------------+
//!          | dict            |        | triples            |
//!          | trie over an    |        | CSR arrays, one    |
//!          | mmapped arena   |        | set per order      |
//!          | + session delta |        | (SPO SOP PSO POS   |
//!          +--------------+--+        |  OSP), mmapped     |
//!                         |           +---+----------------+
//!                         |               |
//!                   +-----+---------------+-----+
//!                   |        mmap / core        |
//!                   +---------------------------+
//! ```
//!
//! `compose` combines stores and text dumps by multiset union and
//! difference, unifying dictionaries and merging the sorted walks.

pub mod compose;
pub mod core;
pub mod dict;
pub mod mmap;
pub mod rdf;
pub mod store;
pub mod triples;
