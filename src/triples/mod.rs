pub mod csr;
pub mod cursor;
pub mod log;

pub use cursor::TripleCursor;
pub use log::{CsrWriter, TripleLog};
