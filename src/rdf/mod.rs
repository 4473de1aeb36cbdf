pub mod ntriples;

pub use ntriples::TextFormat;
