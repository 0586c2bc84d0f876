//! Schema document IO: the lenient loader and the two-source merger.
pub mod loader;
pub mod merge;
