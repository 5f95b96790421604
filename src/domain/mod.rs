pub mod chordpro;
pub mod entry;
pub mod title;
