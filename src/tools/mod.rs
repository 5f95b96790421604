//! Maintenance tools that prepare the archive folder before a page is generated

pub mod easy;
pub mod encoding;
pub mod pdf;
pub mod recordings;
