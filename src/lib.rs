//! bcfmerge: read, merge, and write BCF (BIM Collaboration Format)
//! archives.
//!
//! The crate normalizes the real-world variance of BCF 2.1/3.0 producers
//! (zip vs extracted directory, namespaced vs bare tags, alternate
//! attribute spellings) into one canonical record set, merges N archives
//! into one with deterministic deduplication, and serializes the result
//! back into a structurally valid archive.
//!
//! The three core operations:
//! - [`read_bcf`] — one archive into `(ProjectMeta, Vec<Topic>)`; never
//!   fails, malformed input degrades to empty results.
//! - [`merge_bcfs`] — N archives into one merged archive on disk.
//! - [`write_bcf`] — canonical records into a `.bcfzip` archive.

pub mod error;
pub mod merger;
pub mod model;
pub mod reader;
pub mod writer;
mod xml;

pub use error::{BcfError, BcfResult};
pub use merger::merge_bcfs;
pub use model::{Comment, Payload, ProjectMeta, Topic, Viewpoint};
pub use reader::read_bcf;
pub use writer::write_bcf;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
#[path = "tests/reader_tests.rs"]
mod reader_tests;

#[cfg(test)]
#[path = "tests/merger_tests.rs"]
mod merger_tests;

#[cfg(test)]
#[path = "tests/writer_tests.rs"]
mod writer_tests;

#[cfg(test)]
#[path = "tests/roundtrip_tests.rs"]
mod roundtrip_tests;
