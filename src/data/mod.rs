//! Sample data: file reading, splitting and device batching.

mod reader;
mod samples;

pub use reader::{parse_sample_matrix, read_sample_matrix, SampleFileError, SampleMatrix};
pub use samples::{Batch, SampleSet};
