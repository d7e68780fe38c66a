pub mod filename;
pub mod input;
pub mod model;

pub use filename::{output_file_name, sanitize_file_stem};
pub use input::{BatchInputError, RowError};
pub use model::{JobFailure, JobItem, JobOptions, JobOutcome, JobResult};
