//! Runtime glue that runs bucket inputs on tokio.

pub mod input;

pub use input::{run_inputs, BucketInput};
