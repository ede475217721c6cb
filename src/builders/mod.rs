//! Builders to construct bucket inputs from configuration.

pub mod input_builder;

pub use input_builder::build_inputs;
