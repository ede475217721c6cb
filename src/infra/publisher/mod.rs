//! Publisher adapters.

pub mod memory;

pub use memory::InMemoryPublisher;
