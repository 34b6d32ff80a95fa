//! Durable-store adapters

mod memory;

pub use memory::InMemoryDurableStore;
