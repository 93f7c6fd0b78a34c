pub mod engine;
pub mod memory;

pub use engine::EntityStore;
pub use memory::InMemoryEntityStore;
