//! Descriptor store adapters.

pub mod memory;
pub mod yaml;

pub use memory::MemoryDescriptorStore;
pub use yaml::YamlDescriptorStore;
