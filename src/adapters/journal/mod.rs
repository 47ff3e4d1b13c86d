//! Journal store adapters.

pub mod file;
pub mod memory;

pub use file::FileJournalStore;
pub use memory::MemoryJournalStore;
