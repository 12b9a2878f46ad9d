pub mod memory;

pub use memory::{Collection, MemoryStore, StoreEvent, StoreTxn};
