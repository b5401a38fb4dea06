//! KV store implementations

mod kv_service;
mod memory;

pub use kv_service::{KvStore, RedisKvStore};
pub use memory::InMemoryKvStore;
