//! certrail-kv: Key-Value storage for challenge tokens and the certificate cache
//!
//! Provides the `KvStore` seam with a Redis-backed implementation and an
//! in-memory one for single-process deployments and tests.

pub mod error;
pub mod services;

pub use error::KvError;
pub use services::{InMemoryKvStore, KvStore, RedisKvStore};
