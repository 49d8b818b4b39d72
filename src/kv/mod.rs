//! Key-value read capability behind variable reads
//!
//! Variables live in an external store; this crate only reads them. Writes
//! happen downstream, driven by the `var.*` events the gateway publishes.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryKeyValueStore;
pub use self::redis::RedisKeyValueStore;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Read access to hub-scoped variables
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Members of a set variable (sorted; empty when absent)
    async fn get_set_as_string_slice(&self, key: &str, hub: &str) -> Result<Vec<String>>;

    /// Entries of a map variable (empty when absent)
    async fn get_map(&self, key: &str, hub: &str) -> Result<BTreeMap<String, String>>;

    /// Scalar variable value (`None` when absent)
    async fn get_string(&self, key: &str, hub: &str) -> Result<Option<String>>;
}

/// Storage key for a hub variable
pub fn variable_key(hub: &str, key: &str) -> String {
    format!("hubs:{hub}:variables:{key}")
}
