//! Persistence boundary.
//!
//! The planner writes two kinds of documents: `utxo:<txid>:<vout>` JSON
//! snapshots of indexed outputs, and the `alloc:weights` allocation list.
//! Callers supply the backing store; the in-memory map below is the
//! reference implementation and the test double.

use std::collections::BTreeMap;

use anyhow::anyhow;

/// Synchronous byte-oriented key-value contract: each call returns either
/// success or an error, nothing is retried.
pub trait KvStore: Send + Sync {
    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()>;
    fn get(&self, key: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// In-process store backed by a locked map.
#[derive(Default)]
pub struct MemKv {
    kv: parking_lot::RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemKv {
    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()> {
        self.kv.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> anyhow::Result<Vec<u8>> {
        self.kv
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("key not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let kv = MemKv::new();
        kv.put(b"utxo:aa:0", b"{}").unwrap();
        assert_eq!(kv.get(b"utxo:aa:0").unwrap(), b"{}");
    }

    #[test]
    fn missing_key_errors() {
        let kv = MemKv::new();
        assert!(kv.get(b"alloc:weights").is_err());
    }

    #[test]
    fn overwrite_replaces_the_value() {
        let kv = MemKv::new();
        kv.put(b"k", b"one").unwrap();
        kv.put(b"k", b"two").unwrap();
        assert_eq!(kv.get(b"k").unwrap(), b"two");
    }
}
