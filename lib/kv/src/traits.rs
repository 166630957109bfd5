use crate::error::KVError;

/// KVStore provides a key-value storage interface.
///
/// Keys follow a namespaced convention: `counter:incoming`,
/// `config:mailtype:UM.01`, etc. Implementations may expose a
/// read-only layer; plain DB-backed stores never do.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a key-value pair. Returns KVError::ReadOnly if the key is in the read-only layer.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete a key. Returns KVError::ReadOnly if the key is in the read-only layer.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Scan all keys matching a prefix. Returns sorted (key, value) pairs.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;

    /// Check whether a key is in the read-only layer.
    fn is_readonly(&self, key: &str) -> bool;
}
