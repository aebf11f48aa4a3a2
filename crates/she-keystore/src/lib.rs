//! Typed SHE key identifiers and metadata, and the adapter contract a
//! protocol engine uses to read and write key objects in the HSM's object
//! store (NVM for persistent slots, a volatile cache for the RAM key).

mod error;
mod key;
mod memory;
mod metadata;

pub use error::KeystoreError;
pub use key::{
    KeyId, BOOT_MAC_ID, BOOT_MAC_KEY_ID, KEY_SIZE, KEY_TYPE_SHE, PRNG_SEED_ID, RAM_KEY_ID,
    SECRET_KEY_ID, SLOT_MASK, USER_KEY_IDS,
};
pub use memory::MemoryKeystore;
pub use metadata::{SheMetadata, FLAG_WILDCARD, FLAG_WRITE_PROTECT};

/// A key object as stored by the keystore: fixed-size key material plus its
/// SHE metadata (flags and anti-rollback counter).
///
/// `key_len` mirrors the original's `keySz` out-parameter from `ReadKey`: the
/// length a caller should actually use out of `bytes`, which `new` always
/// sets to `KEY_SIZE`. `with_len` exists so a corrupt or truncated slot can be
/// modeled (and rejected by a cipher-setup check) without making every other
/// call site carry a length argument it never varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredKey {
    pub meta: SheMetadata,
    pub bytes: [u8; KEY_SIZE],
    pub key_len: usize,
}

impl StoredKey {
    pub fn new(meta: SheMetadata, bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            meta,
            bytes,
            key_len: KEY_SIZE,
        }
    }

    pub fn with_len(meta: SheMetadata, bytes: [u8; KEY_SIZE], key_len: usize) -> Self {
        Self {
            meta,
            bytes,
            key_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_reports_the_full_key_size() {
        let key = StoredKey::new(SheMetadata::default(), [0u8; KEY_SIZE]);
        assert_eq!(key.key_len, KEY_SIZE);
    }

    #[test]
    fn with_len_can_report_a_truncated_size() {
        let key = StoredKey::with_len(SheMetadata::default(), [0u8; KEY_SIZE], 8);
        assert_eq!(key.key_len, 8);
    }
}

/// The adapter contract a protocol engine uses to reach the underlying key
/// object store. `add_object` persists (NVM); `cache_key` writes to a
/// volatile cache only — the distinction the original makes for the RAM key,
/// which is never written to NVM.
pub trait SheKeystore {
    fn read_key(&self, id: KeyId) -> Result<StoredKey, KeystoreError>;
    fn add_object(&mut self, id: KeyId, key: StoredKey) -> Result<(), KeystoreError>;
    fn cache_key(&mut self, id: KeyId, key: StoredKey) -> Result<(), KeystoreError>;
}
