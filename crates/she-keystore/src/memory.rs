use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{KeyId, KeystoreError, SheKeystore, StoredKey};

/// An in-memory reference implementation of [`SheKeystore`], backed by a
/// `parking_lot` mutex the same way the teacher guards shared tables in its
/// safe typed layer. Suitable for tests and for `she-harness`; a real HSM
/// deployment would back this trait with actual NVM instead.
#[derive(Default)]
pub struct MemoryKeystore {
    objects: Mutex<HashMap<u32, StoredKey>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SheKeystore for MemoryKeystore {
    fn read_key(&self, id: KeyId) -> Result<StoredKey, KeystoreError> {
        self.objects
            .lock()
            .get(&id.0)
            .copied()
            .ok_or(KeystoreError::NotFound)
    }

    fn add_object(&mut self, id: KeyId, key: StoredKey) -> Result<(), KeystoreError> {
        self.objects.lock().insert(id.0, key);
        Ok(())
    }

    fn cache_key(&mut self, id: KeyId, key: StoredKey) -> Result<(), KeystoreError> {
        self.objects.lock().insert(id.0, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SheMetadata;

    #[test]
    fn read_after_write_round_trips() {
        let mut store = MemoryKeystore::new();
        let id = KeyId::new(1, crate::SECRET_KEY_ID);
        let key = StoredKey::new(SheMetadata::new(0, 0), [7u8; crate::KEY_SIZE]);
        store.add_object(id, key).unwrap();
        assert_eq!(store.read_key(id).unwrap(), key);
    }

    #[test]
    fn missing_key_is_not_found() {
        let store = MemoryKeystore::new();
        let id = KeyId::new(1, crate::PRNG_SEED_ID);
        assert_eq!(store.read_key(id).unwrap_err(), KeystoreError::NotFound);
    }
}
