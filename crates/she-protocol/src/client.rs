//! Client-side message construction for the LOAD_KEY key-update protocol.
//!
//! `wh_server_she.c` only ships the server's verification half; building the
//! M1/M2/M3 triplet a real client sends is the mechanical inverse of that
//! verification, grounded on the same KDF constants and message layout
//! `engine.rs` uses to check them.

use zeroize::Zeroizing;

use crate::crypto::{aes128_cbc_encrypt, aes128_cmac};
use crate::engine::{KEY_UPDATE_ENC_C, KEY_UPDATE_MAC_C};
use crate::error::SheError;
use crate::kdf::aes_mp16;
use crate::wire::{pack_id_byte, M1_SIZE, UID_SIZE};

fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(a.len() + b.len());
    v.extend_from_slice(a);
    v.extend_from_slice(b);
    v
}

/// Build the `(M1, M2, M3)` triplet a client sends to authenticate a
/// `LOAD_KEY` request: `auth_key` is the key currently bound to `auth_id`,
/// `new_key`/`counter`/`flags` describe the key object being installed into
/// `target_slot`.
pub fn build_load_key_messages(
    auth_key: &[u8; 16],
    uid: &[u8; UID_SIZE],
    target_slot: u8,
    auth_id: u8,
    counter: u32,
    flags: u16,
    new_key: &[u8; 16],
) -> Result<([u8; M1_SIZE], [u8; 32], [u8; 16]), SheError> {
    let mut m1 = [0u8; M1_SIZE];
    m1[..UID_SIZE].copy_from_slice(uid);
    m1[M1_SIZE - 1] = pack_id_byte(target_slot, auth_id);

    let k1 = Zeroizing::new(aes_mp16(&concat(auth_key, &KEY_UPDATE_ENC_C))?);
    let mut m2 = [0u8; 32];
    m2[0..4].copy_from_slice(&(counter << 4).to_be_bytes());
    m2[3] = (m2[3] & 0xf0) | (((flags >> 4) & 0x0f) as u8);
    m2[4] = (m2[4] & 0x7f) | (((flags & 0x01) as u8) << 7);
    m2[16..32].copy_from_slice(new_key);
    aes128_cbc_encrypt(&k1, &[0u8; 16], &mut m2);

    let k2 = Zeroizing::new(aes_mp16(&concat(auth_key, &KEY_UPDATE_MAC_C))?);
    let m3 = aes128_cmac(&k2, &concat(&m1, &m2));

    Ok((m1, m2, m3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SbState, SheEngine, SheRequest};
    use crate::wire::pop_id;
    use she_keystore::{
        KeyId, MemoryKeystore, SheKeystore, SheMetadata, StoredKey, BOOT_MAC_ID, BOOT_MAC_KEY_ID,
        SECRET_KEY_ID,
    };

    #[test]
    fn client_built_message_is_accepted_by_the_engine() {
        let mut keystore = MemoryKeystore::new();
        let client_id = 0x1234u16;
        let auth_key = [0x42u8; 16];
        keystore
            .add_object(
                KeyId::new(client_id, SECRET_KEY_ID),
                StoredKey::new(SheMetadata::default(), auth_key),
            )
            .unwrap();

        // Provision a trivial (zero-length) boot chain so SECURE_BOOT_FINISH
        // actually drives the engine to Success instead of the NoSecureBoot
        // bypass: LOAD_KEY is gated on a completed secure boot.
        let boot_mac_key = [0x33u8; 16];
        let mut boot_input = [0u8; 16];
        boot_input[12..16].copy_from_slice(&0u32.to_be_bytes());
        let boot_mac = aes128_cmac(&boot_mac_key, &boot_input);
        keystore
            .add_object(
                KeyId::new(client_id, BOOT_MAC_KEY_ID),
                StoredKey::new(SheMetadata::default(), boot_mac_key),
            )
            .unwrap();
        keystore
            .add_object(
                KeyId::new(client_id, BOOT_MAC_ID),
                StoredKey::new(SheMetadata::default(), boot_mac),
            )
            .unwrap();

        let uid = [0x07u8; UID_SIZE];
        let mut engine = SheEngine::new(client_id);
        engine
            .handle(&mut keystore, SheRequest::SetUid { uid })
            .rc
            .unwrap();
        engine
            .handle(&mut keystore, SheRequest::SecureBootInit { sz: 0 })
            .rc
            .unwrap();
        engine
            .handle(&mut keystore, SheRequest::SecureBootFinish)
            .rc
            .unwrap();
        assert_eq!(engine.sb_state(), SbState::Success);

        let target_slot = 5;
        let new_key = [0x99u8; 16];
        let (m1, m2, m3) = build_load_key_messages(
            &auth_key,
            &uid,
            target_slot,
            SECRET_KEY_ID,
            1,
            0,
            &new_key,
        )
        .unwrap();
        assert_eq!(pop_id(&m1), target_slot);

        let response = engine.handle(
            &mut keystore,
            SheRequest::LoadKey {
                message_one: m1,
                message_two: m2,
                message_three: m3,
            },
        );
        assert!(response.rc.is_ok());
    }
}
