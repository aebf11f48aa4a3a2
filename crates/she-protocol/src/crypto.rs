//! Crypto-provider primitives the protocol engine is built on: single-block
//! AES-128, ECB/CBC bulk modes driven by hand over that single-block
//! primitive (the same way the KDF below drives it), and AES-CMAC.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};

pub const BLOCK_SIZE: usize = 16;

pub fn aes128_encrypt_block(key: &[u8; 16], block: &mut [u8; 16]) {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut ga = *GenericArray::from_slice(block.as_slice());
    cipher.encrypt_block(&mut ga);
    block.copy_from_slice(ga.as_slice());
}

pub fn aes128_decrypt_block(key: &[u8; 16], block: &mut [u8; 16]) {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut ga = *GenericArray::from_slice(block.as_slice());
    cipher.decrypt_block(&mut ga);
    block.copy_from_slice(ga.as_slice());
}

/// AES-128 ECB. `data.len()` must be a multiple of [`BLOCK_SIZE`] —
/// truncating to one is the caller's responsibility, matching the original
/// handlers which discard the remainder before encrypting.
pub fn aes128_ecb_encrypt(key: &[u8; 16], data: &mut [u8]) {
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        let mut b = [0u8; BLOCK_SIZE];
        b.copy_from_slice(block);
        aes128_encrypt_block(key, &mut b);
        block.copy_from_slice(&b);
    }
}

pub fn aes128_ecb_decrypt(key: &[u8; 16], data: &mut [u8]) {
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        let mut b = [0u8; BLOCK_SIZE];
        b.copy_from_slice(block);
        aes128_decrypt_block(key, &mut b);
        block.copy_from_slice(&b);
    }
}

/// AES-128 CBC encrypt, chained by hand rather than through a second
/// mode-of-operation crate (see DESIGN.md).
pub fn aes128_cbc_encrypt(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) {
    let mut prev = *iv;
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= *p;
        }
        let mut b = [0u8; BLOCK_SIZE];
        b.copy_from_slice(block);
        aes128_encrypt_block(key, &mut b);
        block.copy_from_slice(&b);
        prev.copy_from_slice(block);
    }
}

pub fn aes128_cbc_decrypt(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) {
    let mut prev = *iv;
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        let mut ciphertext = [0u8; BLOCK_SIZE];
        ciphertext.copy_from_slice(block);
        let mut b = ciphertext;
        aes128_decrypt_block(key, &mut b);
        for (x, p) in b.iter_mut().zip(prev.iter()) {
            *x ^= *p;
        }
        block.copy_from_slice(&b);
        prev = ciphertext;
    }
}

/// RFC 4493 AES-CMAC.
pub fn aes128_cmac(key: &[u8; 16], data: &[u8]) -> [u8; 16] {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key).expect("16-byte key");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecb_decrypt_inverts_encrypt() {
        let key = [0x2bu8; 16];
        let mut data = (0u8..32).collect::<Vec<_>>();
        let plaintext = data.clone();
        aes128_ecb_encrypt(&key, &mut data);
        assert_ne!(data, plaintext);
        aes128_ecb_decrypt(&key, &mut data);
        assert_eq!(data, plaintext);
    }

    #[test]
    fn cbc_decrypt_inverts_encrypt() {
        let key = [0x11u8; 16];
        let iv = [0x22u8; 16];
        let mut data = (0u8..48).collect::<Vec<_>>();
        let plaintext = data.clone();
        aes128_cbc_encrypt(&key, &iv, &mut data);
        assert_ne!(data, plaintext);
        aes128_cbc_decrypt(&key, &iv, &mut data);
        assert_eq!(data, plaintext);
    }

    #[test]
    fn cmac_is_deterministic_and_key_dependent() {
        let data = b"some message bytes";
        let mac_a = aes128_cmac(&[0u8; 16], data);
        let mac_b = aes128_cmac(&[0u8; 16], data);
        let mac_c = aes128_cmac(&[1u8; 16], data);
        assert_eq!(mac_a, mac_b);
        assert_ne!(mac_a, mac_c);
    }
}
