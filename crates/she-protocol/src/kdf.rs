//! AES-MP16: a Miyaguchi-Preneel one-way compression function built on
//! AES-128 single-block encryption. Every SHE session key (K1..K4) and PRNG
//! key derivation goes through this.

use crate::crypto::aes128_encrypt_block;
use crate::error::SheError;

pub const OUTPUT_SIZE: usize = 16;

/// Compress `input` (zero-padded to a whole number of 16-byte blocks) down to
/// a 16-byte digest. Each block is encrypted under the running digest as the
/// AES key, then XORed with the block and the previous digest — the chained
/// state becomes the key for the next block. Fails with [`SheError::BadArgs`]
/// on empty input, the one case with no block to chain from.
pub fn aes_mp16(input: &[u8]) -> Result<[u8; OUTPUT_SIZE], SheError> {
    if input.is_empty() {
        return Err(SheError::BadArgs);
    }
    let mut state = [0u8; OUTPUT_SIZE];
    for chunk_start in (0..input.len()).step_by(OUTPUT_SIZE) {
        let chunk_end = (chunk_start + OUTPUT_SIZE).min(input.len());
        let mut block = [0u8; OUTPUT_SIZE];
        block[..chunk_end - chunk_start].copy_from_slice(&input[chunk_start..chunk_end]);

        let mut out = block;
        aes128_encrypt_block(&state, &mut out);
        for j in 0..OUTPUT_SIZE {
            out[j] ^= block[j] ^ state[j];
        }
        state = out;
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let input = b"the quick brown fox, extended past one block";
        assert_eq!(aes_mp16(input).unwrap(), aes_mp16(input).unwrap());
    }

    #[test]
    fn differs_by_input_length_and_content() {
        let a = aes_mp16(b"0123456789abcdef").unwrap();
        let b = aes_mp16(b"0123456789abcdeg").unwrap();
        let c = aes_mp16(b"0123456789abcde").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn single_block_matches_hand_computation() {
        let block = [0x42u8; 16];
        let mut expected = block;
        aes128_encrypt_block(&[0u8; 16], &mut expected);
        for j in 0..16 {
            expected[j] ^= block[j];
        }
        assert_eq!(aes_mp16(&block).unwrap(), expected);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(aes_mp16(&[]), Err(SheError::BadArgs));
    }
}
