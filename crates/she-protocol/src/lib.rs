//! The SHE command dispatcher: cryptographic primitives, key-derivation,
//! wire-level field encodings, and the stateful protocol engine that ties
//! them together per client session.

mod client;
mod crypto;
mod engine;
mod error;
mod kdf;
mod wire;

pub use client::build_load_key_messages;
pub use crypto::{
    aes128_cbc_decrypt, aes128_cbc_encrypt, aes128_cmac, aes128_decrypt_block,
    aes128_ecb_decrypt, aes128_ecb_encrypt, aes128_encrypt_block, BLOCK_SIZE,
};
pub use engine::{
    ExportRamKeyResponse, LoadKeyResponse, SbState, SheEngine, SheRequest, SheResponse,
    SheResponseBody, SREG_BOOT_FINISHED, SREG_BOOT_OK, SREG_RND_INIT, SREG_SECURE_BOOT, STUB_SIZE,
    UID_SIZE,
};
pub use error::SheError;
pub use kdf::aes_mp16;
pub use wire::{pack_counter_block, pack_id_byte, pop_auth_id, pop_counter, pop_flags, pop_id, M1_SIZE};
