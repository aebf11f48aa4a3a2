use aes::Aes128;
use cmac::{Cmac, Mac};
use zeroize::Zeroizing;

use she_keystore::{
    KeyId, SheKeystore, SheMetadata, StoredKey, BOOT_MAC_ID, BOOT_MAC_KEY_ID, KEY_SIZE,
    PRNG_SEED_ID, RAM_KEY_ID, SECRET_KEY_ID,
};

use crate::crypto::{
    aes128_cbc_decrypt, aes128_cbc_encrypt, aes128_cmac, aes128_ecb_decrypt, aes128_ecb_encrypt,
    aes128_encrypt_block, BLOCK_SIZE,
};
use crate::error::SheError;
use crate::kdf::aes_mp16;
use crate::wire::{pack_counter_block, pack_id_byte, pop_auth_id, pop_counter, pop_flags, pop_id};

pub(crate) const KEY_UPDATE_ENC_C: [u8; 16] = [
    0x01, 0x01, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];
pub(crate) const KEY_UPDATE_MAC_C: [u8; 16] = [
    0x01, 0x02, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];
const PRNG_KEY_C: [u8; 16] = [
    0x01, 0x04, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];
const PRNG_SEED_KEY_C: [u8; 16] = [
    0x01, 0x05, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];

/// The fixed prefix CMAC'd before the bootloader image size at
/// `SECURE_BOOT_INIT`.
const BOOT_MAC_PREFIX_LEN: usize = 12;

pub const UID_SIZE: usize = crate::wire::UID_SIZE;
const M1_SIZE: usize = crate::wire::M1_SIZE;

/// SHE status register bits returned by `GET_STATUS`.
pub const SREG_SECURE_BOOT: u8 = 0x01;
pub const SREG_BOOT_FINISHED: u8 = 0x02;
pub const SREG_BOOT_OK: u8 = 0x04;
pub const SREG_RND_INIT: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbState {
    Init,
    Update,
    Finish,
    Success,
    Failure,
}

/// A request into the SHE command dispatcher. One variant per command; the
/// variable-length fields already carry their own size (no separate wire
/// framing layer — see DESIGN.md on why the C struct-overlay packet format
/// was not carried over).
#[derive(Debug, Clone)]
pub enum SheRequest {
    SetUid { uid: [u8; UID_SIZE] },
    SecureBootInit { sz: u32 },
    SecureBootUpdate { chunk: Vec<u8> },
    SecureBootFinish,
    GetStatus,
    LoadKey {
        message_one: [u8; M1_SIZE],
        message_two: [u8; 32],
        message_three: [u8; 16],
    },
    LoadPlainKey { key: [u8; KEY_SIZE] },
    ExportRamKey,
    InitRnd,
    Rnd,
    ExtendSeed { entropy: [u8; 16] },
    EncEcb { key_id: u8, data: Vec<u8> },
    EncCbc { key_id: u8, iv: [u8; 16], data: Vec<u8> },
    DecEcb { key_id: u8, data: Vec<u8> },
    DecCbc { key_id: u8, iv: [u8; 16], data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadKeyResponse {
    pub message_four: [u8; 32],
    pub message_five: [u8; 16],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRamKeyResponse {
    pub message_one: [u8; M1_SIZE],
    pub message_two: [u8; 32],
    pub message_three: [u8; 16],
    pub message_four: [u8; 32],
    pub message_five: [u8; 16],
}

/// The body of a successful response. Failed requests carry no body: the
/// original writes only `stub + sizeof(rc)` on any error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheResponseBody {
    Empty,
    Status { sreg: u8 },
    LoadKey(LoadKeyResponse),
    ExportRamKey(ExportRamKeyResponse),
    Rnd { rnd: [u8; 16] },
    Cipher { data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheResponse {
    pub rc: Result<(), SheError>,
    pub body: SheResponseBody,
}

/// Matches `WOLFHSM_PACKET_STUB_SIZE`: the fixed packet header every SHE
/// response carries ahead of its command-specific payload.
pub const STUB_SIZE: usize = 8;
const RC_SIZE: usize = 4;

impl SheResponseBody {
    /// Size in bytes of this body's command-specific payload, not counting
    /// the packet stub or the `rc` word the dispatcher reports separately.
    fn payload_len(&self) -> usize {
        match self {
            SheResponseBody::Empty => 0,
            SheResponseBody::Status { .. } => 1,
            SheResponseBody::LoadKey(_) => 32 + 16,
            SheResponseBody::ExportRamKey(_) => M1_SIZE + 32 + 16 + 32 + 16,
            SheResponseBody::Rnd { .. } => 16,
            SheResponseBody::Cipher { data } => data.len(),
        }
    }
}

impl SheResponse {
    fn ok(body: SheResponseBody) -> Self {
        Self { rc: Ok(()), body }
    }

    fn err(rc: SheError) -> Self {
        Self {
            rc: Err(rc.normalize()),
            body: SheResponseBody::Empty,
        }
    }

    /// The response length the original reports through `size_inout`:
    /// `STUB_SIZE + sizeof(rc)` for a failed or gate-rejected request, the
    /// same plus the body's own payload for a successful one.
    pub fn wire_len(&self) -> usize {
        STUB_SIZE + RC_SIZE + if self.rc.is_ok() { self.body.payload_len() } else { 0 }
    }
}

/// Owned protocol engine state for one client: the UID binding, the
/// secure-boot state machine, the RAM-key/PRNG bookkeeping. Threaded
/// explicitly through every call rather than kept in process-wide statics,
/// per the redesign guidance this workspace's specification carried.
pub struct SheEngine {
    client_id: u16,
    uid: [u8; UID_SIZE],
    uid_set: bool,
    sb_state: SbState,
    bl_size: u32,
    bl_size_received: u32,
    cmac_key_found: bool,
    boot_cmac: Option<Cmac<Aes128>>,
    ram_key_plain: bool,
    rnd_inited: bool,
    prng_state: [u8; 16],
    prng_key: Zeroizing<[u8; 16]>,
}

impl SheEngine {
    pub fn new(client_id: u16) -> Self {
        Self {
            client_id,
            uid: [0u8; UID_SIZE],
            uid_set: false,
            sb_state: SbState::Init,
            bl_size: 0,
            bl_size_received: 0,
            cmac_key_found: false,
            boot_cmac: None,
            ram_key_plain: false,
            rnd_inited: false,
            prng_state: [0u8; 16],
            prng_key: Zeroizing::new([0u8; 16]),
        }
    }

    pub fn sb_state(&self) -> SbState {
        self.sb_state
    }

    pub fn uid_set(&self) -> bool {
        self.uid_set
    }

    /// Dispatch one SHE command. Mirrors `wh_Server_HandleSheRequest`: a
    /// pre-dispatch gate (only secure-boot/status/set-uid commands are
    /// allowed before boot succeeds and a UID is bound), the command itself,
    /// error normalization, and a post-dispatch reset of the secure-boot
    /// accumulator on any secure-boot failure other than "no key configured".
    pub fn handle(&mut self, keystore: &mut impl SheKeystore, request: SheRequest) -> SheResponse {
        let is_secure_boot_action = matches!(
            request,
            SheRequest::SecureBootInit { .. }
                | SheRequest::SecureBootUpdate { .. }
                | SheRequest::SecureBootFinish
        );
        let is_gate_exempt = is_secure_boot_action
            || matches!(request, SheRequest::GetStatus | SheRequest::SetUid { .. });
        let is_set_uid = matches!(request, SheRequest::SetUid { .. });

        if (self.sb_state != SbState::Success && !is_gate_exempt)
            || (!is_set_uid && !self.uid_set)
        {
            return SheResponse::err(SheError::SequenceError);
        }

        let result = match request {
            SheRequest::SetUid { uid } => self.set_uid(uid).map(|()| SheResponseBody::Empty),
            SheRequest::SecureBootInit { sz } => self
                .secure_boot_init(keystore, sz)
                .map(|()| SheResponseBody::Empty),
            SheRequest::SecureBootUpdate { chunk } => self
                .secure_boot_update(&chunk)
                .map(|()| SheResponseBody::Empty),
            SheRequest::SecureBootFinish => self
                .secure_boot_finish(keystore)
                .map(|()| SheResponseBody::Empty),
            SheRequest::GetStatus => Ok(SheResponseBody::Status {
                sreg: self.get_status(),
            }),
            SheRequest::LoadKey {
                message_one,
                message_two,
                message_three,
            } => self
                .load_key(keystore, message_one, message_two, message_three)
                .map(SheResponseBody::LoadKey),
            SheRequest::LoadPlainKey { key } => self
                .load_plain_key(keystore, key)
                .map(|()| SheResponseBody::Empty),
            SheRequest::ExportRamKey => {
                self.export_ram_key(keystore).map(SheResponseBody::ExportRamKey)
            }
            SheRequest::InitRnd => self.init_rnd(keystore).map(|()| SheResponseBody::Empty),
            SheRequest::Rnd => self.rnd().map(|rnd| SheResponseBody::Rnd { rnd }),
            SheRequest::ExtendSeed { entropy } => self
                .extend_seed(keystore, entropy)
                .map(|()| SheResponseBody::Empty),
            SheRequest::EncEcb { key_id, data } => self
                .enc_ecb(keystore, key_id, data)
                .map(|data| SheResponseBody::Cipher { data }),
            SheRequest::EncCbc { key_id, iv, data } => self
                .enc_cbc(keystore, key_id, iv, data)
                .map(|data| SheResponseBody::Cipher { data }),
            SheRequest::DecEcb { key_id, data } => self
                .dec_ecb(keystore, key_id, data)
                .map(|data| SheResponseBody::Cipher { data }),
            SheRequest::DecCbc { key_id, iv, data } => self
                .dec_cbc(keystore, key_id, iv, data)
                .map(|data| SheResponseBody::Cipher { data }),
        };

        let response = match result {
            Ok(body) => SheResponse::ok(body),
            Err(err) => SheResponse::err(err),
        };

        if is_secure_boot_action {
            if let Err(err) = response.rc {
                if err != SheError::NoSecureBoot {
                    self.sb_state = SbState::Init;
                    self.bl_size = 0;
                    self.bl_size_received = 0;
                    self.cmac_key_found = false;
                    self.boot_cmac = None;
                }
            }
        }

        response
    }

    fn key_id(&self, slot: u8) -> KeyId {
        KeyId::new(self.client_id, slot)
    }

    fn set_uid(&mut self, uid: [u8; UID_SIZE]) -> Result<(), SheError> {
        if self.uid_set {
            return Err(SheError::SequenceError);
        }
        self.uid = uid;
        self.uid_set = true;
        Ok(())
    }

    fn secure_boot_init(
        &mut self,
        keystore: &impl SheKeystore,
        sz: u32,
    ) -> Result<(), SheError> {
        if self.sb_state != SbState::Init {
            return Err(SheError::SequenceError);
        }
        self.bl_size = sz;
        self.bl_size_received = 0;

        let mac_key = match keystore.read_key(self.key_id(BOOT_MAC_KEY_ID)) {
            Ok(stored) => stored.bytes,
            Err(_) => {
                self.sb_state = SbState::Success;
                self.cmac_key_found = false;
                return Err(SheError::NoSecureBoot);
            }
        };
        self.cmac_key_found = true;

        let mut cmac = <Cmac<Aes128> as Mac>::new_from_slice(&mac_key).expect("16-byte key");
        cmac.update(&[0u8; BOOT_MAC_PREFIX_LEN]);
        cmac.update(&sz.to_be_bytes());
        self.boot_cmac = Some(cmac);
        self.sb_state = SbState::Update;
        Ok(())
    }

    fn secure_boot_update(&mut self, chunk: &[u8]) -> Result<(), SheError> {
        if self.sb_state != SbState::Update {
            return Err(SheError::SequenceError);
        }
        self.bl_size_received = self.bl_size_received.saturating_add(chunk.len() as u32);
        if self.bl_size_received > self.bl_size {
            return Err(SheError::SequenceError);
        }
        self.boot_cmac
            .as_mut()
            .expect("boot cmac initialized while in Update state")
            .update(chunk);
        if self.bl_size_received == self.bl_size {
            self.sb_state = SbState::Finish;
        }
        Ok(())
    }

    fn secure_boot_finish(&mut self, keystore: &impl SheKeystore) -> Result<(), SheError> {
        if self.sb_state != SbState::Finish {
            return Err(SheError::SequenceError);
        }
        let cmac = self
            .boot_cmac
            .take()
            .expect("boot cmac initialized while in Finish state");
        let computed = cmac.finalize().into_bytes();

        let expected = keystore
            .read_key(self.key_id(BOOT_MAC_ID))
            .map_err(|_| SheError::KeyNotAvailable)?;

        if computed.as_slice() == expected.bytes {
            self.sb_state = SbState::Success;
            Ok(())
        } else {
            self.sb_state = SbState::Failure;
            Err(SheError::GeneralError)
        }
    }

    fn get_status(&self) -> u8 {
        let mut sreg = 0u8;
        if self.cmac_key_found {
            sreg |= SREG_SECURE_BOOT;
        }
        if matches!(self.sb_state, SbState::Success | SbState::Failure) {
            sreg |= SREG_BOOT_FINISHED;
        }
        if self.sb_state == SbState::Success {
            sreg |= SREG_BOOT_OK;
        }
        if self.rnd_inited {
            sreg |= SREG_RND_INIT;
        }
        sreg
    }

    fn load_key(
        &mut self,
        keystore: &mut impl SheKeystore,
        m1: [u8; M1_SIZE],
        mut m2: [u8; 32],
        m3: [u8; 16],
    ) -> Result<LoadKeyResponse, SheError> {
        let auth_id = pop_auth_id(&m1);
        let target_slot = pop_id(&m1);

        let auth_key = Zeroizing::new(
            keystore
                .read_key(self.key_id(auth_id))
                .map_err(|_| SheError::KeyNotAvailable)?
                .bytes,
        );

        let k2 = Zeroizing::new(aes_mp16(&concat(&auth_key, &KEY_UPDATE_MAC_C))?);
        let computed_m3 = aes128_cmac(&k2, &concat(&m1, &m2));
        if computed_m3 != m3 {
            return Err(SheError::KeyUpdateError);
        }

        let k1 = Zeroizing::new(aes_mp16(&concat(&auth_key, &KEY_UPDATE_ENC_C))?);
        aes128_cbc_decrypt(&k1, &[0u8; 16], &mut m2);

        let counter = pop_counter(&m2[0..16].try_into().unwrap());
        let flags = pop_flags(&m2[0..16].try_into().unwrap());
        let mut new_key = [0u8; KEY_SIZE];
        new_key.copy_from_slice(&m2[16..32]);

        let target_id = self.key_id(target_slot);
        let prior = keystore.read_key(target_id).ok();

        if let Some(prior) = &prior {
            if prior.meta.is_write_protected() {
                return Err(SheError::WriteProtected);
            }
        }

        let uid_is_zero = m1[..UID_SIZE].iter().all(|b| *b == 0);
        if uid_is_zero {
            if let Some(prior) = &prior {
                if !prior.meta.is_wildcard() {
                    return Err(SheError::KeyUpdateError);
                }
            }
        } else if m1[..UID_SIZE] != self.uid {
            return Err(SheError::KeyUpdateError);
        }

        if let Some(prior) = &prior {
            if counter <= prior.meta.count {
                return Err(SheError::KeyUpdateError);
            }
        }

        let meta = SheMetadata::new(flags, counter);
        let stored = StoredKey::new(meta, new_key);
        let write_result = if target_id.is_ram_key() {
            keystore.cache_key(target_id, stored)
        } else {
            keystore.add_object(target_id, stored)
        };
        write_result.map_err(|_| SheError::KeyUpdateError)?;
        let written = keystore
            .read_key(target_id)
            .map_err(|_| SheError::KeyUpdateError)?;

        let written_bytes = Zeroizing::new(written.bytes);
        let k3 = Zeroizing::new(aes_mp16(&concat(&written_bytes, &KEY_UPDATE_ENC_C))?);
        let mut ctr_block = pack_counter_block(written.meta.count);
        aes128_encrypt_block(&k3, &mut ctr_block);

        let mut message_four = [0u8; 32];
        message_four[..UID_SIZE].copy_from_slice(&self.uid);
        message_four[M1_SIZE - 1] = pack_id_byte(target_slot, auth_id);
        message_four[16..32].copy_from_slice(&ctr_block);

        let k4 = Zeroizing::new(aes_mp16(&concat(&written_bytes, &KEY_UPDATE_MAC_C))?);
        let message_five = aes128_cmac(&k4, &message_four);

        if target_id.is_ram_key() {
            self.ram_key_plain = true;
        }

        Ok(LoadKeyResponse {
            message_four,
            message_five,
        })
    }

    fn load_plain_key(
        &mut self,
        keystore: &mut impl SheKeystore,
        key: [u8; KEY_SIZE],
    ) -> Result<(), SheError> {
        let id = self.key_id(RAM_KEY_ID);
        keystore
            .cache_key(id, StoredKey::new(SheMetadata::default(), key))
            .map_err(|_| SheError::GeneralError)?;
        self.ram_key_plain = true;
        Ok(())
    }

    fn export_ram_key(
        &mut self,
        keystore: &impl SheKeystore,
    ) -> Result<ExportRamKeyResponse, SheError> {
        if !self.ram_key_plain {
            return Err(SheError::KeyInvalid);
        }
        let secret = Zeroizing::new(
            keystore
                .read_key(self.key_id(SECRET_KEY_ID))
                .map_err(|_| SheError::KeyNotAvailable)?
                .bytes,
        );
        let ram_key = Zeroizing::new(
            keystore
                .read_key(self.key_id(RAM_KEY_ID))
                .map_err(|_| SheError::KeyNotAvailable)?
                .bytes,
        );

        let mut message_one = [0u8; M1_SIZE];
        message_one[..UID_SIZE].copy_from_slice(&self.uid);
        message_one[M1_SIZE - 1] = pack_id_byte(RAM_KEY_ID, SECRET_KEY_ID);

        let k1 = Zeroizing::new(aes_mp16(&concat(&secret, &KEY_UPDATE_ENC_C))?);
        let mut message_two = [0u8; 32];
        message_two[0..16].copy_from_slice(&pack_counter_block(1));
        message_two[16..32].copy_from_slice(&ram_key);
        aes128_cbc_encrypt(&k1, &[0u8; 16], &mut message_two);

        let k2 = Zeroizing::new(aes_mp16(&concat(&secret, &KEY_UPDATE_MAC_C))?);
        let message_three = aes128_cmac(&k2, &concat(&message_one, &message_two));

        let k3 = Zeroizing::new(aes_mp16(&concat(&ram_key, &KEY_UPDATE_ENC_C))?);
        let mut message_four = [0u8; 32];
        message_four[..UID_SIZE].copy_from_slice(&self.uid);
        message_four[M1_SIZE - 1] = pack_id_byte(RAM_KEY_ID, SECRET_KEY_ID);
        let mut ctr_block = pack_counter_block(1);
        aes128_encrypt_block(&k3, &mut ctr_block);
        message_four[16..32].copy_from_slice(&ctr_block);

        let k4 = Zeroizing::new(aes_mp16(&concat(&ram_key, &KEY_UPDATE_MAC_C))?);
        let message_five = aes128_cmac(&k4, &message_four);

        Ok(ExportRamKeyResponse {
            message_one,
            message_two,
            message_three,
            message_four,
            message_five,
        })
    }

    fn init_rnd(&mut self, keystore: &mut impl SheKeystore) -> Result<(), SheError> {
        if self.rnd_inited {
            return Err(SheError::SequenceError);
        }
        let secret = Zeroizing::new(
            keystore
                .read_key(self.key_id(SECRET_KEY_ID))
                .map_err(|_| SheError::KeyNotAvailable)?
                .bytes,
        );

        let seed_key = Zeroizing::new(aes_mp16(&concat(&secret, &PRNG_SEED_KEY_C))?);
        let mut seed = keystore
            .read_key(self.key_id(PRNG_SEED_ID))
            .map_err(|_| SheError::KeyNotAvailable)?
            .bytes;
        aes128_cbc_encrypt(&seed_key, &[0u8; 16], &mut seed);

        keystore
            .add_object(
                self.key_id(PRNG_SEED_ID),
                StoredKey::new(SheMetadata::default(), seed),
            )
            .map_err(|_| SheError::KeyUpdateError)?;

        self.prng_state = seed;
        *self.prng_key = aes_mp16(&concat(&secret, &PRNG_KEY_C))?;
        self.rnd_inited = true;
        Ok(())
    }

    fn rnd(&mut self) -> Result<[u8; 16], SheError> {
        if !self.rnd_inited {
            return Err(SheError::RngSeed);
        }
        aes128_cbc_encrypt(&self.prng_key, &[0u8; 16], &mut self.prng_state);
        Ok(self.prng_state)
    }

    fn extend_seed(
        &mut self,
        keystore: &mut impl SheKeystore,
        entropy: [u8; 16],
    ) -> Result<(), SheError> {
        if !self.rnd_inited {
            return Err(SheError::RngSeed);
        }
        self.prng_state = aes_mp16(&concat(&self.prng_state, &entropy))?;

        let seed = keystore
            .read_key(self.key_id(PRNG_SEED_ID))
            .map_err(|_| SheError::KeyNotAvailable)?
            .bytes;
        let new_seed = aes_mp16(&concat(&seed, &entropy))?;

        keystore
            .add_object(
                self.key_id(PRNG_SEED_ID),
                StoredKey::new(SheMetadata::default(), new_seed),
            )
            .map_err(|_| SheError::KeyUpdateError)?;
        Ok(())
    }

    fn truncated_len(len: usize) -> usize {
        len - (len % BLOCK_SIZE)
    }

    /// Look up the key bound to `key_id` for a bulk cipher op. Mirrors the
    /// original reading `keySz` back out of `ReadKey` and using that same
    /// length for the cipher's key-setup call: a corrupt/truncated slot
    /// surfaces as `KeyInvalid` here rather than silently keying off whatever
    /// bytes happen to be in the fixed-size slot.
    fn cipher_key(&self, keystore: &impl SheKeystore, key_id: u8) -> Result<[u8; 16], SheError> {
        let stored = keystore
            .read_key(self.key_id(key_id))
            .map_err(|_| SheError::KeyNotAvailable)?;
        if stored.key_len != KEY_SIZE {
            return Err(SheError::KeyInvalid);
        }
        Ok(stored.bytes)
    }

    fn enc_ecb(
        &self,
        keystore: &impl SheKeystore,
        key_id: u8,
        mut data: Vec<u8>,
    ) -> Result<Vec<u8>, SheError> {
        let key = self.cipher_key(keystore, key_id)?;
        data.truncate(Self::truncated_len(data.len()));
        aes128_ecb_encrypt(&key, &mut data);
        Ok(data)
    }

    fn dec_ecb(
        &self,
        keystore: &impl SheKeystore,
        key_id: u8,
        mut data: Vec<u8>,
    ) -> Result<Vec<u8>, SheError> {
        let key = self.cipher_key(keystore, key_id)?;
        data.truncate(Self::truncated_len(data.len()));
        aes128_ecb_decrypt(&key, &mut data);
        Ok(data)
    }

    fn enc_cbc(
        &self,
        keystore: &impl SheKeystore,
        key_id: u8,
        iv: [u8; 16],
        mut data: Vec<u8>,
    ) -> Result<Vec<u8>, SheError> {
        let key = self.cipher_key(keystore, key_id)?;
        data.truncate(Self::truncated_len(data.len()));
        aes128_cbc_encrypt(&key, &iv, &mut data);
        Ok(data)
    }

    fn dec_cbc(
        &self,
        keystore: &impl SheKeystore,
        key_id: u8,
        iv: [u8; 16],
        mut data: Vec<u8>,
    ) -> Result<Vec<u8>, SheError> {
        let key = self.cipher_key(keystore, key_id)?;
        data.truncate(Self::truncated_len(data.len()));
        aes128_cbc_decrypt(&key, &iv, &mut data);
        Ok(data)
    }
}

fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(a.len() + b.len());
    v.extend_from_slice(a);
    v.extend_from_slice(b);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use she_keystore::MemoryKeystore;

    fn booted_engine(client_id: u16) -> (SheEngine, MemoryKeystore) {
        let mut keystore = MemoryKeystore::new();
        let mut engine = SheEngine::new(client_id);
        engine
            .handle(&mut keystore, SheRequest::SetUid { uid: [0u8; UID_SIZE] })
            .rc
            .unwrap();
        // No BOOT_MAC_KEY provisioned: bypasses straight to Success.
        let _ = engine.handle(&mut keystore, SheRequest::SecureBootInit { sz: 0 });
        (engine, keystore)
    }

    #[test]
    fn failed_response_reports_stub_plus_rc_only() {
        let response = SheResponse::err(SheError::SequenceError);
        assert_eq!(response.wire_len(), STUB_SIZE + RC_SIZE);
    }

    #[test]
    fn successful_response_adds_its_body_payload() {
        let response = SheResponse::ok(SheResponseBody::Rnd { rnd: [0u8; 16] });
        assert_eq!(response.wire_len(), STUB_SIZE + RC_SIZE + 16);

        let empty = SheResponse::ok(SheResponseBody::Empty);
        assert_eq!(empty.wire_len(), STUB_SIZE + RC_SIZE);
    }

    #[test]
    fn enc_ecb_rejects_a_truncated_key_slot() {
        let (engine, mut keystore) = booted_engine(0xAAAA);
        keystore
            .add_object(
                engine.key_id(RAM_KEY_ID),
                StoredKey::with_len(SheMetadata::default(), [0x11u8; KEY_SIZE], 8),
            )
            .unwrap();

        let response = engine.enc_ecb(&keystore, RAM_KEY_ID, vec![0u8; 16]);
        assert_eq!(response, Err(SheError::KeyInvalid));
    }

    #[test]
    fn enc_ecb_accepts_a_full_length_key_slot() {
        let (engine, mut keystore) = booted_engine(0xBBBB);
        keystore
            .add_object(
                engine.key_id(RAM_KEY_ID),
                StoredKey::new(SheMetadata::default(), [0x11u8; KEY_SIZE]),
            )
            .unwrap();

        assert!(engine.enc_ecb(&keystore, RAM_KEY_ID, vec![0u8; 16]).is_ok());
    }
}
