/// Write-protection: once set, the slot can never be overwritten by a
/// subsequent `LOAD_KEY`.
pub const FLAG_WRITE_PROTECT: u16 = 0x01;
/// Wildcard: the slot may be updated by a `LOAD_KEY` carrying the all-zero
/// UID, not just the UID currently bound to the HSM.
pub const FLAG_WILDCARD: u16 = 0x10;

/// Per-slot SHE metadata: the flags nibble from M2 plus the 28-bit
/// anti-rollback counter extracted from the same word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SheMetadata {
    pub flags: u16,
    pub count: u32,
}

impl SheMetadata {
    pub fn new(flags: u16, count: u32) -> Self {
        Self { flags, count }
    }

    pub fn is_write_protected(self) -> bool {
        self.flags & FLAG_WRITE_PROTECT != 0
    }

    pub fn is_wildcard(self) -> bool {
        self.flags & FLAG_WILDCARD != 0
    }
}
