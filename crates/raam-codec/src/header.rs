//! The 11-tryte framing header.
//!
//! Layout (big-endian trytes, encrypted along with the body):
//! index (6) ‖ security-and-branch indicator (1) ‖ height (1) ‖
//! message length (3). The indicator encodes
//! `security − 1 + 4 · next_root_security`, where a next-root security of
//! zero means the message carries no branch.

use raam_trits::{int_to_trytes, trytes_to_int};

use crate::error::{CodecError, CodecResult};

/// Total header width in trytes.
pub const HEADER_TRYTES: usize = 11;

/// Width of the index field in trytes.
pub const INDEX_TRYTES: usize = 6;

/// Width of the message-length field in trytes.
pub const LENGTH_TRYTES: usize = 3;

/// Decoded framing header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub index: u64,
    pub security: usize,
    /// Security of the embedded next root; 0 when no branch is present.
    pub next_root_security: usize,
    pub height: usize,
    pub message_length: usize,
}

impl Header {
    /// Validate field ranges.
    pub fn validate(&self) -> CodecResult<()> {
        if !(1..=26).contains(&self.height) {
            return Err(CodecError::InvalidHeight(self.height));
        }
        if !(1..=4).contains(&self.security) {
            return Err(CodecError::InvalidSecurityLevel(self.security));
        }
        if self.next_root_security > 4 {
            return Err(CodecError::InvalidSecurityLevel(self.next_root_security));
        }
        let capacity = 1u64 << self.height;
        if self.index >= capacity {
            return Err(CodecError::InvalidIndex {
                index: self.index,
                capacity,
            });
        }
        if self.message_length >= 27usize.pow(LENGTH_TRYTES as u32) {
            return Err(CodecError::InvalidLength(self.message_length));
        }
        Ok(())
    }

    /// Encode into 11 trytes.
    pub fn encode(&self) -> CodecResult<String> {
        self.validate()?;
        let indicator = (self.security - 1 + 4 * self.next_root_security) as u64;
        let mut out = int_to_trytes(self.index, INDEX_TRYTES)?;
        out += &int_to_trytes(indicator, 1)?;
        out += &int_to_trytes(self.height as u64, 1)?;
        out += &int_to_trytes(self.message_length as u64, LENGTH_TRYTES)?;
        Ok(out)
    }

    /// Decode from 11 trytes and validate field ranges.
    pub fn decode(trytes: &str) -> CodecResult<Self> {
        if trytes.len() < HEADER_TRYTES {
            return Err(CodecError::InvalidLength(trytes.len()));
        }
        let index = trytes_to_int(&trytes[..INDEX_TRYTES])?;
        let indicator = trytes_to_int(&trytes[INDEX_TRYTES..INDEX_TRYTES + 1])? as usize;
        let height = trytes_to_int(&trytes[INDEX_TRYTES + 1..INDEX_TRYTES + 2])? as usize;
        let message_length = trytes_to_int(&trytes[INDEX_TRYTES + 2..HEADER_TRYTES])? as usize;

        let header = Self {
            index,
            security: indicator % 4 + 1,
            next_root_security: indicator / 4,
            height,
            message_length,
        };
        header.validate()?;
        Ok(header)
    }
}
