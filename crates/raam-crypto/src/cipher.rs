//! Keyed sponge stream encryption for message payloads.
//!
//! The sponge is keyed with the cipher key and an optional salt (each
//! absorbed as its own zero-padded block sequence), then drives an 81-tryte
//! chunk pipeline: squeeze a 243-trit mask, add it trit-wise (saturating)
//! to encrypt, subtract it to decrypt. The sponge state flows across
//! chunks and is never reset mid-stream, so chunk order matters.

use raam_trits::{trit_sum, trits_to_trytes, trytes_to_trits, Trit};

use crate::error::{CryptoError, CryptoResult};
use crate::sponge::{Sponge, HASH_TRITS, HASH_TRYTES};

/// Stream cipher over tryte strings whose length is a multiple of 81.
pub struct StreamCipher {
    sponge: Sponge,
}

impl StreamCipher {
    /// Key the cipher. Key and salt may be any width; each is absorbed in
    /// zero-padded 243-trit blocks.
    pub fn new(key: &[Trit], salt: Option<&[Trit]>) -> Self {
        let mut sponge = Sponge::new();
        sponge.absorb(key);
        if let Some(salt) = salt {
            sponge.absorb(salt);
        }
        Self { sponge }
    }

    /// Encrypt trytes left to right in 81-tryte chunks.
    pub fn encrypt(&mut self, trytes: &str) -> CryptoResult<String> {
        self.process(trytes, 1)
    }

    /// Decrypt trytes left to right in 81-tryte chunks.
    pub fn decrypt(&mut self, trytes: &str) -> CryptoResult<String> {
        self.process(trytes, -1)
    }

    fn process(&mut self, trytes: &str, direction: i8) -> CryptoResult<String> {
        if trytes.len() % HASH_TRYTES != 0 {
            return Err(CryptoError::InvalidLength {
                expected: trytes.len().div_ceil(HASH_TRYTES) * HASH_TRYTES,
                actual: trytes.len(),
            });
        }
        let trits = trytes_to_trits(trytes)?;
        let mut out = Vec::with_capacity(trits.len());
        for chunk in trits.chunks(HASH_TRITS) {
            let mask = self.sponge.squeeze(HASH_TRITS);
            out.extend(
                chunk
                    .iter()
                    .zip(&mask)
                    .map(|(&t, &m)| trit_sum(t, direction * m)),
            );
        }
        Ok(trits_to_trytes(&out)?)
    }
}
