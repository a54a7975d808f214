//! Winternitz-style one-time signatures over balanced ternary.
//!
//! A private key is `security · 27` slots of 243 trits squeezed from a
//! subseed. Signing advances each slot's hash chain by `13 − d` rounds for
//! its normalized digest value `d`; verification advances the signature by
//! the remaining `d + 13` rounds, so both sides meet at the 26-round chain
//! end. The verifying key is the digest of those chain ends.

use raam_trits::Trit;

use crate::error::{CryptoError, CryptoResult};
use crate::sponge::{Sponge, HASH_TRITS};

/// Hash-chain slots per security level.
pub const SLOTS_PER_SECURITY: usize = 27;

/// Private-key trits per security level.
pub const KEY_FRAGMENT_TRITS: usize = SLOTS_PER_SECURITY * HASH_TRITS;

/// Largest balanced tryte value; also the chain midpoint.
pub const MAX_TRYTE_VALUE: i8 = 13;

/// Total hash-chain length from private slot to chain end.
const CHAIN_ROUNDS: i8 = 2 * MAX_TRYTE_VALUE;

/// Validate a security level.
pub fn validate_security(security: usize) -> CryptoResult<()> {
    if (1..=4).contains(&security) {
        Ok(())
    } else {
        Err(CryptoError::InvalidSecurityLevel(security))
    }
}

/// Advance a 243-trit slot through `rounds` iterations of H.
fn chain(slot: &[Trit], rounds: usize) -> Vec<Trit> {
    let mut current = slot.to_vec();
    for _ in 0..rounds {
        current = Sponge::hash(&current, HASH_TRITS);
    }
    current
}

/// Squeeze a private key of `security · 27` slots from a subseed.
pub fn generate_private_key(subseed: &[Trit], security: usize) -> CryptoResult<Vec<Trit>> {
    validate_security(security)?;
    let mut sponge = Sponge::new();
    sponge.absorb(subseed);
    Ok(sponge.squeeze(security * KEY_FRAGMENT_TRITS))
}

/// Compute the verifying key: digest every slot's 26-round chain end and
/// squeeze `security · 243` trits.
pub fn verifying_key(private_key: &[Trit]) -> CryptoResult<Vec<Trit>> {
    let security = private_key.len() / KEY_FRAGMENT_TRITS;
    if private_key.len() % KEY_FRAGMENT_TRITS != 0 {
        return Err(CryptoError::InvalidLength {
            expected: (security + 1) * KEY_FRAGMENT_TRITS,
            actual: private_key.len(),
        });
    }
    validate_security(security)?;

    let mut digest = Sponge::new();
    for slot in private_key.chunks(HASH_TRITS) {
        digest.absorb(&chain(slot, CHAIN_ROUNDS as usize));
    }
    Ok(digest.squeeze(security * HASH_TRITS))
}

/// Hash a message and normalize it into `security · 27` balanced tryte
/// values in [−13, 12].
///
/// The value 13 is replaced by 12 (13 would leave a chain end exposed in
/// the signature), then the sum is balanced: while positive, the first
/// value above −13 is decremented; while negative, the first value below
/// 13 that is not 12 is incremented.
pub fn message_digest(message: &[Trit], security: usize) -> CryptoResult<Vec<i8>> {
    validate_security(security)?;

    let value_count = security * SLOTS_PER_SECURITY;
    let digest_trits = (value_count * 3).div_ceil(HASH_TRITS) * HASH_TRITS;
    let trits = Sponge::hash(message, digest_trits);

    let mut values: Vec<i8> = trits[..value_count * 3]
        .chunks(3)
        .map(|c| c[0] + 3 * c[1] + 9 * c[2])
        .collect();
    normalize(&mut values);
    Ok(values)
}

fn normalize(values: &mut [i8]) {
    for v in values.iter_mut() {
        if *v == MAX_TRYTE_VALUE {
            *v = MAX_TRYTE_VALUE - 1;
        }
    }
    let mut sum: i32 = values.iter().map(|&v| i32::from(v)).sum();
    while sum > 0 {
        if let Some(v) = values.iter_mut().find(|v| **v > -MAX_TRYTE_VALUE) {
            *v -= 1;
            sum -= 1;
        }
    }
    while sum < 0 {
        if let Some(v) = values
            .iter_mut()
            .find(|v| **v != MAX_TRYTE_VALUE - 1 && **v < MAX_TRYTE_VALUE)
        {
            *v += 1;
            sum += 1;
        }
    }
}

/// Sign a normalized digest: slot `i` advances `13 − d_i` chain rounds.
pub fn sign(private_key: &[Trit], digest: &[i8]) -> CryptoResult<Vec<Trit>> {
    if private_key.len() != digest.len() * HASH_TRITS {
        return Err(CryptoError::InvalidLength {
            expected: digest.len() * HASH_TRITS,
            actual: private_key.len(),
        });
    }
    let mut signature = Vec::with_capacity(private_key.len());
    for (slot, &d) in private_key.chunks(HASH_TRITS).zip(digest) {
        signature.extend(chain(slot, (MAX_TRYTE_VALUE - d) as usize));
    }
    Ok(signature)
}

/// Verify a signature against a normalized digest and a claimed verifying
/// key. There is no partial verification: any mismatch is
/// [`CryptoError::VerificationFailed`].
pub fn verify(signature: &[Trit], digest: &[i8], verifying_key: &[Trit]) -> CryptoResult<()> {
    if signature.len() != digest.len() * HASH_TRITS {
        return Err(CryptoError::InvalidLength {
            expected: digest.len() * HASH_TRITS,
            actual: signature.len(),
        });
    }
    let security = digest.len() / SLOTS_PER_SECURITY;
    if digest.len() % SLOTS_PER_SECURITY != 0 || verifying_key.len() != security * HASH_TRITS {
        return Err(CryptoError::InvalidLength {
            expected: security * HASH_TRITS,
            actual: verifying_key.len(),
        });
    }

    let mut recovered = Sponge::new();
    for (slot, &d) in signature.chunks(HASH_TRITS).zip(digest) {
        recovered.absorb(&chain(slot, (d + MAX_TRYTE_VALUE) as usize));
    }
    if recovered.squeeze(verifying_key.len()) == verifying_key {
        Ok(())
    } else {
        Err(CryptoError::VerificationFailed)
    }
}
