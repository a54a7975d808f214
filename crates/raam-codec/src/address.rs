//! Address and cipher-key derivation.
//!
//! All the arithmetic here is carry-free saturating trit addition, so the
//! derivations commute the way the protocol relies on: the public-mode
//! password is `addr − index`, which makes the resulting cipher key
//! `(addr − index) + index` — the address itself.

use raam_crypto::{Sponge, HASH_TRITS};
use raam_trits::{
    add_trits, int_to_trits, pad_trits, subtract_trits, trits_to_trytes, trytes_to_trits, Trit,
};

use crate::error::CodecResult;

/// Derive the ledger address for a message index:
/// `H((root + index) ‖ pad243(password))`, squeezed to 81 trytes.
pub fn derive_address(root: &[Trit], index: u64, password: Option<&str>) -> CodecResult<String> {
    let subroot = add_trits(root, &int_to_trits(index));
    let mut sponge = Sponge::new();
    sponge.absorb(&subroot);
    if let Some(password) = password {
        sponge.absorb(&pad_trits(&trytes_to_trits(password)?, HASH_TRITS));
    }
    Ok(trits_to_trytes(&sponge.squeeze(HASH_TRITS))?)
}

/// Derive the stream-cipher key for a message index. The basis is the
/// message password if given, else the channel password, else the channel
/// root; the key is `trytes(basis + index)`.
pub fn message_key(
    root: &[Trit],
    index: u64,
    channel_password: Option<&str>,
    message_password: Option<&str>,
) -> CodecResult<String> {
    let basis: Vec<Trit> = match (message_password, channel_password) {
        (Some(password), _) => trytes_to_trits(password)?,
        (None, Some(password)) => trytes_to_trits(password)?,
        (None, None) => root.to_vec(),
    };
    let sum = add_trits(&basis, &int_to_trits(index));
    Ok(trits_to_trytes(&pad_trits(&sum, 3))?)
}

/// The message password that makes a message public: `addr − index`, so
/// that the derived cipher key collapses to the address.
pub fn public_password(address: &str, index: u64) -> CodecResult<String> {
    let addr = trytes_to_trits(address)?;
    let difference = subtract_trits(&addr, &int_to_trits(index));
    Ok(trits_to_trytes(&difference)?)
}
