//! Message assembly: framing, encryption, and record packing.

use raam_crypto::StreamCipher;
use raam_trits::{trits_to_trytes, trytes_to_trits, validate_trytes, Trit};

use crate::address::{derive_address, message_key, public_password};
use crate::error::{CodecError, CodecResult};
use crate::header::{Header, INDEX_TRYTES};
use crate::record::{RecordDraft, FRAG_TRYTES};

/// Tag carried by every RAAM record, 27 trytes.
pub const RECORD_TAG: &str = "RAAM99999999999999999999999";

/// Everything needed to pack one message into ledger records. The signature
/// is produced by the caller over [`signing_input`].
pub struct AssembleRequest<'a> {
    pub message: &'a str,
    pub index: u64,
    pub height: usize,
    pub security: usize,
    pub channel_root: &'a [Trit],
    pub channel_password: Option<&'a str>,
    pub message_password: Option<&'a str>,
    pub public_mode: bool,
    pub verifying_key: &'a [Trit],
    pub auth_path: &'a [Vec<Trit>],
    pub next_root: Option<&'a [Trit]>,
    pub signature: &'a [Trit],
}

/// The tryte stream a message signature covers: message ‖ index ‖
/// verifying key ‖ next root (if any) ‖ auth path, converted to trits.
/// Publisher and reader must agree on this exactly.
pub fn signing_input(
    message: &str,
    index: u64,
    verifying_key: &[Trit],
    next_root: Option<&[Trit]>,
    auth_path: &[Vec<Trit>],
) -> CodecResult<Vec<Trit>> {
    let mut stream = String::from(message);
    stream += &raam_trits::int_to_trytes(index, INDEX_TRYTES)?;
    stream += &trits_to_trytes(verifying_key)?;
    if let Some(next_root) = next_root {
        stream += &trits_to_trytes(next_root)?;
    }
    for hash in auth_path {
        stream += &trits_to_trytes(hash)?;
    }
    Ok(trytes_to_trits(&stream)?)
}

/// Assemble a signed message into 2187-tryte record drafts, all carrying
/// the derived address.
pub fn assemble(request: &AssembleRequest<'_>) -> CodecResult<Vec<RecordDraft>> {
    if validate_trytes(request.message).is_err() {
        return Err(CodecError::InvalidMessage);
    }
    if request.public_mode && request.channel_password.is_some() {
        return Err(CodecError::PublicNotAllowed);
    }

    let next_root_security = match request.next_root {
        Some(next_root) => {
            let security = next_root.len() / (3 * 81);
            if next_root.len() % (3 * 81) != 0 || !(1..=4).contains(&security) {
                return Err(CodecError::InvalidSecurityLevel(security));
            }
            security
        }
        None => 0,
    };

    let header = Header {
        index: request.index,
        security: request.security,
        next_root_security,
        height: request.height,
        message_length: request.message.len(),
    };

    let mut payload = header.encode()?;
    payload += request.message;
    payload += &trits_to_trytes(request.verifying_key)?;
    for hash in request.auth_path {
        payload += &trits_to_trytes(hash)?;
    }
    if let Some(next_root) = request.next_root {
        payload += &trits_to_trytes(next_root)?;
    }

    // Pad to whole records before encrypting; the signature stays clear.
    let padded_len = payload.len().div_ceil(FRAG_TRYTES) * FRAG_TRYTES;
    payload.extend(std::iter::repeat('9').take(padded_len - payload.len()));

    let address = derive_address(request.channel_root, request.index, request.channel_password)?;
    let key = if request.public_mode {
        let password = public_password(&address, request.index)?;
        message_key(request.channel_root, request.index, None, Some(&password))?
    } else {
        message_key(
            request.channel_root,
            request.index,
            request.channel_password,
            request.message_password,
        )?
    };

    let mut cipher = StreamCipher::new(&trytes_to_trits(&key)?, None);
    let mut stream = cipher.encrypt(&payload)?;
    stream += &trits_to_trytes(request.signature)?;

    Ok(stream
        .as_bytes()
        .chunks(FRAG_TRYTES)
        .map(|chunk| RecordDraft {
            address: address.clone(),
            message: String::from_utf8_lossy(chunk).into_owned(),
            value: 0,
            tag: RECORD_TAG.to_string(),
        })
        .collect())
}
