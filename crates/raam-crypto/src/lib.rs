//! Cryptographic core for RAAM.
//!
//! Everything in this crate is pure and synchronous:
//!
//! - [`Sponge`] — the ternary sponge hash H (243-trit rate)
//! - [`subseed`] — per-leaf seed derivation
//! - [`ots`] — Winternitz-style one-time signatures over balanced ternary
//! - [`MerkleTree`] — the channel key tree with auth paths
//! - [`StreamCipher`] — keyed sponge encryption for message payloads

pub mod cipher;
pub mod error;
pub mod merkle;
pub mod ots;
pub mod sponge;
pub mod subseed;

pub use cipher::StreamCipher;
pub use error::{CryptoError, CryptoResult};
pub use merkle::{recover_root, verify_path, Leaf, MerkleTree, TreeOptions, TreeProgress};
pub use sponge::{Sponge, HASH_TRITS, HASH_TRYTES};
pub use subseed::subseed;
