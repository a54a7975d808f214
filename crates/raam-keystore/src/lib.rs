//! Key-file persistence for RAAM channel trees.
//!
//! The key file is newline-delimited JSON, appended as material is
//! produced: leaf records carry a keypair at height 0, node records carry
//! one internal hash. Loading buckets leaves by index and nodes by
//! (height, index) and rebuilds the [`raam_crypto::MerkleTree`]; the
//! channel root is the single node at the tree height.

pub mod error;
pub mod keyfile;

pub use error::{KeystoreError, KeystoreResult};
pub use keyfile::{load_tree, KeyFileWriter, KeyRecord};
