//! Newline-delimited JSON key file: append-only writer and tree loader.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use raam_crypto::{Leaf, MerkleTree};
use raam_trits::{trits_to_trytes, trytes_to_trits, Trit};

use crate::error::{KeystoreError, KeystoreResult};

/// One line of the key file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyRecord {
    /// A tree leaf: one-time keypair at height 0.
    Leaf {
        public: String,
        private: String,
        index: u64,
        height: usize,
    },
    /// An internal hash at `height` ≥ 1; `index` is the position within
    /// the level.
    Node {
        hash: String,
        index: u64,
        height: usize,
    },
}

/// Append-only key-file writer.
pub struct KeyFileWriter {
    writer: BufWriter<File>,
}

impl KeyFileWriter {
    /// Open (or create) a key file for appending.
    pub fn open(path: &Path) -> KeystoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn append(&mut self, record: &KeyRecord) -> KeystoreResult<()> {
        let line = serde_json::to_string(record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Append one leaf keypair.
    pub fn append_leaf(&mut self, leaf: &Leaf) -> KeystoreResult<()> {
        let record = KeyRecord::Leaf {
            public: trits_to_trytes(&leaf.public)?,
            private: trits_to_trytes(&leaf.private)?,
            index: leaf.index,
            height: 0,
        };
        self.append(&record)
    }

    /// Append one internal hash.
    pub fn append_node(&mut self, height: usize, index: u64, hash: &[Trit]) -> KeystoreResult<()> {
        let record = KeyRecord::Node {
            hash: trits_to_trytes(hash)?,
            index,
            height,
        };
        self.append(&record)
    }

    /// Append a whole tree: every leaf, then every internal level bottom-up.
    pub fn append_tree(&mut self, tree: &MerkleTree) -> KeystoreResult<()> {
        for position in 0..tree.capacity() {
            self.append_leaf(tree.leaf(position)?)?;
        }
        for height in 1..=tree.height() {
            for (index, hash) in tree.level(height).iter().enumerate() {
                self.append_node(height, index as u64, hash)?;
            }
        }
        self.flush()
    }

    pub fn flush(&mut self) -> KeystoreResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Load a key file and rehydrate the tree. Unparseable lines (torn
/// appends) are skipped with a warning; structural gaps are errors.
pub fn load_tree(path: &Path) -> KeystoreResult<MerkleTree> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut leaves: BTreeMap<u64, Leaf> = BTreeMap::new();
    let mut nodes: BTreeMap<(usize, u64), Vec<Trit>> = BTreeMap::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: KeyRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = line_number + 1, error = %e, "skipping malformed key-file line");
                continue;
            }
        };
        match record {
            KeyRecord::Leaf {
                public,
                private,
                index,
                ..
            } => {
                leaves.insert(
                    index,
                    Leaf {
                        index,
                        private: trytes_to_trits(&private)?,
                        public: trytes_to_trits(&public)?,
                    },
                );
            }
            KeyRecord::Node {
                hash,
                index,
                height,
            } => {
                if height == 0 {
                    warn!(line = line_number + 1, "skipping node record at height 0");
                    continue;
                }
                nodes.insert((height, index), trytes_to_trits(&hash)?);
            }
        }
    }

    if leaves.is_empty() {
        return Err(KeystoreError::Malformed("no leaf records".into()));
    }
    let height = nodes
        .keys()
        .map(|&(height, _)| height)
        .max()
        .ok_or_else(|| KeystoreError::Malformed("no node records".into()))?;

    let first = leaves
        .values()
        .next()
        .map(|leaf| (leaf.index, leaf.public.len()))
        .unwrap_or((0, 0));
    let (offset, public_width) = first;
    if public_width == 0 || public_width % 243 != 0 {
        return Err(KeystoreError::Malformed(format!(
            "leaf public width {public_width} is not a whole number of grams"
        )));
    }
    let security = public_width / 243;

    let ordered: Vec<Leaf> = leaves.into_values().collect();
    let mut upper_levels = Vec::with_capacity(height);
    for level in 1..=height {
        let expected = (1u64 << height) >> level;
        let mut hashes = Vec::with_capacity(expected as usize);
        for index in 0..expected {
            let hash = nodes.remove(&(level, index)).ok_or_else(|| {
                KeystoreError::Malformed(format!("missing node at height {level}, index {index}"))
            })?;
            hashes.push(hash);
        }
        upper_levels.push(hashes);
    }

    let tree = MerkleTree::from_parts(height, security, offset, ordered, upper_levels)?;
    info!(
        height,
        security,
        offset,
        "key file loaded"
    );
    Ok(tree)
}
