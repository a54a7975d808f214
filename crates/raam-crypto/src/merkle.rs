//! The channel key tree.
//!
//! Construction is an incremental stack walk: each leaf keypair is derived
//! from its subseed and pushed at level 0; whenever the two top entries
//! share a level they merge into their parent. When the last leaf has been
//! merged the stack holds exactly one entry, the channel root. The stack
//! order makes every level's nodes appear left to right, so the finished
//! tree keeps a per-level node table for auth-path extraction.

use std::time::{Duration, Instant};

use tracing::info;

use raam_trits::Trit;

use crate::error::{CryptoError, CryptoResult};
use crate::ots;
use crate::sponge::Sponge;
use crate::subseed::subseed;

/// A level-0 tree entry: one one-time keypair.
#[derive(Clone, Debug)]
pub struct Leaf {
    /// Absolute leaf index (construction offset included).
    pub index: u64,
    /// One-time private key, `security · 27 · 243` trits.
    pub private: Vec<Trit>,
    /// Leaf hash: the one-time verifying key, `security · 243` trits.
    pub public: Vec<Trit>,
}

/// Construction parameters for [`MerkleTree::generate`].
#[derive(Clone, Copy, Debug)]
pub struct TreeOptions {
    /// Tree height; capacity is `2^height`.
    pub height: usize,
    /// Security level in 1..=4.
    pub security: usize,
    /// Absolute index of the first leaf.
    pub offset: u64,
}

/// Advisory construction progress: work completed since the last report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeProgress {
    /// Leaf keypairs derived since the last report.
    pub leaves: usize,
    /// Internal nodes produced since the last report, as (level, count).
    pub nodes_by_level: Vec<(usize, usize)>,
}

/// The channel Merkle tree: leaves plus every internal level up to the root.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    height: usize,
    security: usize,
    offset: u64,
    leaves: Vec<Leaf>,
    /// `levels[l]` holds the hashes at level `l`; `levels[0]` mirrors the
    /// leaf publics and `levels[height]` holds the single root.
    levels: Vec<Vec<Vec<Trit>>>,
}

pub(crate) fn validate_height(height: usize) -> CryptoResult<()> {
    if (1..=26).contains(&height) {
        Ok(())
    } else {
        Err(CryptoError::InvalidHeight(height))
    }
}

/// Hash two sibling hashes into their parent.
fn node_hash(left: &[Trit], right: &[Trit]) -> Vec<Trit> {
    let mut sponge = Sponge::new();
    sponge.absorb(left);
    sponge.absorb(right);
    sponge.squeeze(left.len())
}

impl MerkleTree {
    /// Deterministically construct the tree for `(seed, height, security,
    /// offset)`.
    pub fn generate(seed: &[Trit], options: &TreeOptions) -> CryptoResult<Self> {
        Self::build(seed, options, None)
    }

    /// Like [`MerkleTree::generate`], reporting progress at most once per
    /// `interval`. Reports are advisory and never affect the result.
    pub fn generate_with_progress(
        seed: &[Trit],
        options: &TreeOptions,
        interval: Duration,
        on_progress: &mut dyn FnMut(TreeProgress),
    ) -> CryptoResult<Self> {
        Self::build(seed, options, Some((interval, on_progress)))
    }

    fn build(
        seed: &[Trit],
        options: &TreeOptions,
        mut progress: Option<(Duration, &mut dyn FnMut(TreeProgress))>,
    ) -> CryptoResult<Self> {
        validate_height(options.height)?;
        ots::validate_security(options.security)?;

        let capacity = 1u64 << options.height;
        let mut leaves = Vec::with_capacity(capacity as usize);
        let mut levels: Vec<Vec<Vec<Trit>>> = vec![Vec::new(); options.height + 1];

        // Merge stack of (hash, level).
        let mut stack: Vec<(Vec<Trit>, usize)> = Vec::with_capacity(options.height + 1);

        let mut pending = TreeProgress::default();
        let mut pending_nodes = vec![0usize; options.height + 1];
        let mut last_report = Instant::now();

        for position in 0..capacity {
            let index = options.offset + position;
            let leaf_subseed = subseed(seed, index);
            let private = ots::generate_private_key(&leaf_subseed, options.security)?;
            let public = ots::verifying_key(&private)?;

            levels[0].push(public.clone());
            leaves.push(Leaf {
                index,
                private,
                public: public.clone(),
            });
            stack.push((public, 0));
            pending.leaves += 1;

            while stack.len() >= 2 && stack[stack.len() - 1].1 == stack[stack.len() - 2].1 {
                let (right, level) = stack.pop().unwrap_or_default();
                let (left, _) = stack.pop().unwrap_or_default();
                let parent = node_hash(&left, &right);
                levels[level + 1].push(parent.clone());
                pending_nodes[level + 1] += 1;
                stack.push((parent, level + 1));
            }

            if let Some((interval, callback)) = progress.as_mut() {
                if last_report.elapsed() >= *interval {
                    pending.nodes_by_level = pending_nodes
                        .iter()
                        .enumerate()
                        .filter(|&(_, &count)| count > 0)
                        .map(|(level, &count)| (level, count))
                        .collect();
                    callback(std::mem::take(&mut pending));
                    pending_nodes.fill(0);
                    last_report = Instant::now();
                }
            }
        }

        if let Some((_, callback)) = progress {
            pending.nodes_by_level = pending_nodes
                .iter()
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .map(|(level, &count)| (level, count))
                .collect();
            if pending.leaves > 0 || !pending.nodes_by_level.is_empty() {
                callback(pending);
            }
        }

        info!(
            height = options.height,
            security = options.security,
            offset = options.offset,
            "merkle tree constructed"
        );

        Ok(Self {
            height: options.height,
            security: options.security,
            offset: options.offset,
            leaves,
            levels,
        })
    }

    /// Rebuild a tree from persisted leaves and internal level tables.
    /// `upper_levels[l]` holds level `l + 1`; leaves must be sorted by
    /// absolute index and contiguous from `offset`.
    pub fn from_parts(
        height: usize,
        security: usize,
        offset: u64,
        leaves: Vec<Leaf>,
        upper_levels: Vec<Vec<Vec<Trit>>>,
    ) -> CryptoResult<Self> {
        validate_height(height)?;
        ots::validate_security(security)?;

        let capacity = 1u64 << height;
        if leaves.len() as u64 != capacity {
            return Err(CryptoError::IncompleteTree(format!(
                "expected {capacity} leaves, found {}",
                leaves.len()
            )));
        }
        for (position, leaf) in leaves.iter().enumerate() {
            if leaf.index != offset + position as u64 {
                return Err(CryptoError::IncompleteTree(format!(
                    "leaf index {} out of sequence at position {position}",
                    leaf.index
                )));
            }
        }
        if upper_levels.len() != height {
            return Err(CryptoError::IncompleteTree(format!(
                "expected {height} internal levels, found {}",
                upper_levels.len()
            )));
        }
        for (l, nodes) in upper_levels.iter().enumerate() {
            let expected = (capacity >> (l + 1)) as usize;
            if nodes.len() != expected {
                return Err(CryptoError::IncompleteTree(format!(
                    "level {} has {} nodes, expected {expected}",
                    l + 1,
                    nodes.len()
                )));
            }
        }

        let mut levels = Vec::with_capacity(height + 1);
        levels.push(leaves.iter().map(|leaf| leaf.public.clone()).collect());
        levels.extend(upper_levels);

        Ok(Self {
            height,
            security,
            offset,
            leaves,
            levels,
        })
    }

    /// The channel root, `security · 243` trits.
    pub fn root(&self) -> &[Trit] {
        &self.levels[self.height][0]
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn security(&self) -> usize {
        self.security
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of leaves, `2^height`.
    pub fn capacity(&self) -> u64 {
        1u64 << self.height
    }

    /// The leaf at a channel-local index.
    pub fn leaf(&self, index: u64) -> CryptoResult<&Leaf> {
        self.leaves
            .get(index as usize)
            .ok_or(CryptoError::IncompleteTree(format!(
                "no leaf at index {index}"
            )))
    }

    /// Hashes at one level, leaves first.
    pub fn level(&self, level: usize) -> &[Vec<Trit>] {
        &self.levels[level]
    }

    /// Sibling hashes from leaf to root for a channel-local index: the
    /// sibling at level `l` is node `⌊index / 2^l⌋ XOR 1`.
    pub fn auth_path(&self, index: u64) -> CryptoResult<Vec<Vec<Trit>>> {
        if index >= self.capacity() {
            return Err(CryptoError::IncompleteTree(format!(
                "no leaf at index {index}"
            )));
        }
        let mut path = Vec::with_capacity(self.height);
        for level in 0..self.height {
            let sibling = ((index >> level) ^ 1) as usize;
            path.push(self.levels[level][sibling].clone());
        }
        Ok(path)
    }
}

/// Recompute the root committed to by a leaf key and its auth path.
pub fn recover_root(leaf_public: &[Trit], index: u64, path: &[Vec<Trit>]) -> Vec<Trit> {
    let mut current = leaf_public.to_vec();
    for (level, sibling) in path.iter().enumerate() {
        current = if (index >> level) & 1 == 0 {
            node_hash(&current, sibling)
        } else {
            node_hash(sibling, &current)
        };
    }
    current
}

/// Authenticate a leaf key against a channel root.
pub fn verify_path(
    root: &[Trit],
    leaf_public: &[Trit],
    index: u64,
    path: &[Vec<Trit>],
) -> CryptoResult<()> {
    if recover_root(leaf_public, index, path) == root {
        Ok(())
    } else {
        Err(CryptoError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raam_trits::trytes_to_trits;

    fn seed() -> Vec<Trit> {
        trytes_to_trits(&"A".repeat(81)).unwrap()
    }

    fn options(height: usize) -> TreeOptions {
        TreeOptions {
            height,
            security: 1,
            offset: 0,
        }
    }

    #[test]
    fn root_is_deterministic() {
        let a = MerkleTree::generate(&seed(), &options(2)).unwrap();
        let b = MerkleTree::generate(&seed(), &options(2)).unwrap();
        assert_eq!(a.root(), b.root());
        for i in 0..4 {
            assert_eq!(a.leaf(i).unwrap().private, b.leaf(i).unwrap().private);
        }
    }

    #[test]
    fn progress_timing_does_not_change_the_root() {
        let plain = MerkleTree::generate(&seed(), &options(3)).unwrap();
        let mut reports = Vec::new();
        let with_progress = MerkleTree::generate_with_progress(
            &seed(),
            &options(3),
            Duration::ZERO,
            &mut |p| reports.push(p),
        )
        .unwrap();
        assert_eq!(plain.root(), with_progress.root());
        let total_leaves: usize = reports.iter().map(|p| p.leaves).sum();
        assert_eq!(total_leaves, 8);
        let total_nodes: usize = reports
            .iter()
            .flat_map(|p| p.nodes_by_level.iter().map(|&(_, count)| count))
            .sum();
        assert_eq!(total_nodes, 7);
    }

    #[test]
    fn every_leaf_verifies_against_the_root() {
        let tree = MerkleTree::generate(&seed(), &options(3)).unwrap();
        for i in 0..8 {
            let path = tree.auth_path(i).unwrap();
            assert_eq!(path.len(), 3);
            verify_path(tree.root(), &tree.leaf(i).unwrap().public, i, &path).unwrap();
        }
    }

    #[test]
    fn flipped_trit_breaks_verification() {
        let tree = MerkleTree::generate(&seed(), &options(2)).unwrap();
        let mut path = tree.auth_path(1).unwrap();
        path[0][17] = if path[0][17] == 1 { -1 } else { 1 };
        assert_eq!(
            verify_path(tree.root(), &tree.leaf(1).unwrap().public, 1, &path).unwrap_err(),
            CryptoError::AuthenticationFailed
        );

        let good_path = tree.auth_path(1).unwrap();
        let mut bad_key = tree.leaf(1).unwrap().public.clone();
        bad_key[0] = if bad_key[0] == 1 { -1 } else { 1 };
        assert_eq!(
            verify_path(tree.root(), &bad_key, 1, &good_path).unwrap_err(),
            CryptoError::AuthenticationFailed
        );
    }

    #[test]
    fn wrong_index_breaks_verification() {
        let tree = MerkleTree::generate(&seed(), &options(2)).unwrap();
        let path = tree.auth_path(2).unwrap();
        assert!(verify_path(tree.root(), &tree.leaf(2).unwrap().public, 3, &path).is_err());
    }

    #[test]
    fn height_one_works() {
        let tree = MerkleTree::generate(&seed(), &options(1)).unwrap();
        assert_eq!(tree.capacity(), 2);
        let path = tree.auth_path(0).unwrap();
        assert_eq!(path.len(), 1);
        verify_path(tree.root(), &tree.leaf(0).unwrap().public, 0, &path).unwrap();
    }

    #[test]
    fn offset_changes_leaves_and_root() {
        let base = MerkleTree::generate(&seed(), &options(1)).unwrap();
        let shifted = MerkleTree::generate(
            &seed(),
            &TreeOptions {
                height: 1,
                security: 1,
                offset: 2,
            },
        )
        .unwrap();
        assert_ne!(base.root(), shifted.root());
        assert_eq!(shifted.leaf(0).unwrap().index, 2);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(
            MerkleTree::generate(&seed(), &options(0)).unwrap_err(),
            CryptoError::InvalidHeight(0)
        );
        assert_eq!(
            MerkleTree::generate(&seed(), &options(27)).unwrap_err(),
            CryptoError::InvalidHeight(27)
        );
        let bad = TreeOptions {
            height: 1,
            security: 9,
            offset: 0,
        };
        assert_eq!(
            MerkleTree::generate(&seed(), &bad).unwrap_err(),
            CryptoError::InvalidSecurityLevel(9)
        );
    }

    #[test]
    fn from_parts_roundtrip() {
        let tree = MerkleTree::generate(&seed(), &options(2)).unwrap();
        let leaves = (0..4).map(|i| tree.leaf(i).unwrap().clone()).collect();
        let upper = (1..=2).map(|l| tree.level(l).to_vec()).collect();
        let rebuilt = MerkleTree::from_parts(2, 1, 0, leaves, upper).unwrap();
        assert_eq!(rebuilt.root(), tree.root());
        assert_eq!(rebuilt.auth_path(3).unwrap(), tree.auth_path(3).unwrap());
    }

    #[test]
    fn from_parts_rejects_missing_nodes() {
        let tree = MerkleTree::generate(&seed(), &options(2)).unwrap();
        let leaves: Vec<Leaf> = (0..4).map(|i| tree.leaf(i).unwrap().clone()).collect();
        let mut upper: Vec<Vec<Vec<Trit>>> = (1..=2).map(|l| tree.level(l).to_vec()).collect();
        upper[0].pop();
        assert!(matches!(
            MerkleTree::from_parts(2, 1, 0, leaves, upper).unwrap_err(),
            CryptoError::IncompleteTree(_)
        ));
    }

    #[test]
    fn recovered_root_matches() {
        let tree = MerkleTree::generate(&seed(), &options(2)).unwrap();
        let path = tree.auth_path(3).unwrap();
        assert_eq!(
            recover_root(&tree.leaf(3).unwrap().public, 3, &path),
            tree.root()
        );
    }
}
