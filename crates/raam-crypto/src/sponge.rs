//! The ternary sponge hash H.
//!
//! State is 486 trits: a 243-trit rate half and a 243-trit capacity half.
//! Absorption overwrites the rate half one block at a time (zero-padding the
//! final partial block) and permutes; squeezing copies the rate half out and
//! permutes after every extracted block, so consecutive squeezes always
//! produce fresh output.
//!
//! `absorb` may be called any number of times before the first `squeeze`.
//! Absorbing after a squeeze is a contract violation that requires an
//! explicit [`Sponge::reset`] first.

use raam_trits::Trit;

/// Width of one hash block and of the sponge rate, in trits.
pub const HASH_TRITS: usize = 243;

/// Width of one hash block in trytes.
pub const HASH_TRYTES: usize = HASH_TRITS / 3;

const STATE_TRITS: usize = 2 * HASH_TRITS;
const ROUNDS: usize = 27;

/// Index hop between the two substitution inputs; coprime with the state
/// width so one round reads every position exactly twice.
const ROTATION: usize = 245;

/// Substitution box indexed by `a + 4b + 5` for trits `a`, `b`. Indices 3
/// and 7 are unreachable.
const SBOX: [i8; 11] = [1, 0, -1, 0, 1, -1, 0, 0, -1, 1, 0];

/// The sponge hash H with `init`/`absorb`/`squeeze`/`reset` operations.
#[derive(Clone)]
pub struct Sponge {
    state: [Trit; STATE_TRITS],
    squeezed: bool,
}

impl Default for Sponge {
    fn default() -> Self {
        Self::new()
    }
}

impl Sponge {
    /// A fresh all-zero sponge.
    pub fn new() -> Self {
        Self {
            state: [0; STATE_TRITS],
            squeezed: false,
        }
    }

    /// Clear the state so the sponge can absorb again.
    pub fn reset(&mut self) {
        self.state = [0; STATE_TRITS];
        self.squeezed = false;
    }

    /// Absorb input trits in 243-trit blocks, zero-padding the last block.
    ///
    /// # Panics
    ///
    /// Panics if called after `squeeze` without an intervening `reset`.
    pub fn absorb(&mut self, trits: &[Trit]) {
        assert!(
            !self.squeezed,
            "sponge must be reset before absorbing again"
        );
        if trits.is_empty() {
            self.state[..HASH_TRITS].fill(0);
            self.transform();
            return;
        }
        for block in trits.chunks(HASH_TRITS) {
            self.state[..block.len()].copy_from_slice(block);
            self.state[block.len()..HASH_TRITS].fill(0);
            self.transform();
        }
    }

    /// Squeeze `len` output trits, permuting after every extracted block.
    pub fn squeeze(&mut self, len: usize) -> Vec<Trit> {
        self.squeezed = true;
        let mut out = Vec::with_capacity(len);
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(HASH_TRITS);
            out.extend_from_slice(&self.state[..take]);
            self.transform();
            remaining -= take;
        }
        out
    }

    /// One-shot convenience: absorb `input`, squeeze `len` trits.
    pub fn hash(input: &[Trit], len: usize) -> Vec<Trit> {
        let mut sponge = Self::new();
        sponge.absorb(input);
        sponge.squeeze(len)
    }

    fn transform(&mut self) {
        let mut next = [0 as Trit; STATE_TRITS];
        for _ in 0..ROUNDS {
            let mut index = 0usize;
            for slot in next.iter_mut() {
                let a = self.state[index];
                index = (index + ROTATION) % STATE_TRITS;
                let b = self.state[index];
                *slot = SBOX[(a + 4 * b + 5) as usize];
            }
            self.state.copy_from_slice(&next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(seed: i8) -> Vec<Trit> {
        (0..HASH_TRITS as i32)
            .map(|i| (((i + i32::from(seed)) % 3) - 1) as Trit)
            .collect()
    }

    #[test]
    fn hash_is_deterministic() {
        let data = input(1);
        assert_eq!(Sponge::hash(&data, 243), Sponge::hash(&data, 243));
    }

    #[test]
    fn different_inputs_diverge() {
        assert_ne!(Sponge::hash(&input(0), 243), Sponge::hash(&input(1), 243));
    }

    #[test]
    fn output_is_balanced_trits() {
        for t in Sponge::hash(&input(2), 486) {
            assert!((-1..=1).contains(&t));
        }
    }

    #[test]
    fn block_aligned_absorb_can_be_split() {
        let a = input(0);
        let b = input(1);
        let joined: Vec<Trit> = a.iter().chain(b.iter()).copied().collect();

        let mut split = Sponge::new();
        split.absorb(&a);
        split.absorb(&b);

        assert_eq!(Sponge::hash(&joined, 243), split.squeeze(243));
    }

    #[test]
    fn sequential_squeezes_continue_the_stream() {
        let mut one_shot = Sponge::new();
        one_shot.absorb(&input(3));
        let full = one_shot.squeeze(486);

        let mut stepwise = Sponge::new();
        stepwise.absorb(&input(3));
        let mut parts = stepwise.squeeze(243);
        parts.extend(stepwise.squeeze(243));

        assert_eq!(full, parts);
    }

    #[test]
    fn squeeze_blocks_differ() {
        let out = Sponge::hash(&input(4), 486);
        assert_ne!(out[..243], out[243..]);
    }

    #[test]
    fn reset_restores_fresh_state() {
        let mut sponge = Sponge::new();
        sponge.absorb(&input(5));
        sponge.squeeze(243);
        sponge.reset();
        sponge.absorb(&input(5));
        assert_eq!(sponge.squeeze(243), Sponge::hash(&input(5), 243));
    }

    #[test]
    #[should_panic(expected = "reset")]
    fn absorb_after_squeeze_panics() {
        let mut sponge = Sponge::new();
        sponge.absorb(&input(6));
        sponge.squeeze(1);
        sponge.absorb(&input(6));
    }

    #[test]
    fn partial_block_is_padded() {
        let short = &input(7)[..10];
        let padded: Vec<Trit> = {
            let mut v = short.to_vec();
            v.resize(HASH_TRITS, 0);
            v
        };
        assert_eq!(Sponge::hash(short, 243), Sponge::hash(&padded, 243));
    }
}
