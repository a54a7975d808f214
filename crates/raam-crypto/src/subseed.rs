//! Per-leaf seed derivation.

use raam_trits::{add_int, Trit};

use crate::sponge::{Sponge, HASH_TRITS};

/// Derive the subseed for a leaf: H(seed + index), where the addition is
/// carry-propagating balanced-ternary increment over the seed trits.
pub fn subseed(seed: &[Trit], index: u64) -> Vec<Trit> {
    let incremented = add_int(seed, index);
    Sponge::hash(&incremented, HASH_TRITS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raam_trits::trytes_to_trits;

    fn seed() -> Vec<Trit> {
        trytes_to_trits(&"A".repeat(81)).unwrap()
    }

    #[test]
    fn deterministic() {
        assert_eq!(subseed(&seed(), 5), subseed(&seed(), 5));
    }

    #[test]
    fn distinct_per_index() {
        let s = seed();
        assert_ne!(subseed(&s, 0), subseed(&s, 1));
        assert_ne!(subseed(&s, 1), subseed(&s, 2));
    }

    #[test]
    fn always_one_hash_wide() {
        assert_eq!(subseed(&seed(), 0).len(), HASH_TRITS);
        assert_eq!(subseed(&seed(), u32::MAX as u64).len(), HASH_TRITS);
    }
}
