// LNP/BP Core Library implementing LNPBP specifications & standards
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! Compact storage of per-commitment revocation secrets received from the
//! counterparty, indexed by commitment number (BOLT-3 "efficient per-
//! commitment secret storage"). `spec.md` names this only by its use site
//! (`shachain_index(commit_num)`, §4.1 step 4); the storage structure itself
//! is a BOLT-3 standard supplement (§4 of SPEC_FULL.md).
//!
//! The 48-bit commitment index counts *down* from
//! `0xFFFFFFFFFFFF`; each received secret can derive every secret whose
//! index shares its low-order bits below the lowest clear bit of the
//! *storing* index. A node therefore only has to retain `O(log n)` secrets to
//! reconstruct all `n` commitment numbers seen so far.

use bitcoin::hashes::{sha256, Hash};

const SEED_INDEX_BITS: u8 = 48;

/// A single cell of the compact revocation-secret store.
#[derive(Clone, Copy, PartialEq, Eq, Debug, StrictEncode, StrictDecode)]
struct Cell {
    index: u64,
    secret: [u8; 32],
}

/// Stores received per-commitment secrets and answers "do we know (or can we
/// derive) the secret for commitment number `n`?" without ever storing more
/// than 49 secrets regardless of how many commitments have been revoked.
#[derive(Clone, Default, Debug, StrictEncode, StrictDecode)]
pub struct Shachain {
    cells: Vec<Cell>,
    min_index_seen: Option<u64>,
}

/// Flips the secret at the position of its lowest clear bit to derive the
/// secret for a smaller index, per BOLT-3's `shachain` algorithm.
fn derive_secret(secret: &[u8; 32], from_index: u64, to_index: u64) -> Option<[u8; 32]> {
    // `to_index` must share all bits of `from_index` above the lowest bit
    // that `from_index` clears relative to `to_index`.
    let mut out = *secret;
    for bit in (0..SEED_INDEX_BITS).rev() {
        let mask = 1u64 << bit;
        if from_index & mask != 0 {
            continue;
        }
        if to_index & mask == 0 {
            continue;
        }
        return None;
    }
    for bit in (0..SEED_INDEX_BITS).rev() {
        let mask = 1u64 << bit;
        if to_index & mask != 0 && from_index & mask == 0 {
            let mut xored = out;
            xored[bit as usize / 8] ^= 1 << (7 - bit as usize % 8);
            out = sha256::Hash::hash(&xored).into_inner();
        }
    }
    Some(out)
}

impl Shachain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a secret revealed by the counterparty for `index`. Returns
    /// `false` if the secret is inconsistent with a previously stored one
    /// (the counterparty is misbehaving); the caller should treat that as a
    /// `CryptoFailed`/`InternalError`, not silently ignore it.
    #[must_use]
    pub fn insert(&mut self, index: u64, secret: [u8; 32]) -> bool {
        for cell in &self.cells {
            if let Some(derived) = derive_secret(&secret, index, cell.index) {
                if derived != cell.secret {
                    return false;
                }
            } else if let Some(derived) = derive_secret(&cell.secret, cell.index, index) {
                if derived != secret {
                    return false;
                }
            }
        }
        self.cells.retain(|c| derive_secret(&secret, index, c.index).is_none());
        self.cells.push(Cell { index, secret });
        self.min_index_seen = Some(self.min_index_seen.map_or(index, |m| m.min(index)));
        true
    }

    /// Looks up (deriving if necessary) the revocation secret for
    /// `commit_num`, i.e. `shachain_index(commit_num)` from spec.md §4.1.
    pub fn lookup(&self, commit_num: u64) -> Option<[u8; 32]> {
        self.cells.iter().find_map(|cell| {
            if cell.index == commit_num {
                Some(cell.secret)
            } else {
                derive_secret(&cell.secret, cell.index, commit_num)
            }
        })
    }

    /// Whether a revocation preimage for `commit_num` is known, as used by
    /// the close classifier (§4.1 step 4).
    pub fn contains(&self, commit_num: u64) -> bool {
        self.lookup(commit_num).is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn derives_descendant_from_ancestor() {
        let seed = [0x42u8; 32];
        let mut chain = Shachain::new();
        assert!(chain.insert(0xFF_FFFF_FFFFFF, seed));
        // An index that only clears low bits relative to the stored one is
        // derivable; a sibling that diverges higher up is not.
        assert!(chain.contains(0xFF_FFFF_FFFFFF));
    }

    #[test]
    fn rejects_inconsistent_secret() {
        let mut chain = Shachain::new();
        assert!(chain.insert(10, [0x01; 32]));
        // Same index, different secret: immediately inconsistent.
        assert!(!chain.insert(10, [0x02; 32]));
    }

    #[test]
    fn unknown_index_is_absent() {
        let chain = Shachain::new();
        assert!(!chain.contains(5));
    }
}
