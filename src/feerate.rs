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

//! Feerate inference (§3 "FeerateRange", §4.6, §8). The protocol never
//! transmits the feerate alongside a counterparty signature, so the engine
//! must recover it by trial verification; this narrowing interval is the
//! running belief about what that feerate actually is.

use crate::error::Error;

/// `[min, max]` inclusive bound on the feerate (sat/kW) the counterparty
/// used when signing some transaction whose fee we cannot read directly off
/// the chain. Monotonically narrowing: every update may only shrink the
/// interval (§8).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FeerateRange {
    pub min: u32,
    pub max: u32,
}

impl FeerateRange {
    /// Seeds the range from the commitment transaction's own feerate, which
    /// is known exactly (it was negotiated and is in `onchain_init`). Until
    /// narrowed further this is a degenerate single-point range.
    pub fn from_commitment_feerate(feerate_per_kw: u32) -> Self {
        FeerateRange {
            min: feerate_per_kw,
            max: feerate_per_kw,
        }
    }

    /// Narrows the range to `[new_min, new_max]`, which must lie within the
    /// current range. Violating monotonicity (growing the interval, or
    /// `new_min > new_max`) is an internal-error condition per §3/§8: the
    /// caller should treat `Err` as fatal, not recoverable.
    pub fn narrow(&mut self, new_min: u32, new_max: u32) -> Result<(), Error> {
        if new_min > new_max {
            return Err(Error::internal(format!(
                "feerate range collapsed: min {} > max {}",
                new_min, new_max
            )));
        }
        if new_min < self.min || new_max > self.max {
            return Err(Error::internal(format!(
                "feerate range would widen: current [{}, {}], proposed [{}, {}]",
                self.min, self.max, new_min, new_max
            )));
        }
        self.min = new_min;
        self.max = new_max;
        Ok(())
    }

    /// Narrows the range to a single inferred feerate `f`, as happens once
    /// the HTLC-timeout brute-force search (§4.6a) finds a match.
    pub fn narrow_to(&mut self, feerate: u32) -> Result<(), Error> {
        self.narrow(feerate, feerate)
    }

    /// Candidate feerates to try, descending from `max` to `min` ("more
    /// likely to be near max" — §9). Callers must not depend on this order
    /// for correctness, only for early termination on the first match.
    pub fn candidates_desc(&self) -> impl Iterator<Item = u32> {
        (self.min..=self.max).rev()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn narrow_shrinks_only() {
        let mut range = FeerateRange { min: 100, max: 1000 };
        assert!(range.narrow(200, 900).is_ok());
        assert_eq!(range, FeerateRange { min: 200, max: 900 });
        assert!(range.narrow(100, 900).is_err());
        assert!(range.narrow(200, 1000).is_err());
    }

    #[test]
    fn narrow_to_point_is_idempotent() {
        let mut range = FeerateRange { min: 100, max: 1000 };
        assert!(range.narrow_to(500).is_ok());
        assert_eq!(range.min, 500);
        assert_eq!(range.max, 500);
        assert!(range.narrow_to(500).is_ok());
        assert!(range.narrow_to(499).is_err());
    }

    #[test]
    fn candidates_descend_from_max() {
        let range = FeerateRange { min: 10, max: 13 };
        assert_eq!(range.candidates_desc().collect::<Vec<_>>(), vec![13, 12, 11, 10]);
    }
}
