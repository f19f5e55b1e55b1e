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

//! §4.2 Mutual close handler: there is exactly one thing left to resolve.
//! The funding `TrackedOutput` itself is created by the driver before
//! dispatch (every close type resolves it, not just this one — §4.9's
//! `FUNDING_OUTPUT` spend-dispatch branch only makes sense if it is always
//! tracked); this handler just supplies the `MUTUAL_CLOSE` resolution.

use bitcoin::Txid;

use crate::tracked_output::{OutputHandle, OutputStore};
use crate::types::TxType;

/// Resolves the already-tracked funding output by `MUTUAL_CLOSE`.
pub fn handle_mutual(store: &mut OutputStore, funding_handle: OutputHandle, mutual_close_txid: Txid) {
    store.resolved_by_other(funding_handle, mutual_close_txid, TxType::MutualClose);
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::hashes::Hash;
    use crate::types::OutputType;

    #[test]
    fn funding_output_resolves_by_mutual_close() {
        let mut store = OutputStore::new();
        let funding_txid = Txid::from_inner([1u8; 32]);
        let mutual_txid = Txid::from_inner([2u8; 32]);
        let handle = store.new_tracked_output(
            TxType::FundingTransaction,
            funding_txid,
            100,
            0,
            1_000_000,
            OutputType::FundingOutput,
        );
        handle_mutual(&mut store, handle, mutual_txid);
        let out = store.get(handle);
        assert!(out.is_resolved());
        assert_eq!(out.resolution.unwrap().spending_txid, mutual_txid);
        assert_eq!(out.resolution.unwrap().tx_type, TxType::MutualClose);
    }
}
