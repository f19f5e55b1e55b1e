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

//! The driver (§2.7, §4.9): one-shot init handshake, then the blocking
//! depth/spend loop, until every tracked output is irrevocably resolved.

use std::io::{Read, Write};

use bitcoin::secp256k1::{All, Secp256k1};

use crate::classifier::{classify, ClassifierInput};
use crate::error::Error;
use crate::feerate::FeerateRange;
use crate::handlers::mutual::handle_mutual;
use crate::handlers::our_unilateral::handle_our_unilateral;
use crate::handlers::their_revoked::handle_their_revoked;
use crate::handlers::their_unilateral::handle_their_unilateral;
use crate::tracked_output::OutputStore;
use crate::types::{CloseType, OnchaindState, OutputType, TxType};
use crate::wire::{
    self, decode, encode, MsgType, OnchainBroadcastTx, OnchainDepth, OnchainHtlc, OnchainInit,
    OnchainInitReply, OnchainKnownPreimage, OnchainSpent, OnchainUnwatchTx,
};

pub struct Driver<S: Read + Write> {
    stream: S,
    secp: Secp256k1<All>,
    store: OutputStore,
    feerate_range: FeerateRange,
}

impl<S: Read + Write> Driver<S> {
    pub fn new(stream: S) -> Self {
        Driver {
            stream,
            secp: Secp256k1::new(),
            store: OutputStore::new(),
            feerate_range: FeerateRange::from_commitment_feerate(0),
        }
    }

    /// Runs the full engine lifecycle to completion: init handshake,
    /// classification, handler dispatch, then the depth/spend loop until
    /// every tracked output has depth ≥ 100 (§4.9 termination condition).
    pub fn run(&mut self) -> Result<(), Error> {
        let init = self.read_init()?;
        let num_htlcs = init.num_htlcs as usize;
        let htlcs = self.read_htlcs(num_htlcs)?;

        self.feerate_range = FeerateRange::from_commitment_feerate(init.feerate_per_kw);

        let funding_outpoint = init
            .spending_tx
            .input
            .get(0)
            .ok_or_else(|| Error::internal("spending tx has no inputs"))?
            .previous_output;

        let classifier_input = ClassifierInput {
            spending_tx: &init.spending_tx,
            our_broadcast_txid: init.our_broadcast_txid,
            our_closing_scriptpubkey: &init.our_closing_scriptpubkey,
            their_closing_scriptpubkey: &init.their_closing_scriptpubkey,
            is_local_funder: init.is_local_funder,
            local_payment_basepoint: &init.local_payment_basepoint,
            remote_payment_basepoint: &init.remote_payment_basepoint,
            shachain: &init.shachain,
            revocations_received: init.revocations_received,
        };
        let classified = classify(&classifier_input)?;

        // Tracked and resolved for every close type, not only the mutual
        // path: this is what makes a genuine re-spend of the funding output
        // (§4.9's `FUNDING_OUTPUT` dispatch branch) detectable as a fatal
        // condition regardless of how the channel closed.
        let funding_handle = self.store.new_tracked_output(
            TxType::FundingTransaction,
            funding_outpoint.txid,
            init.spending_tx_blockheight,
            funding_outpoint.vout,
            init.funding_amount_sat,
            OutputType::FundingOutput,
        );

        let state = match classified.close_type {
            CloseType::Mutual => {
                handle_mutual(&mut self.store, funding_handle, init.spending_tx.txid());
                OnchaindState::Mutual
            }
            CloseType::OurUnilateral => {
                let commit_num = classified
                    .commit_num
                    .ok_or_else(|| Error::internal("OurUnilateral classification missing commit_num"))?;
                self.store
                    .resolved_by_other(funding_handle, init.spending_tx.txid(), TxType::OurUnilateral);
                handle_our_unilateral(
                    &self.secp,
                    &init,
                    &htlcs,
                    commit_num,
                    &mut self.feerate_range,
                    &mut self.store,
                )?;
                OnchaindState::OurUnilateral
            }
            CloseType::TheirUnilateralPrevious | CloseType::TheirUnilateralCurrent => {
                self.store
                    .resolved_by_other(funding_handle, init.spending_tx.txid(), TxType::TheirUnilateral);
                handle_their_unilateral(&self.secp, &init, &htlcs, classified.close_type, &mut self.store)?;
                OnchaindState::TheirUnilateral
            }
            CloseType::TheirRevoked => {
                let commit_num = classified
                    .commit_num
                    .ok_or_else(|| Error::internal("TheirRevoked classification missing commit_num"))?;
                handle_their_revoked(commit_num)?;
                unreachable!("handle_their_revoked always returns Err")
            }
        };

        log::info!("classified as {:?}, tracking {} output(s)", state, self.store.len());
        self.send_init_reply(state)?;
        self.wait_for_resolved()
    }

    fn read_init(&mut self) -> Result<OnchainInit, Error> {
        let frame = wire::read_frame(&mut self.stream).map_err(Error::from)?;
        if frame.msg_type != MsgType::OnchainInit {
            return Err(Error::bad_command(format!(
                "expected onchain_init, got {:?}",
                frame.msg_type
            )));
        }
        decode(&frame.payload).map_err(Error::from)
    }

    fn read_htlcs(&mut self, num_htlcs: usize) -> Result<Vec<OnchainHtlc>, Error> {
        let mut htlcs = Vec::with_capacity(num_htlcs);
        for _ in 0..num_htlcs {
            let frame = wire::read_frame(&mut self.stream).map_err(Error::from)?;
            if frame.msg_type != MsgType::OnchainHtlc {
                return Err(Error::bad_command(format!(
                    "expected onchain_htlc, got {:?}",
                    frame.msg_type
                )));
            }
            htlcs.push(decode(&frame.payload)?);
        }
        Ok(htlcs)
    }

    fn send_init_reply(&mut self, state: OnchaindState) -> Result<(), Error> {
        let payload = encode(&OnchainInitReply { state })?;
        wire::write_frame(&mut self.stream, MsgType::OnchainInitReply, &payload).map_err(Error::from)
    }

    fn send_broadcast(&mut self, tx: bitcoin::Transaction) -> Result<(), Error> {
        let payload = encode(&OnchainBroadcastTx { tx })?;
        wire::write_frame(&mut self.stream, MsgType::OnchainBroadcastTx, &payload).map_err(Error::from)
    }

    fn send_unwatch(&mut self, txid: bitcoin::Txid, num_outputs: u32) -> Result<(), Error> {
        let payload = encode(&OnchainUnwatchTx { txid, num_outputs })?;
        wire::write_frame(&mut self.stream, MsgType::OnchainUnwatchTx, &payload).map_err(Error::from)
    }

    /// §4.9 `wait_for_resolved`: the single blocking read point in the
    /// whole engine.
    fn wait_for_resolved(&mut self) -> Result<(), Error> {
        while !self.store.all_irrevocably_resolved() {
            let frame = wire::read_frame(&mut self.stream).map_err(Error::from)?;
            match frame.msg_type {
                MsgType::OnchainDepth => self.handle_depth(decode(&frame.payload)?)?,
                MsgType::OnchainSpent => self.handle_spent(decode(&frame.payload)?)?,
                MsgType::OnchainKnownPreimage => {
                    let _msg: OnchainKnownPreimage = decode(&frame.payload)?;
                    log::warn!("preimage-driven HTLC sweep is not implemented (handle_preimage, §9)");
                }
                other => return Err(Error::bad_command(format!("unexpected message in depth/spend loop: {:?}", other))),
            }
        }
        Ok(())
    }

    fn handle_depth(&mut self, msg: OnchainDepth) -> Result<(), Error> {
        self.store.update_depth(msg.txid, msg.depth)?;
        for handle in self.store.proposals_meeting_depth(msg.txid, msg.depth) {
            let proposal = self.store.get(handle).proposal.clone();
            match proposal.and_then(|p| p.tx) {
                Some(tx) => {
                    log::info!("depth {} reached for {}, broadcasting {}", msg.depth, msg.txid, tx.txid());
                    self.send_broadcast(tx)?;
                }
                None => {
                    log::debug!("depth {} reached for {}, ignoring output", msg.depth, msg.txid);
                    self.store.ignore(handle);
                }
            }
        }
        Ok(())
    }

    fn handle_spent(&mut self, msg: OnchainSpent) -> Result<(), Error> {
        let input = msg
            .tx
            .input
            .get(msg.input_num as usize)
            .ok_or_else(|| Error::bad_command("onchain_spent input_num out of range"))?;
        let spent_txid = input.previous_output.txid;
        let spent_outnum = input.previous_output.vout;

        let Some(handle) = self.store.find(spent_txid, spent_outnum) else {
            self.send_unwatch(spent_txid, 1)?;
            return Ok(());
        };

        // Outputs that are tracked only to be ignored (the funding output,
        // and our own side's commitment payouts) are resolved the moment a
        // handler recognizes them, long before any spend notification
        // arrives. A notification against one of those is either the
        // expected confirmation of that resolution (nothing to do — depth
        // tracking is handled by `handle_depth`) or proof that something
        // we believed settled was actually spent a second time, which this
        // engine cannot reconcile (§4.9, §9).
        if let Some(resolution) = self.store.get(handle).resolution {
            if resolution.spending_txid == msg.tx.txid() {
                return Ok(());
            }
            return Err(Error::internal(format!(
                "tracked output {}:{} re-spent by {} after already resolving via {}",
                spent_txid, spent_outnum, msg.tx.txid(), resolution.spending_txid
            )));
        }

        if self.store.resolved_by_proposal(handle, msg.tx.txid()) {
            return Ok(());
        }

        match self.store.get(handle).output_type {
            OutputType::OutputToUs | OutputType::DelayedOutputToUs => {
                self.store.unknown_spend(handle, &msg.tx);
            }
            OutputType::TheirHtlc => {
                // The timeout path resolves this on depth; a spend here
                // (the preimage path) doesn't change our bookkeeping.
            }
            OutputType::OurHtlc => {
                log::warn!("counterparty spent our HTLC output; preimage learning is not implemented (§9)");
            }
            OutputType::FundingOutput | OutputType::OutputToThem | OutputType::DelayedOutputToThem => {
                return Err(Error::internal(format!(
                    "unexpected unresolved spend of tracked output type {:?}",
                    self.store.get(handle).output_type
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use bitcoin::blockdata::transaction::{OutPoint, TxIn, TxOut};
    use bitcoin::hashes::Hash;
    use bitcoin::{PackedLockTime, Script, Sequence, Transaction, Txid, Witness};

    use super::*;
    use crate::wire::OnchainSpent;

    fn new_driver() -> Driver<Cursor<Vec<u8>>> {
        Driver::new(Cursor::new(Vec::new()))
    }

    fn dummy_tx(spending: OutPoint) -> Transaction {
        dummy_tx_with_value(spending, 1_000)
    }

    fn dummy_tx_with_value(spending: OutPoint, value: u64) -> Transaction {
        Transaction {
            version: 2,
            lock_time: PackedLockTime(0),
            input: vec![TxIn {
                previous_output: spending,
                script_sig: Script::new(),
                sequence: Sequence(0),
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value,
                script_pubkey: Script::new(),
            }],
        }
    }

    /// §8 scenario 5: once the funding output has resolved (by whichever
    /// close type), a later notification reporting a *different* spend of
    /// it is a fatal, unreconcilable condition.
    #[test]
    fn funding_output_respent_by_a_different_tx_is_fatal() {
        let mut driver = new_driver();
        let funding_txid = Txid::from_inner([1u8; 32]);
        let closing_tx = dummy_tx(OutPoint::new(funding_txid, 0));
        let handle = driver.store.new_tracked_output(
            TxType::FundingTransaction,
            funding_txid,
            100,
            0,
            1_000_000,
            OutputType::FundingOutput,
        );
        driver
            .store
            .resolved_by_other(handle, closing_tx.txid(), TxType::MutualClose);

        let other_spend = dummy_tx_with_value(OutPoint::new(funding_txid, 0), 999);
        assert_ne!(other_spend.txid(), closing_tx.txid());
        let msg = OnchainSpent {
            tx: other_spend,
            input_num: 0,
            blockheight: 701,
        };
        assert!(driver.handle_spent(msg).is_err());
    }

    /// A second notification of the very same spend that already resolved
    /// the output (e.g. a duplicate relay) is not an error.
    #[test]
    fn duplicate_notification_of_the_expected_spend_is_not_fatal() {
        let mut driver = new_driver();
        let funding_txid = Txid::from_inner([2u8; 32]);
        let closing_tx = dummy_tx(OutPoint::new(funding_txid, 0));
        let handle = driver.store.new_tracked_output(
            TxType::FundingTransaction,
            funding_txid,
            100,
            0,
            1_000_000,
            OutputType::FundingOutput,
        );
        driver
            .store
            .resolved_by_other(handle, closing_tx.txid(), TxType::MutualClose);

        let msg = OnchainSpent {
            tx: closing_tx,
            input_num: 0,
            blockheight: 701,
        };
        assert!(driver.handle_spent(msg).is_ok());
    }

    /// §8 scenario 6: a spend notification for an outpoint this engine
    /// never tracked results in a single `unwatch_tx` and nothing else.
    #[test]
    fn irrelevant_spend_is_unwatched() {
        let mut driver = new_driver();
        let untracked_txid = Txid::from_inner([3u8; 32]);
        let msg = OnchainSpent {
            tx: dummy_tx(OutPoint::new(untracked_txid, 0)),
            input_num: 0,
            blockheight: 701,
        };
        driver.handle_spent(msg).unwrap();

        driver.stream.set_position(0);
        let frame = wire::read_frame(&mut driver.stream).unwrap();
        assert_eq!(frame.msg_type, MsgType::OnchainUnwatchTx);
        let unwatch: OnchainUnwatchTx = decode(&frame.payload).unwrap();
        assert_eq!(unwatch.txid, untracked_txid);
        assert_eq!(unwatch.num_outputs, 1);
    }
}
