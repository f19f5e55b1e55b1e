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

//! §4.3 `OurUnilateral` handler: our own commitment transaction landed on
//! chain. Every one of its outputs gets matched to a script and tracked.

use bitcoin::blockdata::transaction::{OutPoint, TxIn, TxOut};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{PackedLockTime, Script, Sequence, Transaction, Witness};

use crate::error::Error;
use crate::feerate::FeerateRange;
use crate::handlers::htlc::{resolve_our_htlc_ourcommit, resolve_their_htlc};
use crate::handlers::{HtlcMatcher, Matcher};
use crate::keys::{derive_basepoint_secret, derive_privkey, derive_pubkey, per_commitment_point, BasepointIndex, KeySet};
use crate::scripts::{
    offered_htlc_witness_script, p2wpkh_script_pubkey, p2wsh_script_pubkey, received_htlc_witness_script,
    to_local_delayed_witness, to_local_witness_script,
};
use crate::tracked_output::OutputStore;
use crate::types::{OutputType, Side, TxType};
use crate::wire::{OnchainHtlc, OnchainInit};

/// Runs the full §4.3 handler against the already-observed commitment tx
/// `init.spending_tx`. Advances `feerate_range` as HTLC-timeout signatures
/// are verified; populates `store` with one tracked output per commitment
/// output.
pub fn handle_our_unilateral(
    secp: &Secp256k1<All>,
    init: &OnchainInit,
    htlcs: &[OnchainHtlc],
    commit_num: u64,
    feerate_range: &mut FeerateRange,
    store: &mut OutputStore,
) -> Result<(), Error> {
    let commitment_tx = &init.spending_tx;
    let commitment_txid = commitment_tx.txid();
    let blockheight = init.spending_tx_blockheight;

    let per_commitment_pt = per_commitment_point(secp, &init.channel_seed, commit_num)?;

    let keyset = KeySet::derive(
        secp,
        &init.local_delayed_payment_basepoint,
        &init.local_payment_basepoint,
        &init.remote_payment_basepoint,
        &init.remote_revocation_basepoint,
        &per_commitment_pt,
    )?;
    let local_htlc_pubkey = derive_pubkey(secp, &init.local_htlc_basepoint, &per_commitment_pt)?;
    let remote_htlc_pubkey = derive_pubkey(secp, &init.remote_htlc_basepoint, &per_commitment_pt)?;

    let local_delayed_privkey = derive_privkey(
        secp,
        &derive_basepoint_secret(&init.channel_seed, BasepointIndex::DelayedPayment)?,
        &per_commitment_pt,
    )?;
    let local_htlc_privkey = derive_privkey(
        secp,
        &derive_basepoint_secret(&init.channel_seed, BasepointIndex::Htlc)?,
        &per_commitment_pt,
    )?;

    let to_local_wscript =
        to_local_witness_script(&keyset.self_revocation_key, &keyset.self_delayed_payment_key, init.to_self_delay_local);
    let mut local_matcher = Matcher::new(p2wsh_script_pubkey(&to_local_wscript));
    let mut remote_matcher = Matcher::new(p2wpkh_script_pubkey(&keyset.other_payment_key));

    let mut htlc_matchers: Vec<HtlcMatcher> = htlcs
        .iter()
        .enumerate()
        .map(|(i, htlc)| {
            let wscript = match htlc.owner {
                Side::Local => offered_htlc_witness_script(
                    &keyset.self_revocation_key,
                    &local_htlc_pubkey,
                    &remote_htlc_pubkey,
                    &htlc.payment_hash_ripemd160,
                ),
                Side::Remote => received_htlc_witness_script(
                    &keyset.self_revocation_key,
                    &local_htlc_pubkey,
                    &remote_htlc_pubkey,
                    htlc.cltv_expiry,
                    &htlc.payment_hash_ripemd160,
                ),
            };
            HtlcMatcher::new(i, p2wsh_script_pubkey(&wscript))
        })
        .collect();

    let mut htlc_sig_cursor = 0usize;

    for (outnum, output) in commitment_tx.output.iter().enumerate() {
        let outnum = outnum as u32;
        let amount_sat = output.value;

        if local_matcher.take(&output.script_pubkey) {
            let handle = store.new_tracked_output(
                TxType::OurUnilateral,
                commitment_txid,
                blockheight,
                outnum,
                amount_sat,
                OutputType::DelayedOutputToUs,
            );
            let sweep_tx = build_delayed_sweep(
                secp,
                commitment_txid,
                outnum,
                amount_sat,
                init.to_self_delay_local,
                &to_local_wscript,
                &local_delayed_privkey,
                &init.our_wallet_pubkey,
            )?;
            store.propose(
                handle,
                Some(sweep_tx),
                init.to_self_delay_local as u32,
                TxType::OurUnilateralToUsReturnToWallet,
            )?;
            continue;
        }

        if remote_matcher.take(&output.script_pubkey) {
            let handle = store.new_tracked_output(
                TxType::OurUnilateral,
                commitment_txid,
                blockheight,
                outnum,
                amount_sat,
                OutputType::OutputToThem,
            );
            store.ignore(handle);
            continue;
        }

        if let Some(matcher) = htlc_matchers.iter_mut().find(|m| m.take(&output.script_pubkey)) {
            let htlc = &htlcs[matcher.stub_index];
            match htlc.owner {
                Side::Local => {
                    let handle = store.new_tracked_output(
                        TxType::OurUnilateral,
                        commitment_txid,
                        blockheight,
                        outnum,
                        amount_sat,
                        OutputType::OurHtlc,
                    );
                    let wscript = offered_htlc_witness_script(
                        &keyset.self_revocation_key,
                        &local_htlc_pubkey,
                        &remote_htlc_pubkey,
                        &htlc.payment_hash_ripemd160,
                    );
                    let remote_signature = init
                        .remote_htlc_signatures
                        .get(htlc_sig_cursor)
                        .ok_or_else(|| Error::internal("ran out of counterparty HTLC signatures"))?;
                    htlc_sig_cursor += 1;

                    log::debug!(
                        "grabbing offered HTLC {}:{}, payment hash ripemd160 {}",
                        commitment_txid, outnum, hex::encode(htlc.payment_hash_ripemd160)
                    );
                    let (tx, block_required, tx_type) = resolve_our_htlc_ourcommit(
                        secp,
                        feerate_range,
                        OutPoint::new(commitment_txid, outnum),
                        amount_sat,
                        init.to_self_delay_local,
                        htlc.cltv_expiry,
                        &wscript,
                        remote_signature,
                        &remote_htlc_pubkey,
                        &local_htlc_privkey,
                    )?;
                    store.propose_at_block(handle, Some(tx), block_required, tx_type)?;
                }
                Side::Remote => {
                    let handle = store.new_tracked_output(
                        TxType::OurUnilateral,
                        commitment_txid,
                        blockheight,
                        outnum,
                        amount_sat,
                        OutputType::TheirHtlc,
                    );
                    let null_proposal = resolve_their_htlc(htlc.cltv_expiry);
                    store.propose_at_block(handle, None, null_proposal.block_required, null_proposal.tx_type)?;
                }
            }
            continue;
        }

        return Err(Error::internal(format!(
            "commitment output {} matched no known script on our own unilateral close",
            outnum
        )));
    }

    Ok(())
}

fn build_delayed_sweep(
    secp: &Secp256k1<All>,
    commitment_txid: bitcoin::Txid,
    outnum: u32,
    amount_sat: u64,
    to_self_delay: u16,
    to_local_wscript: &Script,
    local_delayed_privkey: &bitcoin::secp256k1::SecretKey,
    our_wallet_pubkey: &bitcoin::secp256k1::PublicKey,
) -> Result<Transaction, Error> {
    let mut tx = Transaction {
        version: 2,
        lock_time: PackedLockTime(0),
        input: vec![TxIn {
            previous_output: OutPoint::new(commitment_txid, outnum),
            script_sig: Script::new(),
            sequence: Sequence(to_self_delay as u32),
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: amount_sat,
            script_pubkey: p2wpkh_script_pubkey(our_wallet_pubkey),
        }],
    };
    let signature =
        crate::txbuilder::sign_input(secp, &tx, 0, to_local_wscript, amount_sat, local_delayed_privkey)?;
    tx.input[0].witness = to_local_delayed_witness(&signature, to_local_wscript);
    Ok(tx)
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::secp256k1::SecretKey;

    use crate::shachain::Shachain;

    fn pubkey_for(seed: &[u8; 32], index: BasepointIndex, secp: &Secp256k1<All>) -> bitcoin::secp256k1::PublicKey {
        let sk = derive_basepoint_secret(seed, index).unwrap();
        bitcoin::secp256k1::PublicKey::from_secret_key(secp, &sk)
    }

    fn arbitrary_pubkey(secp: &Secp256k1<All>, byte: u8) -> bitcoin::secp256k1::PublicKey {
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        bitcoin::secp256k1::PublicKey::from_secret_key(secp, &sk)
    }

    /// §8 scenario 2: a two-output commitment with no HTLCs. The delayed
    /// output gets a sweep proposal at depth `to_self_delay`; the direct
    /// payment to the counterparty is tracked and immediately ignored.
    #[test]
    fn two_output_commitment_no_htlcs() {
        let secp = Secp256k1::new();
        let seed = [0x5au8; 32];
        let to_self_delay = 144u16;
        let commit_num = 0u64;

        let local_delayed_payment_basepoint = pubkey_for(&seed, BasepointIndex::DelayedPayment, &secp);
        let local_payment_basepoint = pubkey_for(&seed, BasepointIndex::Payment, &secp);
        let local_htlc_basepoint = pubkey_for(&seed, BasepointIndex::Htlc, &secp);
        let remote_payment_basepoint = arbitrary_pubkey(&secp, 0x02);
        let remote_revocation_basepoint = arbitrary_pubkey(&secp, 0x03);
        let remote_htlc_basepoint = arbitrary_pubkey(&secp, 0x04);
        let our_wallet_pubkey = arbitrary_pubkey(&secp, 0x05);

        let per_commitment_pt = per_commitment_point(&secp, &seed, commit_num).unwrap();
        let keyset = KeySet::derive(
            &secp,
            &local_delayed_payment_basepoint,
            &local_payment_basepoint,
            &remote_payment_basepoint,
            &remote_revocation_basepoint,
            &per_commitment_pt,
        )
        .unwrap();
        let to_local_wscript =
            to_local_witness_script(&keyset.self_revocation_key, &keyset.self_delayed_payment_key, to_self_delay);

        let delayed_amount = 500_000u64;
        let to_them_amount = 300_000u64;
        let commitment_tx = Transaction {
            version: 2,
            lock_time: PackedLockTime(0),
            input: vec![],
            output: vec![
                TxOut {
                    value: delayed_amount,
                    script_pubkey: p2wsh_script_pubkey(&to_local_wscript),
                },
                TxOut {
                    value: to_them_amount,
                    script_pubkey: p2wpkh_script_pubkey(&keyset.other_payment_key),
                },
            ],
        };

        let init = OnchainInit {
            channel_seed: seed,
            shachain: Shachain::new(),
            funding_amount_sat: delayed_amount + to_them_amount,
            remote_per_commitment_point_previous: None,
            remote_per_commitment_point_current: per_commitment_pt,
            to_self_delay_local: to_self_delay,
            to_self_delay_remote: 144,
            feerate_per_kw: 1000,
            local_dust_limit_sat: 546,
            remote_revocation_basepoint,
            local_revocation_basepoint: arbitrary_pubkey(&secp, 0x06),
            remote_payment_basepoint,
            remote_delayed_payment_basepoint: arbitrary_pubkey(&secp, 0x07),
            remote_htlc_basepoint,
            local_delayed_payment_basepoint,
            local_payment_basepoint,
            local_htlc_basepoint,
            our_broadcast_txid: commitment_tx.txid(),
            our_closing_scriptpubkey: bitcoin::Script::new(),
            their_closing_scriptpubkey: bitcoin::Script::new(),
            our_wallet_pubkey,
            is_local_funder: true,
            spending_tx: commitment_tx,
            spending_tx_blockheight: 700,
            remote_htlc_signatures: vec![],
            num_htlcs: 0,
            revocations_received: 0,
        };

        let mut feerate_range = FeerateRange::from_commitment_feerate(1000);
        let mut store = OutputStore::new();
        handle_our_unilateral(&secp, &init, &[], commit_num, &mut feerate_range, &mut store).unwrap();

        assert_eq!(store.len(), 2);

        let (_, delayed) = store
            .iter()
            .find(|(_, o)| o.output_type == OutputType::DelayedOutputToUs)
            .expect("delayed output tracked");
        assert!(!delayed.is_resolved());
        let proposal = delayed.proposal.as_ref().unwrap();
        assert_eq!(proposal.depth_required, to_self_delay as u32);
        assert_eq!(proposal.tx_type, TxType::OurUnilateralToUsReturnToWallet);
        assert!(proposal.tx.is_some());

        let (_, to_them) = store
            .iter()
            .find(|(_, o)| o.output_type == OutputType::OutputToThem)
            .expect("to-them output tracked");
        assert!(to_them.is_resolved());
        assert_eq!(to_them.resolution.unwrap().tx_type, TxType::SelfIgnored);
    }
}
