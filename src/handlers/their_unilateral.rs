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

//! §4.4 `TheirUnilateral` handler: mirrors §4.3 with the delayed/direct
//! roles swapped, since it's the counterparty's commitment on chain.

use bitcoin::blockdata::transaction::OutPoint;
use bitcoin::secp256k1::{All, PublicKey, Secp256k1};

use crate::error::Error;
use crate::handlers::htlc::{resolve_our_htlc_theircommit, resolve_their_htlc};
use crate::handlers::{HtlcMatcher, Matcher};
use crate::keys::{derive_basepoint_secret, derive_privkey, derive_pubkey, KeySet, BasepointIndex};
use crate::scripts::{
    offered_htlc_witness_script, p2wpkh_script_pubkey, p2wsh_script_pubkey, received_htlc_witness_script,
    to_local_witness_script,
};
use crate::tracked_output::OutputStore;
use crate::types::{CloseType, OutputType, Side, TxType};
use crate::wire::{OnchainHtlc, OnchainInit};

/// Which of the counterparty's two known per-commitment points applies,
/// per the classifier's decision (§4.1 steps 5-6).
pub fn remote_per_commitment_point_for(close_type: CloseType, init: &OnchainInit) -> Result<PublicKey, Error> {
    match close_type {
        CloseType::TheirUnilateralPrevious => init
            .remote_per_commitment_point_previous
            .ok_or_else(|| Error::internal("classified TheirUnilateralPrevious but no previous remote per-commitment point was supplied")),
        CloseType::TheirUnilateralCurrent => Ok(init.remote_per_commitment_point_current),
        other => Err(Error::internal(format!(
            "their_unilateral handler invoked with unrelated close type {:?}",
            other
        ))),
    }
}

pub fn handle_their_unilateral(
    secp: &Secp256k1<All>,
    init: &OnchainInit,
    htlcs: &[OnchainHtlc],
    close_type: CloseType,
    store: &mut OutputStore,
) -> Result<(), Error> {
    let remote_per_commitment_pt = remote_per_commitment_point_for(close_type, init)?;

    let commitment_tx = &init.spending_tx;
    let commitment_txid = commitment_tx.txid();
    let blockheight = init.spending_tx_blockheight;

    let keyset = KeySet::derive(
        secp,
        &init.remote_delayed_payment_basepoint,
        &init.remote_payment_basepoint,
        &init.local_payment_basepoint,
        &init.local_revocation_basepoint,
        &remote_per_commitment_pt,
    )?;
    let local_htlc_pubkey = derive_pubkey(secp, &init.local_htlc_basepoint, &remote_per_commitment_pt)?;
    let remote_htlc_pubkey = derive_pubkey(secp, &init.remote_htlc_basepoint, &remote_per_commitment_pt)?;
    let local_payment_privkey = derive_privkey(
        secp,
        &derive_basepoint_secret(&init.channel_seed, BasepointIndex::Payment)?,
        &remote_per_commitment_pt,
    )?;

    let to_them_delayed_wscript = to_local_witness_script(
        &keyset.self_revocation_key,
        &keyset.self_delayed_payment_key,
        init.to_self_delay_remote,
    );
    let mut to_us_matcher = Matcher::new(p2wpkh_script_pubkey(&keyset.other_payment_key));
    let mut to_them_matcher = Matcher::new(p2wsh_script_pubkey(&to_them_delayed_wscript));

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

    for (outnum, output) in commitment_tx.output.iter().enumerate() {
        let outnum = outnum as u32;
        let amount_sat = output.value;

        if to_us_matcher.take(&output.script_pubkey) {
            let handle = store.new_tracked_output(
                TxType::TheirUnilateral,
                commitment_txid,
                blockheight,
                outnum,
                amount_sat,
                OutputType::OutputToUs,
            );
            store.ignore(handle);
            continue;
        }

        if to_them_matcher.take(&output.script_pubkey) {
            let handle = store.new_tracked_output(
                TxType::TheirUnilateral,
                commitment_txid,
                blockheight,
                outnum,
                amount_sat,
                OutputType::DelayedOutputToThem,
            );
            store.ignore(handle);
            continue;
        }

        if let Some(matcher) = htlc_matchers.iter_mut().find(|m| m.take(&output.script_pubkey)) {
            let htlc = &htlcs[matcher.stub_index];
            match htlc.owner {
                Side::Local => {
                    let handle = store.new_tracked_output(
                        TxType::TheirUnilateral,
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
                    match resolve_our_htlc_theircommit(
                        secp,
                        OutPoint::new(commitment_txid, outnum),
                        amount_sat,
                        htlc.cltv_expiry,
                        init.local_dust_limit_sat,
                        init.feerate_per_kw,
                        &wscript,
                        &init.our_wallet_pubkey,
                        &local_payment_privkey,
                    )? {
                        Some((tx, block_required, tx_type)) => {
                            store.propose_at_block(handle, Some(tx), block_required, tx_type)?;
                        }
                        None => store.propose_at_block(handle, None, htlc.cltv_expiry, TxType::OurHtlcTimeoutToUs)?,
                    }
                }
                Side::Remote => {
                    let handle = store.new_tracked_output(
                        TxType::TheirUnilateral,
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
            "commitment output {} matched no known script on their unilateral close",
            outnum
        )));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::blockdata::transaction::TxOut;
    use bitcoin::hashes::Hash;
    use bitcoin::secp256k1::SecretKey;
    use bitcoin::PackedLockTime;

    use crate::scripts::{p2wsh_script_pubkey, received_htlc_witness_script};
    use crate::shachain::Shachain;

    fn pubkey_for(seed: &[u8; 32], index: BasepointIndex, secp: &Secp256k1<All>) -> PublicKey {
        let sk = derive_basepoint_secret(seed, index).unwrap();
        PublicKey::from_secret_key(secp, &sk)
    }

    fn arbitrary_pubkey(secp: &Secp256k1<All>, byte: u8) -> PublicKey {
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        PublicKey::from_secret_key(secp, &sk)
    }

    /// §8 scenario 4: a remote commitment with one counterparty-offered
    /// (THEIR_HTLC) output gets a null proposal at `cltv_expiry`, never a
    /// signed transaction (no preimage known).
    #[test]
    fn their_unilateral_current_with_one_their_htlc() {
        let secp = Secp256k1::new();
        let seed = [0x5bu8; 32];
        let to_self_delay_remote = 144u16;
        let cltv_expiry = 800_000u32;

        let local_payment_basepoint = pubkey_for(&seed, BasepointIndex::Payment, &secp);
        let local_htlc_basepoint = pubkey_for(&seed, BasepointIndex::Htlc, &secp);
        let remote_payment_basepoint = arbitrary_pubkey(&secp, 0x10);
        let remote_delayed_payment_basepoint = arbitrary_pubkey(&secp, 0x11);
        let remote_htlc_basepoint = arbitrary_pubkey(&secp, 0x12);
        let local_revocation_basepoint = arbitrary_pubkey(&secp, 0x13);
        let remote_per_commitment_point_current = arbitrary_pubkey(&secp, 0x14);

        let keyset = KeySet::derive(
            &secp,
            &remote_delayed_payment_basepoint,
            &remote_payment_basepoint,
            &local_payment_basepoint,
            &local_revocation_basepoint,
            &remote_per_commitment_point_current,
        )
        .unwrap();
        let local_htlc_pubkey = derive_pubkey(&secp, &local_htlc_basepoint, &remote_per_commitment_point_current).unwrap();
        let remote_htlc_pubkey = derive_pubkey(&secp, &remote_htlc_basepoint, &remote_per_commitment_point_current).unwrap();

        let payment_hash_ripemd160 = [0x22u8; 20];
        let htlc_wscript = received_htlc_witness_script(
            &keyset.self_revocation_key,
            &local_htlc_pubkey,
            &remote_htlc_pubkey,
            cltv_expiry,
            &payment_hash_ripemd160,
        );
        let htlc_amount = 250_000u64;
        let commitment_tx = Transaction {
            version: 2,
            lock_time: PackedLockTime(0),
            input: vec![],
            output: vec![TxOut {
                value: htlc_amount,
                script_pubkey: p2wsh_script_pubkey(&htlc_wscript),
            }],
        };

        let init = OnchainInit {
            channel_seed: seed,
            shachain: Shachain::new(),
            funding_amount_sat: htlc_amount,
            remote_per_commitment_point_previous: None,
            remote_per_commitment_point_current,
            to_self_delay_local: 144,
            to_self_delay_remote,
            feerate_per_kw: 1000,
            local_dust_limit_sat: 546,
            remote_revocation_basepoint: arbitrary_pubkey(&secp, 0x15),
            local_revocation_basepoint,
            remote_payment_basepoint,
            remote_delayed_payment_basepoint,
            remote_htlc_basepoint,
            local_delayed_payment_basepoint: arbitrary_pubkey(&secp, 0x16),
            local_payment_basepoint,
            local_htlc_basepoint,
            our_broadcast_txid: bitcoin::Txid::from_inner([0u8; 32]),
            our_closing_scriptpubkey: bitcoin::Script::new(),
            their_closing_scriptpubkey: bitcoin::Script::new(),
            our_wallet_pubkey: arbitrary_pubkey(&secp, 0x17),
            is_local_funder: true,
            spending_tx: commitment_tx,
            spending_tx_blockheight: 700,
            remote_htlc_signatures: vec![],
            num_htlcs: 1,
            revocations_received: 0,
        };

        let htlc = OnchainHtlc {
            cltv_expiry,
            payment_hash_ripemd160,
            owner: Side::Remote,
        };

        let mut store = OutputStore::new();
        handle_their_unilateral(&secp, &init, &[htlc], CloseType::TheirUnilateralCurrent, &mut store).unwrap();

        assert_eq!(store.len(), 1);
        let (_, tracked) = store.iter().next().unwrap();
        assert_eq!(tracked.output_type, OutputType::TheirHtlc);
        assert!(!tracked.is_resolved());
        let proposal = tracked.proposal.as_ref().unwrap();
        assert!(proposal.tx.is_none());
        assert_eq!(proposal.tx_type, TxType::TheirHtlcTimeoutToThem);
        assert_eq!(proposal.depth_required, cltv_expiry - 700);
    }
}
