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

//! HTLC resolvers (§4.6, §4.6b, §4.7): the three ways an HTLC output can
//! end up proposed for resolution, depending on whose commitment it sits
//! on and who owns it.

use bitcoin::blockdata::transaction::{OutPoint, TxIn, TxOut};
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use bitcoin::{PackedLockTime, Script, Sequence, Transaction, Witness};

use crate::error::Error;
use crate::feerate::FeerateRange;
use crate::scripts::p2wpkh_script_pubkey;
use crate::txbuilder::{htlc_direct_sweep_fee, sign_input, verify_input};
use crate::types::TxType;

const HTLC_TIMEOUT_WEIGHT_MULTIPLIER: u32 = 663;

/// Builds the unsigned skeleton HTLC-timeout tx (§4.6a step 1): one input
/// spending `htlc_outpoint` at its full value, `nSequence = to_self_delay`
/// so the second-stage delayed claim is enforced, `nLockTime = cltv_expiry`
/// so the timeout path cannot be mined early.
fn htlc_timeout_skeleton(
    htlc_outpoint: OutPoint,
    htlc_amount_sat: u64,
    to_self_delay: u16,
    cltv_expiry: u32,
) -> Transaction {
    Transaction {
        version: 2,
        lock_time: PackedLockTime(cltv_expiry),
        input: vec![TxIn {
            previous_output: htlc_outpoint,
            script_sig: Script::new(),
            sequence: Sequence(to_self_delay as u32),
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: htlc_amount_sat,
            script_pubkey: Script::new(),
        }],
    }
}

/// §4.6a `resolve_our_htlc_ourcommit`: brute-forces the feerate the
/// counterparty used to sign the HTLC-timeout transaction, then completes
/// and signs it ourselves.
///
/// Returns the narrowed feerate, the completed transaction, and the depth
/// required before it may be broadcast (`block_required = cltv_expiry`
/// translated to a depth with floor 0 by the caller, per §4.8).
pub fn resolve_our_htlc_ourcommit<C: bitcoin::secp256k1::Signing + bitcoin::secp256k1::Verification>(
    secp: &Secp256k1<C>,
    feerate_range: &mut FeerateRange,
    htlc_outpoint: OutPoint,
    htlc_amount_sat: u64,
    to_self_delay: u16,
    cltv_expiry: u32,
    offered_htlc_witness_script: &Script,
    remote_signature_der: &[u8],
    remote_htlc_pubkey: &PublicKey,
    local_htlc_privkey: &SecretKey,
) -> Result<(Transaction, u32, TxType), Error> {
    let mut last_fee = None;
    for candidate in feerate_range.candidates_desc() {
        let fee = (candidate as u64 * HTLC_TIMEOUT_WEIGHT_MULTIPLIER as u64) / 1000;
        if fee > htlc_amount_sat {
            continue;
        }
        if last_fee == Some(fee) {
            continue;
        }
        last_fee = Some(fee);

        let mut tx = htlc_timeout_skeleton(htlc_outpoint, htlc_amount_sat, to_self_delay, cltv_expiry);
        tx.output[0].value = htlc_amount_sat - fee;

        if verify_input(
            secp,
            &tx,
            0,
            offered_htlc_witness_script,
            htlc_amount_sat,
            remote_signature_der,
            remote_htlc_pubkey,
        )
        .is_err()
        {
            continue;
        }

        feerate_range.narrow_to(candidate)?;
        let local_signature =
            sign_input(secp, &tx, 0, offered_htlc_witness_script, htlc_amount_sat, local_htlc_privkey)?;
        tx.input[0].witness = offer_timeout_witness(
            remote_signature_der,
            &local_signature,
            offered_htlc_witness_script,
        );
        return Ok((tx, cltv_expiry, TxType::OurHtlcTimeoutToUs));
    }

    Err(Error::internal(
        "no candidate feerate in range produced a counterparty signature that verifies against the \
         offered-HTLC witness script",
    ))
}

/// Witness stack for the HTLC-timeout spend of an offered-HTLC output:
/// `<remotesig> <localsig> 0 <wscript>` — the empty element selects the
/// timeout (non-preimage) branch of [`crate::scripts::offered_htlc_witness_script`].
fn offer_timeout_witness(remote_sig: &[u8], local_sig: &[u8], witness_script: &Script) -> Witness {
    let mut witness = Witness::new();
    witness.push(remote_sig);
    witness.push(local_sig);
    witness.push(Vec::new());
    witness.push(witness_script.as_bytes());
    witness
}

/// §4.6b `resolve_our_htlc_theircommit`: a direct, single-stage sweep of an
/// offered-HTLC output on the counterparty's commitment straight to our
/// wallet, once `cltv_expiry` has passed.
pub fn resolve_our_htlc_theircommit<C: bitcoin::secp256k1::Signing>(
    secp: &Secp256k1<C>,
    htlc_outpoint: OutPoint,
    htlc_amount_sat: u64,
    cltv_expiry: u32,
    dust_limit_sat: u64,
    feerate_per_kw: u32,
    offered_htlc_witness_script: &Script,
    our_wallet_pubkey: &PublicKey,
    local_payment_privkey: &SecretKey,
) -> Result<Option<(Transaction, u32, TxType)>, Error> {
    let fee = htlc_direct_sweep_fee(feerate_per_kw, offered_htlc_witness_script.len());
    if htlc_amount_sat <= dust_limit_sat + fee {
        // Spend-to-fee: nothing left worth claiming.
        return Ok(None);
    }

    let mut tx = Transaction {
        version: 2,
        lock_time: PackedLockTime(cltv_expiry),
        input: vec![TxIn {
            previous_output: htlc_outpoint,
            script_sig: Script::new(),
            sequence: Sequence(0),
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: htlc_amount_sat - fee,
            script_pubkey: p2wpkh_script_pubkey(our_wallet_pubkey),
        }],
    };

    let signature =
        sign_input(secp, &tx, 0, offered_htlc_witness_script, htlc_amount_sat, local_payment_privkey)?;
    tx.input[0].witness = single_sig_htlc_witness(&signature, offered_htlc_witness_script);

    Ok(Some((tx, cltv_expiry, TxType::OurHtlcTimeoutToUs)))
}

fn single_sig_htlc_witness(signature: &[u8], witness_script: &Script) -> Witness {
    let mut witness = Witness::new();
    witness.push(signature);
    witness.push(witness_script.as_bytes());
    witness
}

/// §4.7: counterparty-offered HTLCs we don't yet hold the preimage for get
/// a null proposal — no transaction, just a depth threshold at
/// `cltv_expiry`, after which the output is simply ignored.
pub struct TheirHtlcNullProposal {
    pub block_required: u32,
    pub tx_type: TxType,
}

pub fn resolve_their_htlc(cltv_expiry: u32) -> TheirHtlcNullProposal {
    TheirHtlcNullProposal {
        block_required: cltv_expiry,
        tx_type: TxType::TheirHtlcTimeoutToThem,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::secp256k1::SecretKey;

    #[test]
    fn their_htlc_is_a_null_proposal_at_cltv_expiry() {
        let proposal = resolve_their_htlc(500_000);
        assert_eq!(proposal.block_required, 500_000);
        assert_eq!(proposal.tx_type, TxType::TheirHtlcTimeoutToThem);
    }

    /// §8 scenario 3: given a counterparty signature produced at one
    /// specific feerate within the range, the brute-force search (§4.6a)
    /// must land on exactly that feerate and narrow the range to a point.
    #[test]
    fn feerate_brute_force_narrows_to_the_signed_value() {
        let secp = Secp256k1::new();
        let remote_htlc_privkey = SecretKey::from_slice(&[0x30; 32]).unwrap();
        let remote_htlc_pubkey = PublicKey::from_secret_key(&secp, &remote_htlc_privkey);
        let local_htlc_privkey = SecretKey::from_slice(&[0x31; 32]).unwrap();

        let revocation_pubkey = PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[0x32; 32]).unwrap());
        let local_htlc_pubkey = PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[0x33; 32]).unwrap());
        let payment_hash_ripemd160 = [0x44u8; 20];
        let wscript = crate::scripts::offered_htlc_witness_script(
            &revocation_pubkey,
            &local_htlc_pubkey,
            &remote_htlc_pubkey,
            &payment_hash_ripemd160,
        );

        let htlc_outpoint = OutPoint::new(bitcoin::Txid::from_inner([0u8; 32]), 0);
        let htlc_amount_sat = 200_000u64;
        let to_self_delay = 144u16;
        let cltv_expiry = 600_000u32;
        // The range's own max, so the descending search matches it on its
        // very first candidate — no lower feerate can shadow it by
        // producing an identical floor-divided fee first.
        let actual_feerate = 4_000u32;

        let fee = (actual_feerate as u64 * HTLC_TIMEOUT_WEIGHT_MULTIPLIER as u64) / 1000;
        let mut counterparty_tx = htlc_timeout_skeleton(htlc_outpoint, htlc_amount_sat, to_self_delay, cltv_expiry);
        counterparty_tx.output[0].value = htlc_amount_sat - fee;
        let remote_signature =
            sign_input(&secp, &counterparty_tx, 0, &wscript, htlc_amount_sat, &remote_htlc_privkey).unwrap();

        let mut feerate_range = FeerateRange { min: 1_000, max: actual_feerate };
        let (tx, block_required, tx_type) = resolve_our_htlc_ourcommit(
            &secp,
            &mut feerate_range,
            htlc_outpoint,
            htlc_amount_sat,
            to_self_delay,
            cltv_expiry,
            &wscript,
            &remote_signature,
            &remote_htlc_pubkey,
            &local_htlc_privkey,
        )
        .unwrap();

        assert_eq!(feerate_range, FeerateRange { min: actual_feerate, max: actual_feerate });
        assert_eq!(block_required, cltv_expiry);
        assert_eq!(tx_type, TxType::OurHtlcTimeoutToUs);
        assert_eq!(tx.output[0].value, htlc_amount_sat - fee);
    }
}
