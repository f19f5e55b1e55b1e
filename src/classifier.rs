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

//! Close classifier (§4.1). Inspects the funding output's spending
//! transaction exactly once and decides which of the four close handlers
//! takes over.

use bitcoin::secp256k1::PublicKey;
use bitcoin::Transaction;

use crate::error::Error;
use crate::scripts::{obscuring_factor, unmask_commit_number};
use crate::shachain::Shachain;
use crate::types::CloseType;

/// Everything the classifier needs to read out of the spending tx and the
/// channel's persisted state; assembled by the driver from `OnchainInit`.
pub struct ClassifierInput<'a> {
    pub spending_tx: &'a Transaction,
    pub our_broadcast_txid: bitcoin::Txid,
    pub our_closing_scriptpubkey: &'a bitcoin::Script,
    pub their_closing_scriptpubkey: &'a bitcoin::Script,
    pub is_local_funder: bool,
    pub local_payment_basepoint: &'a PublicKey,
    pub remote_payment_basepoint: &'a PublicKey,
    pub shachain: &'a Shachain,
    pub revocations_received: u64,
}

/// A classified close, carrying whatever the dispatch needs from here on:
/// the close type itself, and — for anything but a mutual close — the
/// commitment number the spending tx corresponds to.
pub struct Classified {
    pub close_type: CloseType,
    pub commit_num: Option<u64>,
}

/// `is_mutual_close`: every output of `tx` pays one of the two closing
/// scriptpubkeys, and each is paid at most once (§4.1 step 1, §8 law).
pub fn is_mutual_close(
    tx: &Transaction,
    our_closing_scriptpubkey: &bitcoin::Script,
    their_closing_scriptpubkey: &bitcoin::Script,
) -> bool {
    let mut matched_ours = false;
    let mut matched_theirs = false;
    for output in &tx.output {
        if &output.script_pubkey == our_closing_scriptpubkey {
            if matched_ours {
                return false;
            }
            matched_ours = true;
        } else if &output.script_pubkey == their_closing_scriptpubkey {
            if matched_theirs {
                return false;
            }
            matched_theirs = true;
        } else {
            return false;
        }
    }
    true
}

/// Runs the full decision rule of §4.1 against `input`.
pub fn classify(input: &ClassifierInput) -> Result<Classified, Error> {
    if is_mutual_close(
        input.spending_tx,
        input.our_closing_scriptpubkey,
        input.their_closing_scriptpubkey,
    ) {
        log::info!("{} spends the funding output as a mutual close", input.spending_tx.txid());
        return Ok(Classified {
            close_type: CloseType::Mutual,
            commit_num: None,
        });
    }

    let obscurer = obscuring_factor(
        input.is_local_funder,
        input.local_payment_basepoint,
        input.remote_payment_basepoint,
    );
    let locktime = input.spending_tx.lock_time.0;
    let sequence = input
        .spending_tx
        .input
        .get(0)
        .ok_or_else(|| Error::internal("spending tx has no inputs"))?
        .sequence
        .0;
    let commit_num = unmask_commit_number(locktime, sequence, obscurer).ok_or_else(|| {
        Error::internal("spending tx locktime/sequence do not carry an obscured commitment number")
    })?;

    let spending_txid = input.spending_tx.txid();
    if spending_txid == input.our_broadcast_txid {
        log::info!("{} is our own unilateral close, commitment number {}", spending_txid, commit_num);
        return Ok(Classified {
            close_type: CloseType::OurUnilateral,
            commit_num: Some(commit_num),
        });
    }

    if input.shachain.contains(commit_num) {
        log::warn!(
            "{} broadcasts revoked commitment number {}: counterparty cheated",
            spending_txid, commit_num
        );
        return Ok(Classified {
            close_type: CloseType::TheirRevoked,
            commit_num: Some(commit_num),
        });
    }
    if commit_num == input.revocations_received {
        log::info!("{} is their previous unilateral close, commitment number {}", spending_txid, commit_num);
        return Ok(Classified {
            close_type: CloseType::TheirUnilateralPrevious,
            commit_num: Some(commit_num),
        });
    }
    if commit_num == input.revocations_received + 1 {
        log::info!("{} is their current unilateral close, commitment number {}", spending_txid, commit_num);
        return Ok(Classified {
            close_type: CloseType::TheirUnilateralCurrent,
            commit_num: Some(commit_num),
        });
    }

    Err(Error::internal(format!(
        "spending tx commitment number {} is neither our broadcast, a revoked, nor the previous/current \
         remote commitment (revocations_received = {})",
        commit_num, input.revocations_received
    )))
}
