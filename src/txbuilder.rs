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

//! Second-stage transaction assembly (§4.6, §4.6b). The witness-script
//! signing itself is a thin wrapper over `secp256k1`'s own sign/verify —
//! the "script & signing primitives" §1 treats as a fixed-semantics
//! external library; everything above that line (which input, which
//! script, which fee) is this engine's own logic.

use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey, Signing, Verification};
use bitcoin::util::sighash::SighashCache;
use bitcoin::{EcdsaSighashType, Script, Transaction};

use crate::error::Error;

/// BIP-143 segwit v0 sighash for `tx`'s input `input_index`, spending
/// `amount_sat` locked under `script_code`, with `SIGHASH_ALL`.
pub fn segwit_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount_sat: u64,
) -> Result<Message, Error> {
    let sighash = SighashCache::new(tx)
        .segwit_signature_hash(input_index, script_code, amount_sat, EcdsaSighashType::All)
        .map_err(|e| Error::internal(e.to_string()))?;
    Message::from_slice(&sighash[..]).map_err(|e| Error::crypto(e.to_string()))
}

pub fn sign_input<C: Signing>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount_sat: u64,
    privkey: &SecretKey,
) -> Result<Vec<u8>, Error> {
    let msg = segwit_sighash(tx, input_index, script_code, amount_sat)?;
    let sig = secp.sign_ecdsa(&msg, privkey);
    der_with_sighash_all(&sig)
}

pub fn verify_input<C: Verification>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount_sat: u64,
    der_signature: &[u8],
    pubkey: &PublicKey,
) -> Result<(), Error> {
    let (sig_bytes, _sighash_type) = der_signature
        .split_last()
        .ok_or_else(|| Error::crypto("empty signature"))?;
    let sig = Signature::from_der(sig_bytes).map_err(|e| Error::crypto(e.to_string()))?;
    let msg = segwit_sighash(tx, input_index, script_code, amount_sat)?;
    secp.verify_ecdsa(&msg, &sig, pubkey)
        .map_err(|e| Error::crypto(e.to_string()))
}

fn der_with_sighash_all(sig: &Signature) -> Result<Vec<u8>, Error> {
    let mut bytes = sig.serialize_der().to_vec();
    bytes.push(EcdsaSighashType::All.to_u32() as u8);
    Ok(bytes)
}

/// Transaction-weight-derived fee for a single-input, single-output
/// spend of an offered-HTLC output direct-to-wallet (§4.6b): base tx
/// weight plus the witness (signature + pubkey + script) and a
/// `witness_overhead` constant covering the segwit marker/flag/stack
/// length prefixes.
pub fn htlc_direct_sweep_fee(feerate_per_kw: u32, witness_script_len: usize) -> u64 {
    const WITNESS_OVERHEAD: u64 = 1 + 1 + 1;
    const SIG_LEN: u64 = 73;
    let cost = WITNESS_OVERHEAD + SIG_LEN + witness_script_len as u64;
    (feerate_per_kw as u64 * cost) / 1000
}
