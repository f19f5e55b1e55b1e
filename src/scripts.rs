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

//! Output-script construction (§4.3/§4.4) and the commitment-number
//! obscurer (§4.1 step 2, §6). These are the script-matching primitives
//! the handlers use to figure out what each commitment output actually is.

use bitcoin::blockdata::opcodes::all::*;
use bitcoin::blockdata::script::{self, Script};
use bitcoin::hashes::{hash160, ripemd160, sha256, Hash, HashEngine};
use bitcoin::secp256k1::PublicKey;
use bitcoin::PublicKey as BitcoinPublicKey;

/// `to_local` witness script: revocable immediately by the counterparty
/// holding the revocation key, spendable by us after `to_self_delay` via
/// the delayed payment key.
pub fn to_local_witness_script(
    revocation_pubkey: &PublicKey,
    delayed_pubkey: &PublicKey,
    to_self_delay: u16,
) -> Script {
    script::Builder::new()
        .push_opcode(OP_IF)
        .push_key(&BitcoinPublicKey::new(*revocation_pubkey))
        .push_opcode(OP_ELSE)
        .push_int(to_self_delay as i64)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_key(&BitcoinPublicKey::new(*delayed_pubkey))
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Offered-HTLC witness script: spendable by the counterparty with the
/// payment preimage, by us after `cltv_expiry` via the HTLC-timeout
/// transaction, or immediately by the revocation key.
pub fn offered_htlc_witness_script(
    revocation_pubkey: &PublicKey,
    local_htlc_pubkey: &PublicKey,
    remote_htlc_pubkey: &PublicKey,
    payment_hash_ripemd160: &[u8; 20],
) -> Script {
    script::Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(&hash160::Hash::hash(&revocation_pubkey.serialize()))
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_IF)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_key(&BitcoinPublicKey::new(*remote_htlc_pubkey))
        .push_opcode(OP_SWAP)
        .push_opcode(OP_SIZE)
        .push_int(32)
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_NOTIF)
        .push_opcode(OP_DROP)
        .push_int(2)
        .push_opcode(OP_SWAP)
        .push_key(&BitcoinPublicKey::new(*local_htlc_pubkey))
        .push_int(2)
        .push_opcode(OP_CHECKMULTISIG)
        .push_opcode(OP_ELSE)
        .push_opcode(OP_HASH160)
        .push_slice(payment_hash_ripemd160)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// Received-HTLC witness script: spendable by us with the preimage, by
/// the counterparty after `cltv_expiry`, or immediately by the revocation
/// key.
pub fn received_htlc_witness_script(
    revocation_pubkey: &PublicKey,
    local_htlc_pubkey: &PublicKey,
    remote_htlc_pubkey: &PublicKey,
    cltv_expiry: u32,
    payment_hash_ripemd160: &[u8; 20],
) -> Script {
    script::Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(&hash160::Hash::hash(&revocation_pubkey.serialize()))
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_IF)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_key(&BitcoinPublicKey::new(*remote_htlc_pubkey))
        .push_opcode(OP_SWAP)
        .push_opcode(OP_SIZE)
        .push_int(32)
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_IF)
        .push_opcode(OP_HASH160)
        .push_slice(payment_hash_ripemd160)
        .push_opcode(OP_EQUALVERIFY)
        .push_int(2)
        .push_opcode(OP_SWAP)
        .push_key(&BitcoinPublicKey::new(*local_htlc_pubkey))
        .push_int(2)
        .push_opcode(OP_CHECKMULTISIG)
        .push_opcode(OP_ELSE)
        .push_opcode(OP_DROP)
        .push_int(cltv_expiry as i64)
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// RIPEMD160 of the (SHA256) payment hash, as pushed into the HTLC witness
/// scripts above. `payment_hash` here is the 32-byte value already carried
/// on the wire (`onchain_htlc`'s "payment-hash ripemd160" field is in fact
/// this derived value, computed once by the parent and handed to us).
pub fn ripemd160_payment_hash(payment_hash: &[u8; 32]) -> [u8; 20] {
    ripemd160::Hash::hash(payment_hash).into_inner()
}

pub fn p2wpkh_script_pubkey(pubkey: &PublicKey) -> Script {
    Script::new_v0_p2wpkh(&BitcoinPublicKey::new(*pubkey).wpubkey_hash().expect(
        "compressed secp256k1 public keys always have a well-defined wpubkey hash",
    ))
}

pub fn p2wsh_script_pubkey(witness_script: &Script) -> Script {
    witness_script.to_v0_p2wsh()
}

/// Witness stack for spending [`to_local_witness_script`]'s delayed-claim
/// branch: `<sig> 0 <wscript>`. The empty middle element selects `OP_IF`'s
/// `ELSE` branch (the `to_self_delay`/`OP_CSV` path), never the
/// revocation path, which only the counterparty can exercise.
pub fn to_local_delayed_witness(signature: &[u8], witness_script: &Script) -> bitcoin::Witness {
    let mut witness = bitcoin::Witness::new();
    witness.push(signature);
    witness.push(Vec::new());
    witness.push(witness_script.as_bytes());
    witness
}

/// `obscuring_factor` (§4.1 step 2, §6): a 48-bit value derived from both
/// parties' payment basepoints, with funder-vs-fundee ordering fixed by
/// BOLT-3, used to XOR-hide the commitment number in locktime/sequence.
pub fn obscuring_factor(
    is_local_funder: bool,
    local_payment_basepoint: &PublicKey,
    remote_payment_basepoint: &PublicKey,
) -> u64 {
    let mut engine = sha256::Hash::engine();
    if is_local_funder {
        engine.input(&local_payment_basepoint.serialize());
        engine.input(&remote_payment_basepoint.serialize());
    } else {
        engine.input(&remote_payment_basepoint.serialize());
        engine.input(&local_payment_basepoint.serialize());
    }
    let hash = sha256::Hash::from_engine(engine);
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&hash[24..]);
    u64::from_be_bytes(buf) & 0xFFFF_FFFF_FFFF
}

/// Splits the (already obscurer-XORed) 48-bit commitment number into the
/// `(locktime, sequence)` pair BOLT-3 prescribes: low 24 bits tagged `0x20`
/// in locktime, high 24 bits tagged `0x80` in sequence.
pub fn mask_commit_number(commit_num: u64, obscurer: u64) -> (u32, u32) {
    let masked = (commit_num ^ obscurer) & 0xFFFF_FFFF_FFFF;
    let locktime = (0x20u32 << 24) | (masked & 0xFF_FFFF) as u32;
    let sequence = (0x80u32 << 24) | ((masked >> 24) & 0xFF_FFFF) as u32;
    (locktime, sequence)
}

/// Inverse of [`mask_commit_number`]: recovers the commitment number from a
/// spending transaction's locktime/sequence plus the channel's obscurer.
/// Returns `None` if the tags don't look like an obscured commitment at all
/// (wrong upper byte in either field).
pub fn unmask_commit_number(locktime: u32, sequence: u32, obscurer: u64) -> Option<u64> {
    if (locktime >> 24) != 0x20 || (sequence >> 24) != 0x80 {
        return None;
    }
    let low = (locktime & 0xFF_FFFF) as u64;
    let high = (sequence & 0xFF_FFFF) as u64;
    let masked = (high << 24) | low;
    Some(masked ^ obscurer)
}
