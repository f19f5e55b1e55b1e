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

//! Message payloads exchanged with the parent (§6). Field layout follows
//! the order spec.md enumerates them in, since that's the only contract we
//! have for the wire shape.

use bitcoin::secp256k1::PublicKey;
use bitcoin::{Transaction, Txid};

use crate::shachain::Shachain;
use crate::types::{OnchaindState, Side};

/// `onchain_init(req)`: everything the engine needs to classify the close
/// and start tracking outputs. Sent exactly once, first.
#[derive(Clone, Debug, StrictEncode, StrictDecode)]
pub struct OnchainInit {
    pub channel_seed: [u8; 32],
    pub shachain: Shachain,
    pub funding_amount_sat: u64,
    pub remote_per_commitment_point_previous: Option<PublicKey>,
    pub remote_per_commitment_point_current: PublicKey,
    pub to_self_delay_local: u16,
    pub to_self_delay_remote: u16,
    pub feerate_per_kw: u32,
    pub local_dust_limit_sat: u64,
    pub remote_revocation_basepoint: PublicKey,
    pub local_revocation_basepoint: PublicKey,
    pub remote_payment_basepoint: PublicKey,
    pub remote_delayed_payment_basepoint: PublicKey,
    pub remote_htlc_basepoint: PublicKey,
    pub local_delayed_payment_basepoint: PublicKey,
    pub local_payment_basepoint: PublicKey,
    pub local_htlc_basepoint: PublicKey,
    pub our_broadcast_txid: Txid,
    pub our_closing_scriptpubkey: bitcoin::Script,
    pub their_closing_scriptpubkey: bitcoin::Script,
    pub our_wallet_pubkey: PublicKey,
    pub is_local_funder: bool,
    pub spending_tx: Transaction,
    pub spending_tx_blockheight: u32,
    pub remote_htlc_signatures: Vec<Vec<u8>>,
    pub num_htlcs: u16,
    /// Number of commitments the counterparty has already revoked to us,
    /// i.e. the `revocations_received` the classifier compares a spending
    /// tx's unmasked commitment number against (§4.1 steps 5-6). Not named
    /// in spec.md's field list for `onchain_init` but required by the
    /// decision rule it specifies; the parent is the only party that knows
    /// this count, so it must be carried on the wire.
    pub revocations_received: u64,
}

/// `onchain_htlc`, one of the `num_htlcs` stubs following `onchain_init`.
#[derive(Clone, Copy, Debug, StrictEncode, StrictDecode)]
pub struct OnchainHtlc {
    pub cltv_expiry: u32,
    pub payment_hash_ripemd160: [u8; 20],
    pub owner: Side,
}

/// `onchain_depth(txid, depth)`.
#[derive(Clone, Copy, Debug, StrictEncode, StrictDecode)]
pub struct OnchainDepth {
    pub txid: Txid,
    pub depth: u32,
}

/// `onchain_spent(tx, input_num, blockheight)`.
#[derive(Clone, Debug, StrictEncode, StrictDecode)]
pub struct OnchainSpent {
    pub tx: Transaction,
    pub input_num: u32,
    pub blockheight: u32,
}

/// `onchain_known_preimage(preimage)`.
#[derive(Clone, Copy, Debug, StrictEncode, StrictDecode)]
pub struct OnchainKnownPreimage {
    pub preimage: [u8; 32],
}

/// `onchain_init_reply(state)`, emitted once classification completes.
#[derive(Clone, Copy, Debug, StrictEncode, StrictDecode)]
pub struct OnchainInitReply {
    pub state: OnchaindState,
}

/// `onchain_broadcast_tx(tx)`.
#[derive(Clone, Debug, StrictEncode, StrictDecode)]
pub struct OnchainBroadcastTx {
    pub tx: Transaction,
}

/// `onchain_unwatch_tx(txid, num_outputs)`.
#[derive(Clone, Copy, Debug, StrictEncode, StrictDecode)]
pub struct OnchainUnwatchTx {
    pub txid: Txid,
    pub num_outputs: u32,
}
