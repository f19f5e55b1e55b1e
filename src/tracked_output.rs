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

//! The tracked-output store (§3 "TrackedOutput"/"Proposal"/"Resolution",
//! §4.8). An append-only ordered collection: the store owns every
//! [`TrackedOutput`], each of which exclusively owns its own `Proposal`
//! and `Resolution`. There is no cyclic reference (§9); a region/arena
//! allocator maps naturally onto this, but plain ownership (a `Vec`) is
//! enough in safe Rust.

use bitcoin::{Transaction, Txid};

use crate::error::Error;
use crate::types::{OutputType, TxType};

/// Opaque handle into the store; stable for the lifetime of the store
/// (indices are never reused, never reordered).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct OutputHandle(usize);

/// A prepared resolution for some tracked output: either a fully-signed
/// sweep transaction, or (if `tx` is `None`) an instruction to simply mark
/// the output resolved once its depth threshold is met ("ignore after
/// depth"). Set-once: a second call to [`OutputStore::propose`] or
/// [`OutputStore::propose_at_block`] on the same output is a bug (§5).
#[derive(Clone, Debug)]
pub struct Proposal {
    pub tx: Option<Transaction>,
    pub depth_required: u32,
    pub tx_type: TxType,
}

/// The realized outcome of a tracked output: which transaction spent (or
/// stood in, for "ignored") it, the tx-type under which it resolved, and
/// the confirmation depth accumulated so far.
#[derive(Clone, Copy, Debug)]
pub struct Resolution {
    pub spending_txid: Txid,
    pub depth: u32,
    pub tx_type: TxType,
}

/// One output of the originating (commitment/funding/mutual-close)
/// transaction, tracked from the moment a handler recognizes it until it is
/// irrevocably resolved (§3).
#[derive(Clone, Debug)]
pub struct TrackedOutput {
    pub origin_tx_type: TxType,
    pub origin_txid: Txid,
    pub origin_blockheight: u32,
    pub outnum: u32,
    pub amount_sat: u64,
    pub output_type: OutputType,
    pub proposal: Option<Proposal>,
    pub resolution: Option<Resolution>,
}

impl TrackedOutput {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn is_irrevocably_resolved(&self) -> bool {
        self.resolution.map_or(false, |r| r.depth >= 100)
    }
}

/// Append-only store of every output this engine is watching, keyed by the
/// order in which handlers discovered them (§4.8).
#[derive(Clone, Debug, Default)]
pub struct OutputStore {
    outputs: Vec<TrackedOutput>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_tracked_output(
        &mut self,
        origin_tx_type: TxType,
        origin_txid: Txid,
        origin_blockheight: u32,
        outnum: u32,
        amount_sat: u64,
        output_type: OutputType,
    ) -> OutputHandle {
        let handle = OutputHandle(self.outputs.len());
        self.outputs.push(TrackedOutput {
            origin_tx_type,
            origin_txid,
            origin_blockheight,
            outnum,
            amount_sat,
            output_type,
            proposal: None,
            resolution: None,
        });
        handle
    }

    pub fn get(&self, handle: OutputHandle) -> &TrackedOutput {
        &self.outputs[handle.0]
    }

    fn get_mut(&mut self, handle: OutputHandle) -> &mut TrackedOutput {
        &mut self.outputs[handle.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (OutputHandle, &TrackedOutput)> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, out)| (OutputHandle(i), out))
    }

    /// Attaches a proposal with an explicit depth requirement, relative to
    /// the originating tx's own blockheight. Set-once (§5, §8).
    pub fn propose(
        &mut self,
        handle: OutputHandle,
        tx: Option<Transaction>,
        depth_required: u32,
        tx_type: TxType,
    ) -> Result<(), Error> {
        let out = self.get_mut(handle);
        if out.proposal.is_some() {
            return Err(Error::internal(
                "attempted to adopt a second proposal for the same tracked output",
            ));
        }
        out.proposal = Some(Proposal {
            tx,
            depth_required,
            tx_type,
        });
        Ok(())
    }

    /// Attaches a proposal expressed as an absolute blockheight at which it
    /// becomes actionable, translating it to a depth with a floor of zero
    /// (§4.8, §8: `depth_required = max(0, block_required - tx_blockheight)`).
    pub fn propose_at_block(
        &mut self,
        handle: OutputHandle,
        tx: Option<Transaction>,
        block_required: u32,
        tx_type: TxType,
    ) -> Result<(), Error> {
        let origin_blockheight = self.get(handle).origin_blockheight;
        let depth_required = block_required.saturating_sub(origin_blockheight);
        self.propose(handle, tx, depth_required, tx_type)
    }

    /// Marks an output ignored: resolved by our own originating tx, under
    /// tx-type `SELF`, at depth 0 (§4.8).
    pub fn ignore(&mut self, handle: OutputHandle) {
        let out = self.get_mut(handle);
        let origin_txid = out.origin_txid;
        out.resolution = Some(Resolution {
            spending_txid: origin_txid,
            depth: 0,
            tx_type: TxType::SelfIgnored,
        });
    }

    /// If `handle`'s proposal has a tx and its txid matches `spending_txid`,
    /// marks the output resolved via the proposal's tx-type and returns
    /// `true`. Otherwise leaves the output untouched and returns `false`.
    pub fn resolved_by_proposal(&mut self, handle: OutputHandle, spending_txid: Txid) -> bool {
        let out = self.get_mut(handle);
        let Some(proposal) = &out.proposal else {
            return false;
        };
        let Some(tx) = &proposal.tx else {
            return false;
        };
        if tx.txid() != spending_txid {
            return false;
        }
        let tx_type = proposal.tx_type;
        out.resolution = Some(Resolution {
            spending_txid,
            depth: 0,
            tx_type,
        });
        true
    }

    pub fn resolved_by_other(&mut self, handle: OutputHandle, spending_txid: Txid, tx_type: TxType) {
        self.get_mut(handle).resolution = Some(Resolution {
            spending_txid,
            depth: 0,
            tx_type,
        });
    }

    /// Records an unrecognized spend loudly: tagged `UNKNOWN_TXTYPE`, never
    /// silently dropped (§4.8).
    pub fn unknown_spend(&mut self, handle: OutputHandle, spending_tx: &Transaction) {
        log::error!(
            "unrecognized spend of tracked output {}:{} by {}",
            self.get(handle).origin_txid,
            self.get(handle).outnum,
            spending_tx.txid()
        );
        self.resolved_by_other(handle, spending_tx.txid(), TxType::Unknown);
    }

    /// Updates the depth of every tracked output whose resolution references
    /// `txid` (its own tx, or a spender) — depth may only increase (§4.9,
    /// §8).
    pub fn update_depth(&mut self, txid: Txid, depth: u32) -> Result<(), Error> {
        for out in &mut self.outputs {
            if let Some(resolution) = &mut out.resolution {
                if resolution.spending_txid == txid {
                    if depth < resolution.depth {
                        return Err(Error::internal(format!(
                            "depth of {} decreased from {} to {} (reorg not supported, §9)",
                            txid, resolution.depth, depth
                        )));
                    }
                    resolution.depth = depth;
                }
            }
        }
        Ok(())
    }

    /// Finds every unresolved output that shares `txid` as its own
    /// originating tx and whose proposal's depth requirement is now met.
    pub fn proposals_meeting_depth(&self, txid: Txid, depth: u32) -> Vec<OutputHandle> {
        self.outputs
            .iter()
            .enumerate()
            .filter_map(|(i, out)| {
                if out.origin_txid != txid || out.is_resolved() {
                    return None;
                }
                let proposal = out.proposal.as_ref()?;
                if proposal.depth_required <= depth {
                    Some(OutputHandle(i))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Locates the tracked output at `(txid, outnum)` regardless of whether
    /// it is already resolved (§4.9 spend-notification dispatch): a spend
    /// notification against an already-resolved output still needs to be
    /// inspected to tell a duplicate report of the expected spend apart
    /// from a genuine, unexpected re-spend.
    pub fn find(&self, txid: Txid, outnum: u32) -> Option<OutputHandle> {
        self.outputs.iter().enumerate().find_map(|(i, out)| {
            if out.origin_txid == txid && out.outnum == outnum {
                Some(OutputHandle(i))
            } else {
                None
            }
        })
    }

    /// §8: `all_irrevocably_resolved`.
    pub fn all_irrevocably_resolved(&self) -> bool {
        self.outputs.iter().all(TrackedOutput::is_irrevocably_resolved)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
