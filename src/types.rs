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

//! Data model tag types (§3). These are closed sum types matched
//! exhaustively throughout the engine; no open extension is intended.

use bitcoin::Txid;

/// Tags the transaction that resolved (or ignored) some tracked output, used
/// both for logging and for the `tx_type` field reported back up to the
/// parent in proposals and resolutions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display(Debug)]
pub enum TxType {
    FundingTransaction,
    MutualClose,
    OurUnilateral,
    TheirUnilateral,
    TheirRevokedUnilateral,
    OurHtlcTimeoutToUs,
    TheirHtlcTimeoutToThem,
    OurUnilateralToUsReturnToWallet,
    /// The output was never spent by any tx we care about; it was simply
    /// dropped from tracking (ignored) once its depth threshold was met.
    #[display("SELF")]
    SelfIgnored,
    Unknown,
}

/// Classifies what an output *is*, independent of how it will resolve.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display(Debug)]
pub enum OutputType {
    FundingOutput,
    OutputToUs,
    OutputToThem,
    DelayedOutputToUs,
    DelayedOutputToThem,
    OurHtlc,
    TheirHtlc,
}

/// Which party owns a given key, script path, or HTLC.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, StrictEncode, StrictDecode)]
#[display(Debug)]
pub enum Side {
    Local,
    Remote,
}

/// The classified close type of a channel, derived once from the funding
/// output's spending transaction (§4.1). `Unknown` is always fatal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display(Debug)]
pub enum CloseType {
    Mutual,
    OurUnilateral,
    /// Counterparty broadcast their *previous* (already-revoked-by-us)
    /// commitment that happens to still be their most recent non-fraudulent
    /// one, i.e. `commit_num == revocations_received`.
    TheirUnilateralPrevious,
    /// Counterparty broadcast their current commitment,
    /// `commit_num == revocations_received + 1`.
    TheirUnilateralCurrent,
    TheirRevoked,
}

/// State reported to the parent once in `onchain_init_reply` (§6).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, StrictEncode, StrictDecode)]
#[display(Debug)]
pub enum OnchaindState {
    #[display("ONCHAIND_MUTUAL")]
    Mutual,
    #[display("ONCHAIND_OUR_UNILATERAL")]
    OurUnilateral,
    #[display("ONCHAIND_THEIR_UNILATERAL")]
    TheirUnilateral,
}

impl From<CloseType> for OnchaindState {
    fn from(ct: CloseType) -> Self {
        match ct {
            CloseType::Mutual => OnchaindState::Mutual,
            CloseType::OurUnilateral => OnchaindState::OurUnilateral,
            CloseType::TheirUnilateralPrevious
            | CloseType::TheirUnilateralCurrent
            | CloseType::TheirRevoked => OnchaindState::TheirUnilateral,
        }
    }
}

/// A txid paired with the blockheight of the block containing it; used to
/// express "the originating tx and the height it was observed at" without
/// repeating the pair everywhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TxLocator {
    pub txid: Txid,
    pub blockheight: u32,
}
